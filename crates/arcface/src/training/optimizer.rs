//! Two-group optimizers: backbone and margin head step with independent
//! learning rates.
//!
//! burn optimizers act on a whole module, so each parameter group is its own
//! optimizer. After `backward`, gradients are split per module with
//! [`GradientsParams::from_module`] and each optimizer steps its group.
//! Gradients are recomputed from scratch every step, so there is no explicit
//! zero-grad.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::model::backbone::Backbone;
use crate::model::margin_head::ArcMarginHead;

/// Momentum for the SGD variant.
pub const SGD_MOMENTUM: f64 = 0.9;

/// Adam moment decay rates.
pub const ADAM_BETAS: (f32, f32) = (0.9, 0.999);

/// Adam denominator term. burn's default (1e-5) is as large as the encoder
/// gradients and would halve their steps.
pub const ADAM_EPSILON: f32 = 1e-8;

/// Which update rule to train with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// SGD with momentum 0.9.
    Sgd,
    /// Adam, betas (0.9, 0.999), epsilon 1e-8.
    Adam,
}

impl OptimizerKind {
    /// Default per-group learning rates for this optimizer.
    pub fn default_rates(&self) -> GroupLearningRates {
        match self {
            Self::Sgd => GroupLearningRates {
                encoder: 1e-4,
                head: 1e-2,
                base: 1e-4,
            },
            Self::Adam => GroupLearningRates {
                encoder: 1e-5,
                head: 1e-1,
                base: 1e-5,
            },
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sgd => write!(f, "sgd"),
            Self::Adam => write!(f, "adam"),
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sgd" => Ok(Self::Sgd),
            "adam" => Ok(Self::Adam),
            other => Err(format!("unknown optimizer {other:?} (expected sgd or adam)")),
        }
    }
}

/// Learning rates of the two parameter groups.
///
/// `base` is the optimizer-level default. Backbone and head together hold
/// every trainable parameter, so no parameter ever falls back to it; it is
/// kept for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupLearningRates {
    pub encoder: f64,
    pub head: f64,
    pub base: f64,
}

/// Backbone optimizer + head optimizer stepped together.
pub struct GroupedOptimizer<B, OE, OH>
where
    B: AutodiffBackend,
    OE: Optimizer<Backbone<B>, B>,
    OH: Optimizer<ArcMarginHead<B>, B>,
{
    encoder_optim: OE,
    head_optim: OH,
    rates: GroupLearningRates,
    _backend: PhantomData<B>,
}

impl<B, OE, OH> GroupedOptimizer<B, OE, OH>
where
    B: AutodiffBackend,
    OE: Optimizer<Backbone<B>, B>,
    OH: Optimizer<ArcMarginHead<B>, B>,
{
    pub fn new(encoder_optim: OE, head_optim: OH, rates: GroupLearningRates) -> Self {
        Self {
            encoder_optim,
            head_optim,
            rates,
            _backend: PhantomData,
        }
    }

    pub fn rates(&self) -> GroupLearningRates {
        self.rates
    }

    /// Backpropagate `loss` and update both groups in place.
    pub fn step(
        &mut self,
        loss: Tensor<B, 1>,
        encoder: Backbone<B>,
        head: ArcMarginHead<B>,
    ) -> (Backbone<B>, ArcMarginHead<B>) {
        let mut grads = loss.backward();
        let encoder_grads = GradientsParams::from_module(&mut grads, &encoder);
        let head_grads = GradientsParams::from_module(&mut grads, &head);

        let encoder = self.encoder_optim.step(self.rates.encoder, encoder, encoder_grads);
        let head = self.head_optim.step(self.rates.head, head, head_grads);
        (encoder, head)
    }
}

/// SGD with momentum 0.9 and no dampening.
pub fn sgd_config() -> SgdConfig {
    SgdConfig::new().with_momentum(Some(
        MomentumConfig::new()
            .with_momentum(SGD_MOMENTUM)
            .with_dampening(0.0),
    ))
}

/// Adam with [`ADAM_BETAS`] and [`ADAM_EPSILON`].
pub fn adam_config() -> AdamConfig {
    AdamConfig::new()
        .with_beta_1(ADAM_BETAS.0)
        .with_beta_2(ADAM_BETAS.1)
        .with_epsilon(ADAM_EPSILON)
}

/// SGD (momentum 0.9, no dampening) for both groups.
pub fn sgd_groups<B: AutodiffBackend>(
    rates: GroupLearningRates,
) -> GroupedOptimizer<B, impl Optimizer<Backbone<B>, B>, impl Optimizer<ArcMarginHead<B>, B>> {
    let config = sgd_config();
    GroupedOptimizer::new(
        config.init::<B, Backbone<B>>(),
        config.init::<B, ArcMarginHead<B>>(),
        rates,
    )
}

/// Adam for both groups.
pub fn adam_groups<B: AutodiffBackend>(
    rates: GroupLearningRates,
) -> GroupedOptimizer<B, impl Optimizer<Backbone<B>, B>, impl Optimizer<ArcMarginHead<B>, B>> {
    let config = adam_config();
    GroupedOptimizer::new(
        config.init::<B, Backbone<B>>(),
        config.init::<B, ArcMarginHead<B>>(),
        rates,
    )
}
