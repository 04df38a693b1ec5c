//! ArcFace training loop.
//!
//! Every epoch runs at most `train_steps` optimizer steps over the training
//! source's current window, moves the window to
//! `epoch × batch_size × train_steps`, then validates the inference copy of
//! the encoder on held-out kin pairs. The encoder is checkpointed whenever
//! validation accuracy strictly improves, and once more after the last epoch.

use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use fiw::{PairSource, TrainSource};

use crate::checkpoint::{BestTracker, CheckpointManager, CheckpointTag, Improvement};
use crate::error::ArcFaceError;
use crate::model::backbone::{Backbone, BackboneConfig, BackboneKind};
use crate::model::bridge::{images_to_tensor, labels_to_tensor};
use crate::model::margin_head::{ArcMarginHead, ArcMarginHeadConfig};
use crate::progress::progress_bar;
use crate::training::loss::arcface_loss;
use crate::training::metrics::{EpochLosses, EpochReport, TrainSummary};
use crate::training::optimizer::{adam_groups, sgd_groups, GroupedOptimizer, OptimizerKind};
use crate::validation::validate;

/// Configuration for an ArcFace training run.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    pub backbone: BackboneConfig,
    pub head: ArcMarginHeadConfig,
    /// Number of epochs.
    #[config(default = 80)]
    pub epochs: usize,
    /// Optimizer steps per epoch.
    #[config(default = 50)]
    pub train_steps: usize,
    /// Batch size for training and validation.
    #[config(default = 50)]
    pub batch_size: usize,
    #[config(default = "OptimizerKind::Adam")]
    pub optimizer: OptimizerKind,
    /// Confidence bins for expected calibration error.
    #[config(default = 15)]
    pub ece_bins: usize,
    /// Seed for the backend RNG and the training-pool sampler.
    #[config(default = 100)]
    pub seed: u64,
}

impl TrainingConfig {
    /// Default run for `kind`: 512-dim embeddings into a 571-class head.
    pub fn for_backbone(kind: BackboneKind) -> Self {
        let backbone = BackboneConfig::new(kind);
        let head = ArcMarginHeadConfig::new(backbone.embedding_dim);
        Self::new(backbone, head)
    }

    /// Samples the training pool must hold so every epoch reads fresh data.
    pub fn pool_size(&self) -> usize {
        self.epochs * self.train_steps * self.batch_size
    }
}

/// Pool offset the training window starts at after `epoch` (1-based) ends.
pub fn cursor_for_epoch(epoch: usize, batch_size: usize, train_steps: usize) -> usize {
    epoch * batch_size * train_steps
}

/// Trained encoder plus the per-epoch record of the run.
pub struct TrainOutcome<B: AutodiffBackend> {
    pub encoder: Backbone<B>,
    pub summary: TrainSummary,
}

/// Run ArcFace training.
///
/// Writes `config.json` before the first epoch, `summary.json` after every
/// epoch, the best checkpoint on strict accuracy improvement and the final
/// checkpoint after the last epoch.
///
/// # Errors
/// - [`ArcFaceError::DimensionMismatch`] before any work if the backbone's
///   embedding width differs from the head's input width
/// - [`ArcFaceError::Diverged`] on a non-finite loss; the offending step is
///   not applied
/// - validation and data errors from the sources
pub fn train<B: AutodiffBackend>(
    config: &TrainingConfig,
    train_source: &mut dyn TrainSource,
    val_source: &dyn PairSource,
    checkpoints: &CheckpointManager,
    device: &B::Device,
) -> Result<TrainOutcome<B>, ArcFaceError> {
    if config.backbone.embedding_dim != config.head.in_features {
        return Err(ArcFaceError::DimensionMismatch {
            backbone: config.backbone.embedding_dim,
            head: config.head.in_features,
        });
    }

    let encoder = config.backbone.init::<B>(device);
    let head = config.head.init::<B>(device);
    let rates = config.optimizer.default_rates();

    tracing::info!(
        backbone = %config.backbone.kind,
        optimizer = %config.optimizer,
        s = config.head.s,
        m = config.head.m,
        classes = config.head.num_classes,
        encoder_params = encoder.num_params(),
        "Initialized ArcFace model"
    );

    match config.optimizer {
        OptimizerKind::Sgd => run_epochs(
            config,
            sgd_groups::<B>(rates),
            encoder,
            head,
            train_source,
            val_source,
            checkpoints,
            device,
        ),
        OptimizerKind::Adam => run_epochs(
            config,
            adam_groups::<B>(rates),
            encoder,
            head,
            train_source,
            val_source,
            checkpoints,
            device,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_epochs<B, OE, OH>(
    config: &TrainingConfig,
    mut optim: GroupedOptimizer<B, OE, OH>,
    mut encoder: Backbone<B>,
    mut head: ArcMarginHead<B>,
    train_source: &mut dyn TrainSource,
    val_source: &dyn PairSource,
    checkpoints: &CheckpointManager,
    device: &B::Device,
) -> Result<TrainOutcome<B>, ArcFaceError>
where
    B: AutodiffBackend,
    OE: Optimizer<Backbone<B>, B>,
    OH: Optimizer<ArcMarginHead<B>, B>,
{
    checkpoints.create_dir()?;
    checkpoints.save_config(config)?;

    let rates = optim.rates();
    tracing::info!(
        encoder_lr = rates.encoder,
        head_lr = rates.head,
        base_lr = rates.base,
        epochs = config.epochs,
        train_steps = config.train_steps,
        batch_size = config.batch_size,
        pool = train_source.len(),
        val_pairs = val_source.len(),
        dir = %checkpoints.dir().display(),
        "Starting training"
    );

    let train_start = Instant::now();
    let mut tracker = BestTracker::new();
    let mut summary = TrainSummary::default();

    for epoch in 1..=config.epochs {
        tracing::info!(epoch, "epoch {epoch}");
        let mut losses = EpochLosses::new();
        let pb = progress_bar(config.train_steps, "Training");

        let batches = train_source
            .batches(config.batch_size)
            .take(config.train_steps)
            .enumerate();
        for (step, batch) in batches {
            let batch = batch?;
            if batch.labels.is_empty() {
                continue;
            }
            let images = images_to_tensor::<B>(&batch.images, device);
            let labels = labels_to_tensor::<B>(&batch.labels, device);

            let logits = head.forward(encoder.forward(images), labels.clone());
            let loss = arcface_loss(logits, labels);
            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                pb.abandon();
                tracing::error!(epoch, step = step + 1, loss = loss_value, "Non-finite loss");
                return Err(ArcFaceError::Diverged {
                    epoch,
                    step: step + 1,
                    loss: loss_value,
                });
            }

            (encoder, head) = optim.step(loss, encoder, head);
            losses.push(loss_value);
            pb.inc(1);
        }
        pb.finish_and_clear();

        if losses.is_empty() {
            tracing::warn!(
                epoch,
                bias = train_source.bias(),
                "Training window exhausted; epoch ran no steps"
            );
        }
        train_source.set_bias(cursor_for_epoch(epoch, config.batch_size, config.train_steps));

        let mean_loss = losses.mean();
        tracing::info!(epoch, steps = losses.len(), "arcface_loss:{mean_loss:.6}");

        let valid_encoder = encoder.valid();
        let report = validate::<B::InnerBackend>(
            &valid_encoder,
            val_source,
            config.batch_size,
            config.ece_bins,
            device,
        )?;
        tracing::info!(epoch, "acc is {:.6}", report.accuracy);
        tracing::info!(epoch, "ece is {:.6}", report.ece);
        tracing::info!(epoch, "threshold is {:.6}", report.threshold);
        for (relation, r) in &report.per_relation {
            tracing::debug!(epoch, %relation, pairs = r.pairs, accuracy = r.accuracy, "Relation accuracy");
        }

        let improvement =
            checkpoint_if_improved(&mut tracker, checkpoints, epoch, report.accuracy, &valid_encoder)?;

        summary.push(EpochReport {
            epoch,
            steps: losses.len(),
            mean_loss,
            bias: train_source.bias(),
            validation: report,
            improved: improvement.is_improved(),
        });
        checkpoints.save_summary(&summary)?;
    }

    let final_path = checkpoints.save_encoder(&encoder.valid(), CheckpointTag::Final)?;
    tracing::info!(
        best_accuracy = summary.best_accuracy,
        best_epoch = ?summary.best_epoch,
        elapsed_secs = format!("{:.1}", train_start.elapsed().as_secs_f64()),
        path = %final_path.display(),
        "Training complete. Final checkpoint saved."
    );

    Ok(TrainOutcome { encoder, summary })
}

/// Offer one epoch's accuracy to `tracker` and write the best checkpoint
/// only on strict improvement.
pub(crate) fn checkpoint_if_improved<B: Backend>(
    tracker: &mut BestTracker,
    checkpoints: &CheckpointManager,
    epoch: usize,
    accuracy: f64,
    encoder: &Backbone<B>,
) -> Result<Improvement, ArcFaceError> {
    let improvement = tracker.observe(epoch, accuracy);
    match improvement {
        Improvement::Improved { previous, current } => {
            tracing::info!(epoch, "validation acc improve from :{previous:.6} to {current:.6}");
            checkpoints.save_encoder(encoder, CheckpointTag::Best)?;
        }
        Improvement::NotImproved { best } => {
            tracing::info!(epoch, "validation acc did not improve from {best:.6}");
        }
    }
    Ok(improvement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_advances_by_epoch_budget() {
        let cursors: Vec<usize> = (1..=3).map(|e| cursor_for_epoch(e, 50, 50)).collect();
        assert_eq!(cursors, vec![2500, 5000, 7500]);
        assert_eq!(cursor_for_epoch(0, 50, 50), 0);
    }

    #[test]
    fn test_best_checkpoint_only_on_strict_improvement() {
        use burn::backend::ndarray::NdArray;

        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        let checkpoints = CheckpointManager::new(tmp.path(), BackboneKind::ResNet50);
        let backbone = BackboneConfig::new(BackboneKind::ResNet50)
            .with_base_width(2)
            .with_embedding_dim(4);
        let best_path = checkpoints.path(CheckpointTag::Best);
        let mut tracker = BestTracker::new();

        // A freshly initialised encoder per epoch, so every save changes the file.
        let mut saved = Vec::new();
        let mut improved = Vec::new();
        for (i, &acc) in [0.70, 0.65, 0.80, 0.80, 0.75].iter().enumerate() {
            let epoch = i + 1;
            let encoder = backbone.init::<NdArray<f32>>(&device);
            let outcome =
                checkpoint_if_improved(&mut tracker, &checkpoints, epoch, acc, &encoder).unwrap();
            if outcome.is_improved() {
                improved.push(epoch);
            }
            saved.push(std::fs::read(&best_path).unwrap());
        }

        assert_eq!(improved, vec![1, 3]);
        assert_eq!(saved[1], saved[0], "lower accuracy rewrote the best checkpoint");
        assert_ne!(saved[2], saved[1]);
        assert_eq!(saved[3], saved[2], "equal accuracy rewrote the best checkpoint");
        assert_eq!(saved[4], saved[2]);
        assert!(!checkpoints.path(CheckpointTag::Final).exists());
    }

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::for_backbone(BackboneKind::ResNet101);
        assert_eq!(config.epochs, 80);
        assert_eq!(config.train_steps, 50);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.optimizer, OptimizerKind::Adam);
        assert_eq!(config.seed, 100);
        assert_eq!(config.head.num_classes, 571);
        assert_eq!(config.head.in_features, config.backbone.embedding_dim);
        assert_eq!(config.pool_size(), 80 * 50 * 50);
    }

    #[test]
    fn test_config_json_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let config = TrainingConfig::for_backbone(BackboneKind::ResNet50)
            .with_optimizer(OptimizerKind::Sgd)
            .with_epochs(3);
        config.save(&path).unwrap();
        let loaded = TrainingConfig::load(&path).unwrap();
        assert_eq!(loaded.backbone.kind, BackboneKind::ResNet50);
        assert_eq!(loaded.optimizer, OptimizerKind::Sgd);
        assert_eq!(loaded.epochs, 3);
        assert_eq!(loaded.head.m, 0.40);
    }
}
