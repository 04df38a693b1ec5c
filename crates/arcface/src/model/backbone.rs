//! ResNet backbone encoder.
//!
//! Bottleneck ResNet (He et al.) with a linear projection to the embedding
//! width. The two supported depths differ only in how many bottleneck blocks
//! the third stage carries.
//!
//! ```text
//! (batch, 3, H, W)
//!   → Conv7x7/2 → BN → ReLU → MaxPool3x3/2
//!   → stage1..stage4 (bottlenecks, widths w, 2w, 4w, 8w, expansion 4)
//!   → AdaptiveAvgPool(1×1) → flatten → Linear(32w → embedding_dim)
//!   → embeddings: (batch, embedding_dim)
//! ```

use std::fmt;
use std::str::FromStr;

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Channel expansion of the last 1×1 conv in every bottleneck.
const EXPANSION: usize = 4;

/// Supported backbone depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackboneKind {
    ResNet50,
    ResNet101,
}

impl BackboneKind {
    /// Bottleneck blocks per stage.
    pub fn blocks(&self) -> [usize; 4] {
        match self {
            Self::ResNet50 => [3, 4, 6, 3],
            Self::ResNet101 => [3, 4, 23, 3],
        }
    }

    /// Square input resolution the encoder is trained at.
    pub fn image_size(&self) -> usize {
        112
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResNet50 => "resnet50",
            Self::ResNet101 => "resnet101",
        }
    }
}

impl fmt::Display for BackboneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackboneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resnet50" => Ok(Self::ResNet50),
            "resnet101" => Ok(Self::ResNet101),
            other => Err(format!("unknown backbone {other:?} (expected resnet50 or resnet101)")),
        }
    }
}

/// Configuration for the backbone encoder.
#[derive(Config, Debug)]
pub struct BackboneConfig {
    /// Network depth.
    pub kind: BackboneKind,
    /// Width of the first stage; later stages double it.
    #[config(default = 64)]
    pub base_width: usize,
    /// Output embedding dimension.
    #[config(default = 512)]
    pub embedding_dim: usize,
}

/// Residual shortcut projection used when shape changes.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// 1×1 → 3×3 → 1×1 bottleneck block with a residual connection.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    conv3: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    downsample: Option<Downsample<B>>,
    relu: Relu,
}

impl<B: Backend> Bottleneck<B> {
    fn new(d_in: usize, width: usize, stride: usize, device: &B::Device) -> Self {
        let d_out = width * EXPANSION;
        let downsample = (stride != 1 || d_in != d_out).then(|| Downsample {
            conv: Conv2dConfig::new([d_in, d_out], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device),
            bn: BatchNormConfig::new(d_out).init(device),
        });

        Self {
            conv1: Conv2dConfig::new([d_in, width], [1, 1])
                .with_bias(false)
                .init(device),
            bn1: BatchNormConfig::new(width).init(device),
            conv2: Conv2dConfig::new([width, width], [3, 3])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .init(device),
            bn2: BatchNormConfig::new(width).init(device),
            conv3: Conv2dConfig::new([width, d_out], [1, 1])
                .with_bias(false)
                .init(device),
            bn3: BatchNormConfig::new(d_out).init(device),
            downsample,
            relu: Relu::new(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(ds) => ds.forward(x.clone()),
            None => x.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let out = self.relu.forward(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));
        self.relu.forward(out + identity)
    }
}

/// Backbone encoder: images → embeddings.
///
/// This is the only part of the model that is checkpointed.
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    stem_conv: Conv2d<B>,
    stem_bn: BatchNorm<B, 2>,
    stem_pool: MaxPool2d,
    blocks: Vec<Bottleneck<B>>,
    avg_pool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    relu: Relu,
    embedding_dim: usize,
}

impl BackboneConfig {
    /// Initialize a backbone with freshly initialised weights.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Backbone<B> {
        let w = self.base_width;
        let mut blocks = Vec::new();
        let mut d_in = w;
        for (stage, &n_blocks) in self.kind.blocks().iter().enumerate() {
            let width = w << stage;
            for i in 0..n_blocks {
                let stride = if stage > 0 && i == 0 { 2 } else { 1 };
                blocks.push(Bottleneck::new(d_in, width, stride, device));
                d_in = width * EXPANSION;
            }
        }

        Backbone {
            stem_conv: Conv2dConfig::new([3, w], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false)
                .init(device),
            stem_bn: BatchNormConfig::new(w).init(device),
            stem_pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            blocks,
            avg_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(d_in, self.embedding_dim).init(device),
            relu: Relu::new(),
            embedding_dim: self.embedding_dim,
        }
    }

    /// Input resolution declared by the chosen depth.
    pub fn image_size(&self) -> usize {
        self.kind.image_size()
    }
}

impl<B: Backend> Backbone<B> {
    /// Encode a batch of images.
    ///
    /// Input shape: `(batch, 3, H, W)`
    /// Output shape: `(batch, embedding_dim)`
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.stem_conv.forward(images);
        let x = self.relu.forward(self.stem_bn.forward(x));
        let mut x = self.stem_pool.forward(x);
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x: Tensor<B, 2> = self.avg_pool.forward(x).flatten(1, 3);
        self.fc.forward(x)
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Total bottleneck blocks across all stages.
    pub fn depth(&self) -> usize {
        self.blocks.len()
    }
}
