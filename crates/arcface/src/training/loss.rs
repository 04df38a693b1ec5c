//! Cross-entropy over margin-adjusted logits.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;

/// ArcFace loss: mean cross-entropy of margin logits against true labels.
///
/// # Arguments
/// - `logits`: shape `(batch, num_classes)` from `ArcMarginHead::forward`
/// - `labels`: shape `(batch,)`
///
/// # Returns
/// Scalar loss tensor of shape `(1,)`.
pub fn arcface_loss<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, labels)
}
