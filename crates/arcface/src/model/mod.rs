//! Model components: ResNet backbone, additive angular-margin head, and the
//! bridge between host-side batches and burn tensors.

pub mod backbone;
pub mod bridge;
pub mod margin_head;

use burn::prelude::*;

/// Row-wise L2 normalisation; norms are clamped to `eps` to avoid 0/0.
pub fn l2_normalize<B: Backend>(x: Tensor<B, 2>, eps: f64) -> Tensor<B, 2> {
    let norm = x.clone().powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(eps);
    x / norm
}
