//! Pair verification: cosine scoring, ROC threshold selection, accuracy and
//! calibration.

pub mod calibration;
pub mod evaluate;
pub mod roc;

pub use calibration::{decision_accuracy, get_conf, ExpectedCalibrationError};
pub use evaluate::{report_from_scores, score_pairs, validate, PairScores, RelationAccuracy, ValidationReport};
pub use roc::{roc_curve, youden_index, RocCurve};

use burn::prelude::*;

/// Clamp on vector norms, matching the usual cosine-similarity convention.
pub const COSINE_EPS: f64 = 1e-8;

/// Row-wise cosine similarity of two `(batch, dim)` tensors.
///
/// Output shape: `(batch,)`
pub fn pairwise_cosine<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>) -> Tensor<B, 1> {
    assert_eq!(a.dims(), b.dims(), "cosine operands differ in shape");
    let [batch, _] = a.dims();
    let dot = (a.clone() * b.clone()).sum_dim(1);
    let na = a.powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(COSINE_EPS);
    let nb = b.powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(COSINE_EPS);
    (dot / (na * nb)).reshape([batch])
}

/// Cosine similarity of two host-side embeddings.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    assert_eq!(a.len(), b.len(), "cosine operands differ in length");
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    dot / (na.sqrt().max(COSINE_EPS) * nb.sqrt().max(COSINE_EPS))
}
