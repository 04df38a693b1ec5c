//! Receiver operating characteristic over verification scores.
//!
//! Thresholds are the distinct scores in descending order, preceded by
//! `+inf` so the curve starts at `(0, 0)`. Collinear interior points are
//! dropped: a point is kept only where the curve changes slope.

use crate::error::ArcFaceError;

/// ROC curve points. All three vectors have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Decision thresholds, strictly decreasing; `thresholds[0]` is `+inf`.
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Threshold maximising Youden's J (`tpr − fpr`), first index on ties.
    pub fn youden_threshold(&self) -> f64 {
        self.thresholds[youden_index(&self.fpr, &self.tpr)]
    }
}

/// Compute the ROC curve of `scores` against binary `labels`.
///
/// Errors with [`ArcFaceError::EmptyValidation`] on empty input and
/// [`ArcFaceError::DegenerateLabels`] when only one class is present.
pub fn roc_curve(labels: &[bool], scores: &[f64]) -> Result<RocCurve, ArcFaceError> {
    assert_eq!(labels.len(), scores.len(), "labels and scores differ in length");
    if labels.is_empty() {
        return Err(ArcFaceError::EmptyValidation);
    }
    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(ArcFaceError::DegenerateLabels {
            positives,
            negatives,
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    // Cumulative counts at the last position of every distinct score.
    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let mut thresholds = Vec::new();
    let (mut tp, mut fp) = (0.0f64, 0.0f64);
    for (pos, &i) in order.iter().enumerate() {
        if labels[i] {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_run = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_run {
            tps.push(tp);
            fps.push(fp);
            thresholds.push(scores[i]);
        }
    }

    if tps.len() > 2 {
        let n = tps.len();
        let keep: Vec<usize> = (0..n)
            .filter(|&k| {
                k == 0
                    || k == n - 1
                    || fps[k + 1] - 2.0 * fps[k] + fps[k - 1] != 0.0
                    || tps[k + 1] - 2.0 * tps[k] + tps[k - 1] != 0.0
            })
            .collect();
        tps = keep.iter().map(|&k| tps[k]).collect();
        fps = keep.iter().map(|&k| fps[k]).collect();
        thresholds = keep.iter().map(|&k| thresholds[k]).collect();
    }

    tps.insert(0, 0.0);
    fps.insert(0, 0.0);
    thresholds.insert(0, f64::INFINITY);

    Ok(RocCurve {
        fpr: fps.iter().map(|v| v / negatives as f64).collect(),
        tpr: tps.iter().map(|v| v / positives as f64).collect(),
        thresholds,
    })
}

/// Index of the maximal `tpr − fpr`; the first one wins on ties.
///
/// # Panics
/// Panics on empty or mismatched inputs.
pub fn youden_index(fpr: &[f64], tpr: &[f64]) -> usize {
    assert_eq!(fpr.len(), tpr.len(), "fpr and tpr differ in length");
    assert!(!fpr.is_empty(), "empty ROC curve");
    let mut best = 0;
    let mut best_j = tpr[0] - fpr[0];
    for i in 1..fpr.len() {
        let j = tpr[i] - fpr[i];
        if j > best_j {
            best = i;
            best_j = j;
        }
    }
    best
}
