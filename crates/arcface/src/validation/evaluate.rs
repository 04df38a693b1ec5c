//! Validation pass over held-out kin pairs.

use std::collections::BTreeMap;

use burn::prelude::*;
use fiw::{KinRelation, PairSource};
use serde::Serialize;

use crate::error::ArcFaceError;
use crate::model::backbone::Backbone;
use crate::model::bridge::{images_to_tensor, tensor_to_vec};
use crate::progress::progress_bar;
use crate::validation::calibration::{correctness, get_conf, ExpectedCalibrationError};
use crate::validation::pairwise_cosine;
use crate::validation::roc::roc_curve;

/// Cosine score, label and relation of every validated pair, in source order.
#[derive(Debug, Clone, Default)]
pub struct PairScores {
    pub scores: Vec<f64>,
    pub labels: Vec<bool>,
    pub relations: Vec<KinRelation>,
}

impl PairScores {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Accuracy restricted to one relationship class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RelationAccuracy {
    pub pairs: usize,
    pub correct: usize,
    pub accuracy: f64,
}

/// Result of one validation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub accuracy: f64,
    pub ece: f64,
    /// Youden-optimal threshold; may be `+inf` (serialised as `null`).
    pub threshold: f64,
    pub num_pairs: usize,
    pub per_relation: BTreeMap<KinRelation, RelationAccuracy>,
}

/// Encode both sides of every pair and score them by cosine similarity.
///
/// `encoder` should be the inference copy of the model (`valid()`), so
/// batch norm uses running statistics and no graph is recorded.
pub fn score_pairs<B: Backend>(
    encoder: &Backbone<B>,
    source: &dyn PairSource,
    batch_size: usize,
    device: &B::Device,
) -> Result<PairScores, ArcFaceError> {
    let mut out = PairScores::default();
    let pb = progress_bar(source.len(), "Validating");

    for batch in source.batches(batch_size) {
        let batch = batch?;
        if batch.is_empty() {
            continue;
        }
        let e1 = encoder.forward(images_to_tensor::<B>(&batch.left, device));
        let e2 = encoder.forward(images_to_tensor::<B>(&batch.right, device));
        let sims = tensor_to_vec::<B>(pairwise_cosine(e1, e2));

        out.scores.extend(sims);
        out.labels.extend(&batch.labels);
        out.relations.extend(&batch.relations);
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();
    Ok(out)
}

/// ROC threshold, accuracy, ECE and per-relation accuracy from raw scores.
pub fn report_from_scores(
    scores: &PairScores,
    ece_bins: usize,
) -> Result<ValidationReport, ArcFaceError> {
    let roc = roc_curve(&scores.labels, &scores.scores)?;
    let threshold = roc.youden_threshold();

    let correct = correctness(&scores.scores, &scores.labels, threshold);
    let hits = correct.iter().filter(|&&c| c).count();
    let accuracy = hits as f64 / correct.len() as f64;

    let confidences = get_conf(&scores.scores, threshold);
    let ece = ExpectedCalibrationError::new(ece_bins).compute(&confidences, &correct);

    let mut tally: BTreeMap<KinRelation, (usize, usize)> = BTreeMap::new();
    for (&relation, &ok) in scores.relations.iter().zip(&correct) {
        let entry = tally.entry(relation).or_default();
        entry.0 += 1;
        entry.1 += usize::from(ok);
    }
    let per_relation = tally
        .into_iter()
        .map(|(relation, (pairs, correct))| {
            let accuracy = correct as f64 / pairs as f64;
            (
                relation,
                RelationAccuracy {
                    pairs,
                    correct,
                    accuracy,
                },
            )
        })
        .collect();

    Ok(ValidationReport {
        accuracy,
        ece,
        threshold,
        num_pairs: scores.len(),
        per_relation,
    })
}

/// Score every pair of `source` and summarise.
pub fn validate<B: Backend>(
    encoder: &Backbone<B>,
    source: &dyn PairSource,
    batch_size: usize,
    ece_bins: usize,
    device: &B::Device,
) -> Result<ValidationReport, ArcFaceError> {
    let scores = score_pairs(encoder, source, batch_size, device)?;
    if scores.is_empty() {
        return Err(ArcFaceError::EmptyValidation);
    }
    report_from_scores(&scores, ece_bins)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores() -> PairScores {
        PairScores {
            scores: vec![0.9, 0.8, 0.35, 0.4, 0.1, 0.6],
            labels: vec![true, true, true, false, false, false],
            relations: vec![
                KinRelation::Fd,
                KinRelation::Fd,
                KinRelation::Ms,
                KinRelation::Fd,
                KinRelation::Ms,
                KinRelation::Ms,
            ],
        }
    }

    #[test]
    fn test_report_threshold_and_accuracy() {
        let report = report_from_scores(&scores(), 15).unwrap();
        // Sorted: 0.9+ 0.8+ 0.6- 0.4- 0.35+ 0.1-. J peaks at 0.8 (tpr 2/3, fpr 0).
        assert_eq!(report.threshold, 0.8);
        assert_eq!(report.num_pairs, 6);
        // Only the 0.35 positive is misclassified.
        assert!((report.accuracy - 5.0 / 6.0).abs() < 1e-12);
        assert!(report.ece >= 0.0 && report.ece <= 1.0);

        let fd = report.per_relation[&KinRelation::Fd];
        assert_eq!((fd.pairs, fd.correct), (3, 3));
        let ms = report.per_relation[&KinRelation::Ms];
        assert_eq!((ms.pairs, ms.correct), (3, 2));
        assert!(!report.per_relation.contains_key(&KinRelation::Bb));
    }

    #[test]
    fn test_report_is_deterministic() {
        let a = report_from_scores(&scores(), 15).unwrap();
        let b = report_from_scores(&scores(), 15).unwrap();
        assert_eq!(a.accuracy, b.accuracy);
        assert_eq!(a.ece, b.ece);
        assert_eq!(a.threshold, b.threshold);
    }

    #[test]
    fn test_single_class_is_rejected() {
        let s = PairScores {
            scores: vec![0.1, 0.2],
            labels: vec![true, true],
            relations: vec![KinRelation::Bb; 2],
        };
        assert!(matches!(
            report_from_scores(&s, 15),
            Err(ArcFaceError::DegenerateLabels { .. })
        ));
    }
}
