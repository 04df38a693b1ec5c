//! Threshold decisions and expected calibration error.
//!
//! A pair is predicted kin iff `score >= threshold`. Confidence of that
//! decision grows linearly with the distance from the threshold, from 0.5
//! at the threshold to 1.0 at the end of the cosine range on the predicted
//! side.

/// Guards the confidence denominators when the threshold sits on a range end.
const CONF_EPS: f64 = 1e-12;

/// Correctness of each thresholded decision.
pub fn correctness(scores: &[f64], labels: &[bool], threshold: f64) -> Vec<bool> {
    assert_eq!(scores.len(), labels.len(), "scores and labels differ in length");
    scores
        .iter()
        .zip(labels)
        .map(|(&s, &label)| (s >= threshold) == label)
        .collect()
}

/// Fraction of correct decisions; 0 for no pairs.
pub fn decision_accuracy(scores: &[f64], labels: &[bool], threshold: f64) -> f64 {
    let correct = correctness(scores, labels, threshold);
    if correct.is_empty() {
        return 0.0;
    }
    correct.iter().filter(|&&c| c).count() as f64 / correct.len() as f64
}

/// Confidence in `[0.5, 1]` of each thresholded decision.
///
/// The threshold is clamped to the cosine range `[-1, 1]` first, so the
/// `+inf` threshold an ROC curve can produce maps to "everything negative".
pub fn get_conf(scores: &[f64], threshold: f64) -> Vec<f64> {
    let t = threshold.clamp(-1.0, 1.0);
    scores
        .iter()
        .map(|&s| {
            let s = s.clamp(-1.0, 1.0);
            let c = if s >= t {
                0.5 + 0.5 * (s - t) / (1.0 - t).max(CONF_EPS)
            } else {
                0.5 + 0.5 * (t - s) / (t + 1.0).max(CONF_EPS)
            };
            c.clamp(0.5, 1.0)
        })
        .collect()
}

/// Expected calibration error over equal-width confidence bins.
///
/// Bin `b` covers `(b/n, (b+1)/n]`. ECE is the count-weighted mean of
/// `|mean confidence − accuracy|` over non-empty bins.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedCalibrationError {
    n_bins: usize,
}

impl Default for ExpectedCalibrationError {
    fn default() -> Self {
        Self { n_bins: 15 }
    }
}

impl ExpectedCalibrationError {
    pub fn new(n_bins: usize) -> Self {
        assert!(n_bins > 0, "ECE needs at least one bin");
        Self { n_bins }
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn compute(&self, confidences: &[f64], correct: &[bool]) -> f64 {
        assert_eq!(
            confidences.len(),
            correct.len(),
            "confidences and correctness differ in length"
        );
        let n = confidences.len();
        if n == 0 {
            return 0.0;
        }

        let mut conf_sum = vec![0.0f64; self.n_bins];
        let mut hits = vec![0usize; self.n_bins];
        let mut counts = vec![0usize; self.n_bins];
        for (&c, &ok) in confidences.iter().zip(correct) {
            let Some(bin) = self.bin_of(c) else { continue };
            conf_sum[bin] += c;
            counts[bin] += 1;
            if ok {
                hits[bin] += 1;
            }
        }

        (0..self.n_bins)
            .filter(|&b| counts[b] > 0)
            .map(|b| {
                let count = counts[b] as f64;
                let gap = conf_sum[b] / count - hits[b] as f64 / count;
                gap.abs() * count / n as f64
            })
            .sum()
    }

    /// Bin index for a confidence; `None` for values outside `(0, 1]`.
    fn bin_of(&self, confidence: f64) -> Option<usize> {
        if !(confidence > 0.0 && confidence <= 1.0) {
            return None;
        }
        let width = 1.0 / self.n_bins as f64;
        (0..self.n_bins).find(|&b| {
            let lo = b as f64 * width;
            let hi = (b + 1) as f64 * width;
            confidence > lo && confidence <= hi
        })
    }
}
