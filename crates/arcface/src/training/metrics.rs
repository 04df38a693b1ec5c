//! Per-epoch bookkeeping for the training loop.

use serde::Serialize;

use crate::validation::ValidationReport;

/// Step losses of one epoch. Logged, never persisted on its own.
#[derive(Debug, Default, Clone)]
pub struct EpochLosses {
    values: Vec<f64>,
}

impl EpochLosses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, loss: f64) {
        self.values.push(loss);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean loss; NaN when no step ran.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

/// Outcome of one epoch.
#[derive(Debug, Clone, Serialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub steps: usize,
    pub mean_loss: f64,
    /// Sampling cursor after the epoch.
    pub bias: usize,
    pub validation: ValidationReport,
    /// Whether this epoch produced a new best checkpoint.
    pub improved: bool,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainSummary {
    pub epochs: Vec<EpochReport>,
    pub best_accuracy: f64,
    /// Epoch of the best checkpoint, `None` if accuracy never rose above 0.
    pub best_epoch: Option<usize>,
}

impl TrainSummary {
    pub fn push(&mut self, report: EpochReport) {
        if report.improved {
            self.best_accuracy = report.validation.accuracy;
            self.best_epoch = Some(report.epoch);
        }
        self.epochs.push(report);
    }
}
