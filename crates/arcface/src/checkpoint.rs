//! Encoder checkpoints and run artifacts.
//!
//! A run directory `arcface_<backbone>/` holds:
//! - `arcface_<backbone>_best_model.pkl`: encoder at the best validation accuracy
//! - `arcface_<backbone>_final_model.pkl`: encoder after the last epoch
//! - `config.json`: resolved training config, needed to rebuild the encoder
//! - `summary.json`: per-epoch reports
//! - `train.log`: written by the binary's log layer
//!
//! Only the backbone is persisted. Weights are serialised with burn's named
//! MessagePack recorder at full precision.

use std::fmt;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};

use crate::error::ArcFaceError;
use crate::model::backbone::{Backbone, BackboneConfig, BackboneKind};
use crate::training::metrics::TrainSummary;
use crate::training::trainer::TrainingConfig;

const CONFIG_FILE: &str = "config.json";
const SUMMARY_FILE: &str = "summary.json";
const LOG_FILE: &str = "train.log";

/// Which checkpoint slot to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointTag {
    Best,
    Final,
}

impl fmt::Display for CheckpointTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => write!(f, "best"),
            Self::Final => write!(f, "final"),
        }
    }
}

/// Owns the run directory and the file naming inside it.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
    prefix: String,
}

impl CheckpointManager {
    /// Manager for `<output_root>/arcface_<backbone>`. Nothing is created yet.
    pub fn new(output_root: &Path, backbone: BackboneKind) -> Self {
        let prefix = format!("arcface_{backbone}");
        Self {
            dir: output_root.join(&prefix),
            prefix,
        }
    }

    /// Manager for an existing run directory, e.g. for evaluation.
    pub fn from_dir(dir: &Path, backbone: BackboneKind) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix: format!("arcface_{backbone}"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn create_dir(&self) -> Result<(), ArcFaceError> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn path(&self, tag: CheckpointTag) -> PathBuf {
        self.dir.join(format!("{}_{tag}_model.pkl", self.prefix))
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    /// Persist encoder weights to the `tag` slot, replacing any previous file.
    pub fn save_encoder<B: Backend>(
        &self,
        encoder: &Backbone<B>,
        tag: CheckpointTag,
    ) -> Result<PathBuf, ArcFaceError> {
        self.create_dir()?;
        let path = self.path(tag);
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::new();
        let bytes = recorder
            .record(encoder.clone().into_record(), ())
            .map_err(|e| ArcFaceError::Checkpoint(format!("failed to serialise {tag} encoder: {e}")))?;
        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), %tag, "Encoder checkpoint written");
        Ok(path)
    }

    pub fn save_config(&self, config: &TrainingConfig) -> Result<PathBuf, ArcFaceError> {
        self.create_dir()?;
        let path = self.config_path();
        config
            .save(&path)
            .map_err(|e| ArcFaceError::Checkpoint(format!("failed to write {}: {e}", path.display())))?;
        Ok(path)
    }

    pub fn save_summary(&self, summary: &TrainSummary) -> Result<PathBuf, ArcFaceError> {
        self.create_dir()?;
        let path = self.summary_path();
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| ArcFaceError::Checkpoint(format!("failed to encode summary: {e}")))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

/// Build an encoder from `config` and load weights from `path`.
pub fn load_encoder<B: Backend>(
    path: &Path,
    config: &BackboneConfig,
    device: &B::Device,
) -> Result<Backbone<B>, ArcFaceError> {
    let bytes = std::fs::read(path)?;
    let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::new();
    let record = recorder
        .load(bytes, device)
        .map_err(|e| ArcFaceError::Checkpoint(format!("failed to load {}: {e}", path.display())))?;
    Ok(config.init::<B>(device).load_record(record))
}

/// Read a run's `config.json`.
pub fn load_config(path: &Path) -> Result<TrainingConfig, ArcFaceError> {
    TrainingConfig::load(path)
        .map_err(|e| ArcFaceError::Checkpoint(format!("failed to read {}: {e}", path.display())))
}

/// Outcome of offering one epoch's accuracy to a [`BestTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Improvement {
    Improved { previous: f64, current: f64 },
    NotImproved { best: f64 },
}

impl Improvement {
    pub fn is_improved(&self) -> bool {
        matches!(self, Self::Improved { .. })
    }
}

/// Best validation accuracy so far. Starts at 0; only a strictly greater
/// accuracy counts as an improvement.
#[derive(Debug, Clone, Default)]
pub struct BestTracker {
    best: f64,
    best_epoch: Option<usize>,
}

impl BestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, epoch: usize, accuracy: f64) -> Improvement {
        if accuracy > self.best {
            let previous = self.best;
            self.best = accuracy;
            self.best_epoch = Some(epoch);
            Improvement::Improved {
                previous,
                current: accuracy,
            }
        } else {
            Improvement::NotImproved { best: self.best }
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}
