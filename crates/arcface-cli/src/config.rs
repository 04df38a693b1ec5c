//! TOML run configuration for the trainer CLI.
//!
//! An optional file with `[train]` and `[data]` sections overrides the
//! built-in defaults; explicit command-line flags override both.

use std::path::{Path, PathBuf};

use arcface::model::backbone::{BackboneConfig, BackboneKind};
use arcface::model::margin_head::ArcMarginHeadConfig;
use arcface::training::optimizer::OptimizerKind;
use arcface::training::trainer::TrainingConfig;
use serde::Deserialize;

pub const DEFAULT_DATA_ROOT: &str = "data/FIW/FIDs";
pub const DEFAULT_IMAGE_ROOT: &str = "data/FIW";
pub const DEFAULT_VAL_PAIRS: &str = "data/FIW/pairs/val_choose.txt";
pub const DEFAULT_NUM_WORKERS: usize = 2;
pub const DEFAULT_GPU: &str = "0";

/// Top-level structure of a run config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunToml {
    #[serde(default)]
    pub train: TrainOverrides,
    #[serde(default)]
    pub data: DataOverrides,
}

/// Optional overrides for training hyperparameters.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainOverrides {
    pub batch_size: Option<usize>,
    pub epochs: Option<usize>,
    pub train_steps: Option<usize>,
    pub s: Option<f64>,
    pub m: Option<f64>,
    pub backbone: Option<BackboneKind>,
    pub optimizer: Option<OptimizerKind>,
    pub gpu: Option<String>,
    pub seed: Option<u64>,
    pub ece_bins: Option<usize>,
    pub output_root: Option<PathBuf>,
}

/// Optional overrides for dataset locations and decoding.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataOverrides {
    /// FIW family directories used for training.
    pub root: Option<PathBuf>,
    /// Base directory for relative paths in pair lists.
    pub image_root: Option<PathBuf>,
    pub val_pairs: Option<PathBuf>,
    pub num_workers: Option<usize>,
}

/// Load and deserialize a `RunToml` from a TOML file.
///
/// Runs before logging is set up, so nothing is logged here.
pub fn load_run_toml(path: &Path) -> anyhow::Result<RunToml> {
    let contents = std::fs::read_to_string(path)?;
    let config: RunToml = toml::from_str(&contents)?;
    Ok(config)
}

/// Fully resolved settings for a training run.
#[derive(Debug)]
pub struct ResolvedRun {
    pub training: TrainingConfig,
    pub gpu: String,
    pub output_root: PathBuf,
    pub data: ResolvedData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedData {
    pub root: PathBuf,
    pub image_root: PathBuf,
    pub val_pairs: PathBuf,
    pub num_workers: usize,
}

/// Merge defaults < TOML < CLI. `cli` uses the same override shape as the
/// file, with `None` for flags that were not given.
pub fn resolve_run(file: &RunToml, cli_train: &TrainOverrides, cli_data: &DataOverrides) -> ResolvedRun {
    let train = merge_train(&file.train, cli_train);
    let data = merge_data(&file.data, cli_data);

    let kind = train.backbone.unwrap_or(BackboneKind::ResNet101);
    let backbone = BackboneConfig::new(kind);
    let mut head = ArcMarginHeadConfig::new(backbone.embedding_dim);
    if let Some(s) = train.s {
        head.s = s;
    }
    if let Some(m) = train.m {
        head.m = m;
    }

    let mut training = TrainingConfig::new(backbone, head);
    if let Some(n) = train.batch_size {
        training.batch_size = n;
    }
    if let Some(n) = train.epochs {
        training.epochs = n;
    }
    if let Some(n) = train.train_steps {
        training.train_steps = n;
    }
    if let Some(o) = train.optimizer {
        training.optimizer = o;
    }
    if let Some(seed) = train.seed {
        training.seed = seed;
    }
    if let Some(n) = train.ece_bins {
        training.ece_bins = n;
    }

    ResolvedRun {
        training,
        gpu: train.gpu.unwrap_or_else(|| DEFAULT_GPU.to_string()),
        output_root: train.output_root.unwrap_or_else(|| PathBuf::from(".")),
        data: resolve_data(&data),
    }
}

/// Dataset settings with defaults filled in.
pub fn resolve_data(data: &DataOverrides) -> ResolvedData {
    ResolvedData {
        root: data.root.clone().unwrap_or_else(|| DEFAULT_DATA_ROOT.into()),
        image_root: data
            .image_root
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE_ROOT.into()),
        val_pairs: data
            .val_pairs
            .clone()
            .unwrap_or_else(|| DEFAULT_VAL_PAIRS.into()),
        num_workers: data.num_workers.unwrap_or(DEFAULT_NUM_WORKERS),
    }
}

pub fn merge_data(base: &DataOverrides, top: &DataOverrides) -> DataOverrides {
    DataOverrides {
        root: top.root.clone().or_else(|| base.root.clone()),
        image_root: top.image_root.clone().or_else(|| base.image_root.clone()),
        val_pairs: top.val_pairs.clone().or_else(|| base.val_pairs.clone()),
        num_workers: top.num_workers.or(base.num_workers),
    }
}

fn merge_train(base: &TrainOverrides, top: &TrainOverrides) -> TrainOverrides {
    TrainOverrides {
        batch_size: top.batch_size.or(base.batch_size),
        epochs: top.epochs.or(base.epochs),
        train_steps: top.train_steps.or(base.train_steps),
        s: top.s.or(base.s),
        m: top.m.or(base.m),
        backbone: top.backbone.or(base.backbone),
        optimizer: top.optimizer.or(base.optimizer),
        gpu: top.gpu.clone().or_else(|| base.gpu.clone()),
        seed: top.seed.or(base.seed),
        ece_bins: top.ece_bins.or(base.ece_bins),
        output_root: top.output_root.clone().or_else(|| base.output_root.clone()),
    }
}
