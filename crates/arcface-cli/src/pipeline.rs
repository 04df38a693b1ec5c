//! Subcommand implementations.

use std::path::PathBuf;

use anyhow::Context;
use arcface::checkpoint::{load_config, CheckpointManager, CheckpointTag};
use arcface::inference::EmbeddingExtractor;
use arcface::training::trainer::train;
use arcface::validation::ValidationReport;
use fiw::{ClassifierTrain, FamilyIndex, ImageLoader, PairSet};
use rand::SeedableRng;

use crate::backend::{select_device, InferenceBackend, RunContext, TrainBackend};
use crate::config::{load_run_toml, resolve_data, resolve_run, DataOverrides, RunToml, TrainOverrides};
use crate::logging::init_logging;

/// Arguments for the `train` subcommand.
#[derive(Debug)]
pub struct TrainArgs {
    pub config: Option<PathBuf>,
    pub train: TrainOverrides,
    pub data: DataOverrides,
}

/// Arguments for the `evaluate` subcommand.
#[derive(Debug)]
pub struct EvaluateArgs {
    pub run_dir: PathBuf,
    pub tag: CheckpointTag,
    pub checkpoint: Option<PathBuf>,
    pub data: DataOverrides,
    pub batch_size: Option<usize>,
    pub gpu: String,
    pub json: bool,
}

/// Train an encoder and write checkpoints under `<output_root>/arcface_<backbone>`.
pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let file = match &args.config {
        Some(path) => load_run_toml(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RunToml::default(),
    };
    let run = resolve_run(&file, &args.train, &args.data);
    let training = &run.training;

    let checkpoints = CheckpointManager::new(&run.output_root, training.backbone.kind);
    checkpoints.create_dir()?;
    init_logging(Some(&checkpoints.log_path()))?;
    if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Loaded run config");
    }

    let ctx = RunContext::init(training.seed, &run.gpu)?;

    let loader = ImageLoader::new(training.backbone.image_size(), run.data.num_workers)?;
    let index = FamilyIndex::scan(&run.data.root)?;
    let classes = training.head.num_classes;
    if index.num_families() > classes {
        anyhow::bail!(
            "{} families under {} but the margin head has {classes} classes",
            index.num_families(),
            run.data.root.display()
        );
    }
    if index.num_families() < classes {
        tracing::warn!(
            families = index.num_families(),
            classes,
            "Fewer training families than head classes; unused classes only act as negatives"
        );
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(ctx.seed);
    let mut train_source =
        ClassifierTrain::sample(&index, training.pool_size(), loader.clone(), &mut rng);
    let val_source = PairSet::from_file(&run.data.val_pairs, &run.data.image_root, loader)?;

    let outcome = train::<TrainBackend>(
        training,
        &mut train_source,
        &val_source,
        &checkpoints,
        &ctx.device,
    )?;

    let summary = &outcome.summary;
    println!("\n--- Training Summary ---");
    println!("Epochs: {}", summary.epochs.len());
    match summary.best_epoch {
        Some(epoch) => println!("Best accuracy: {:.6} (epoch {epoch})", summary.best_accuracy),
        None => println!("Best accuracy: none recorded"),
    }
    println!("Final checkpoint: {}", checkpoints.path(CheckpointTag::Final).display());
    println!("Summary: {}", checkpoints.summary_path().display());
    Ok(())
}

/// Score a pair list with a saved encoder.
pub fn run_evaluate(args: EvaluateArgs) -> anyhow::Result<()> {
    init_logging(None)?;

    let config_path = args.run_dir.join("config.json");
    let config = load_config(&config_path)?;
    let checkpoints = CheckpointManager::from_dir(&args.run_dir, config.backbone.kind);
    let checkpoint = args
        .checkpoint
        .clone()
        .unwrap_or_else(|| checkpoints.path(args.tag));

    let data = resolve_data(&args.data);
    let device = select_device(&args.gpu)?;
    let extractor = EmbeddingExtractor::<InferenceBackend>::load(&checkpoint, &config.backbone, device)?;
    let loader = ImageLoader::new(config.backbone.image_size(), data.num_workers)?;
    let pairs = PairSet::from_file(&data.val_pairs, &data.image_root, loader)?;

    let batch_size = args.batch_size.unwrap_or(config.batch_size);
    let report = extractor.evaluate(&pairs, batch_size, config.ece_bins)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&checkpoint, &report);
    }
    Ok(())
}

fn print_report(checkpoint: &std::path::Path, report: &ValidationReport) {
    println!("--- Evaluation ---");
    println!("Checkpoint: {}", checkpoint.display());
    println!("Pairs: {}", report.num_pairs);
    println!("Accuracy: {:.6}", report.accuracy);
    println!("ECE: {:.6}", report.ece);
    println!("Threshold: {:.6}", report.threshold);
    if !report.per_relation.is_empty() {
        println!();
        println!("{:<6} {:>7} {:>10}", "kin", "pairs", "accuracy");
        for (relation, r) in &report.per_relation {
            println!("{:<6} {:>7} {:>10.4}", relation.as_str(), r.pairs, r.accuracy);
        }
    }
}
