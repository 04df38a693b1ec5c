mod backend;
mod config;
mod logging;
mod pipeline;

use std::path::PathBuf;
use std::process::ExitCode;

use arcface::checkpoint::CheckpointTag;
use arcface::model::backbone::BackboneKind;
use arcface::training::optimizer::OptimizerKind;
use clap::{Parser, Subcommand, ValueEnum};

use config::{DataOverrides, TrainOverrides};
use pipeline::{EvaluateArgs, TrainArgs};

/// arcface-train: ArcFace encoder training and evaluation for FIW kinship verification.
#[derive(Parser)]
#[command(name = "arcface-train", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Which saved encoder to evaluate.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Tag {
    Best,
    Final,
}

impl From<Tag> for CheckpointTag {
    fn from(tag: Tag) -> Self {
        match tag {
            Tag::Best => CheckpointTag::Best,
            Tag::Final => CheckpointTag::Final,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Train an encoder with the ArcFace loss, validating after every epoch.
    Train {
        /// Optional TOML run config with [train] and [data] sections.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Batch size for training and validation. Default: 50.
        #[arg(long)]
        batch_size: Option<usize>,
        /// Number of epochs. Default: 80.
        #[arg(long)]
        epochs: Option<usize>,
        /// Optimizer steps per epoch. Default: 50.
        #[arg(long)]
        train_steps: Option<usize>,
        /// ArcFace logit scale. Default: 10.0.
        #[arg(long)]
        s: Option<f64>,
        /// ArcFace angular margin in radians. Default: 0.40.
        #[arg(long)]
        m: Option<f64>,
        /// Encoder depth: resnet50 or resnet101. Default: resnet101.
        #[arg(long)]
        backbone: Option<BackboneKind>,
        /// Optimizer: sgd or adam. Default: adam.
        #[arg(long)]
        optimizer: Option<OptimizerKind>,
        /// GPU index. Only used by builds with the `wgpu` feature. Default: "0".
        #[arg(long)]
        gpu: Option<String>,
        /// Seed for the backend RNG and the training-pool sampler. Default: 100.
        #[arg(long)]
        seed: Option<u64>,
        /// Directory that receives arcface_<backbone>/. Default: current directory.
        #[arg(long)]
        output_root: Option<PathBuf>,
        /// FIW training family directories (F####/MID#/*.jpg).
        #[arg(long)]
        data_root: Option<PathBuf>,
        /// Base directory for relative image paths in the pair list.
        #[arg(long)]
        image_root: Option<PathBuf>,
        /// Validation pair list.
        #[arg(long)]
        val_pairs: Option<PathBuf>,
        /// Image decoding threads. Default: 2.
        #[arg(long)]
        num_workers: Option<usize>,
    },
    /// Score a pair list with a saved encoder.
    Evaluate {
        /// Run directory written by `train` (holds config.json and checkpoints).
        #[arg(long)]
        run_dir: PathBuf,
        /// Checkpoint slot inside the run directory.
        #[arg(long, value_enum, default_value_t = Tag::Best)]
        tag: Tag,
        /// Explicit checkpoint file; overrides --tag.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        /// Pair list to score.
        #[arg(long)]
        pairs: Option<PathBuf>,
        /// Base directory for relative image paths in the pair list.
        #[arg(long)]
        image_root: Option<PathBuf>,
        /// Override the run's batch size.
        #[arg(long)]
        batch_size: Option<usize>,
        /// Image decoding threads.
        #[arg(long)]
        num_workers: Option<usize>,
        /// GPU index. Only used by builds with the `wgpu` feature.
        #[arg(long, default_value = "0")]
        gpu: String,
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Train {
            config,
            batch_size,
            epochs,
            train_steps,
            s,
            m,
            backbone,
            optimizer,
            gpu,
            seed,
            output_root,
            data_root,
            image_root,
            val_pairs,
            num_workers,
        } => pipeline::run_train(TrainArgs {
            config,
            train: TrainOverrides {
                batch_size,
                epochs,
                train_steps,
                s,
                m,
                backbone,
                optimizer,
                gpu,
                seed,
                ece_bins: None,
                output_root,
            },
            data: DataOverrides {
                root: data_root,
                image_root,
                val_pairs,
                num_workers,
            },
        }),
        Command::Evaluate {
            run_dir,
            tag,
            checkpoint,
            pairs,
            image_root,
            batch_size,
            num_workers,
            gpu,
            json,
        } => pipeline::run_evaluate(EvaluateArgs {
            run_dir,
            tag: tag.into(),
            checkpoint,
            data: DataOverrides {
                root: None,
                image_root,
                val_pairs: pairs,
                num_workers,
            },
            batch_size,
            gpu,
            json,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Config and data-root errors happen before logging is installed.
            if tracing::dispatcher::has_been_set() {
                tracing::error!(error = %format!("{e:#}"), "Run failed");
            } else {
                eprintln!("{}", failure_message(&e));
            }
            ExitCode::FAILURE
        }
    }
}

/// One-line error report with the full context chain.
fn failure_message(err: &anyhow::Error) -> String {
    format!("arcface-train: {err:#}")
}
