mod config;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipeline::{EvalArgs, SummaryArgs, TrainArgs};

/// lungpred: train and evaluate a multi-modal binary lung classifier.
#[derive(Parser)]
#[command(name = "lungpred", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands for training, evaluation, and cohort inspection.
#[derive(Subcommand)]
enum Command {
    /// Train a model, checkpointing the best epoch per held-out cohort.
    Train {
        /// Path to a train config TOML file. Falls back to
        /// configs/train.toml when that file exists.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory with the three cohort Parquet files.
        #[arg(long)]
        data_root: Option<PathBuf>,
        /// Directory that holds run outputs.
        #[arg(long, default_value = "runs")]
        output_dir: PathBuf,
        /// Name of this run; artifacts land in `<output-dir>/<run-name>`.
        #[arg(long, default_value = "baseline")]
        run_name: String,
        /// Override the number of training epochs.
        #[arg(long)]
        max_epoch: Option<usize>,
        /// Override the training batch size.
        #[arg(long)]
        batch_size: Option<usize>,
        /// Override the peak learning rate.
        #[arg(long)]
        base_lr: Option<f64>,
        /// Override the backend seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Override the fused hidden width.
        #[arg(long)]
        hidden_size: Option<usize>,
        /// Override the convolutional width multiplier.
        #[arg(long)]
        phi: Option<f64>,
        /// Override the number of hidden classifier blocks.
        #[arg(long)]
        layer_num: Option<usize>,
        /// Override the hidden-block dropout probability.
        #[arg(long)]
        dropout: Option<f64>,
        /// Warm-start from a checkpoint stem (model parameters only).
        #[arg(long)]
        pretrained: Option<PathBuf>,
    },
    /// Evaluate a checkpoint over one cohort.
    Evaluate {
        /// Path to a train config TOML file. Falls back to
        /// configs/train.toml when that file exists.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory with the three cohort Parquet files.
        #[arg(long)]
        data_root: Option<PathBuf>,
        /// Checkpoint stem, without the recorder's extension.
        #[arg(long)]
        checkpoint: PathBuf,
        /// Cohort to evaluate: training, internal_test, or external_test.
        #[arg(long, default_value = "internal_test")]
        split: String,
        /// Samples per evaluation batch.
        #[arg(long, default_value_t = 1)]
        batch_size: usize,
        /// Hidden width of the checkpointed model.
        #[arg(long)]
        hidden_size: Option<usize>,
        /// Width multiplier of the checkpointed model.
        #[arg(long)]
        phi: Option<f64>,
        /// Hidden block count of the checkpointed model.
        #[arg(long)]
        layer_num: Option<usize>,
    },
    /// Print sample counts and label balance for every cohort.
    Summary {
        /// Path to a train config TOML file. Falls back to
        /// configs/train.toml when that file exists.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory with the three cohort Parquet files.
        #[arg(long)]
        data_root: Option<PathBuf>,
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            config,
            data_root,
            output_dir,
            run_name,
            max_epoch,
            batch_size,
            base_lr,
            seed,
            hidden_size,
            phi,
            layer_num,
            dropout,
            pretrained,
        } => pipeline::run_train(TrainArgs {
            config,
            data_root,
            output_dir,
            run_name,
            max_epoch,
            batch_size,
            base_lr,
            seed,
            hidden_size,
            phi,
            layer_num,
            dropout,
            pretrained,
        }),
        Command::Evaluate {
            config,
            data_root,
            checkpoint,
            split,
            batch_size,
            hidden_size,
            phi,
            layer_num,
        } => pipeline::run_evaluate(EvalArgs {
            config,
            data_root,
            checkpoint,
            split,
            batch_size,
            hidden_size,
            phi,
            layer_num,
        }),
        Command::Summary {
            config,
            data_root,
            json,
        } => pipeline::run_summary(SummaryArgs {
            config,
            data_root,
            json,
        }),
    }
}
