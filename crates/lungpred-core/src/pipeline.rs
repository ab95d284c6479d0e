//! Training, evaluation, and summary pipelines behind the CLI.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use burn::prelude::*;
use cohort::{Cohort, CohortReader, Split, TensorShapes};
use lungnet::model::{LungPrediction, LungPredictionConfig};
use lungnet::training::checkpoint::load_checkpoint;
use lungnet::training::evaluate::evaluate;
use lungnet::training::trainer::train;

use crate::config::{
    build_model_config, build_training_config, load_train_toml, resolve_data_root, TrainToml,
};

/// Backend for training runs.
type TrainBackend = Autodiff<NdArray<f32>>;
/// Backend for inference-only commands.
type EvalBackend = NdArray<f32>;

/// Arguments for the `train` subcommand.
pub struct TrainArgs {
    pub config: Option<PathBuf>,
    pub data_root: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub run_name: String,
    pub max_epoch: Option<usize>,
    pub batch_size: Option<usize>,
    pub base_lr: Option<f64>,
    pub seed: Option<u64>,
    pub hidden_size: Option<usize>,
    pub phi: Option<f64>,
    pub layer_num: Option<usize>,
    pub dropout: Option<f64>,
    pub pretrained: Option<PathBuf>,
}

/// Arguments for the `evaluate` subcommand.
pub struct EvalArgs {
    pub config: Option<PathBuf>,
    pub data_root: Option<PathBuf>,
    pub checkpoint: PathBuf,
    pub split: String,
    pub batch_size: usize,
    pub hidden_size: Option<usize>,
    pub phi: Option<f64>,
    pub layer_num: Option<usize>,
}

/// Arguments for the `summary` subcommand.
pub struct SummaryArgs {
    pub config: Option<PathBuf>,
    pub data_root: Option<PathBuf>,
    pub json: bool,
}

/// Conventional config location, used when `--config` is not passed.
const DEFAULT_CONFIG_PATH: &str = "configs/train.toml";

/// Load the TOML config. An explicit path must exist; the conventional
/// default is only read when present, so runs outside the repository
/// root fall back to builtin defaults.
fn load_toml(path: &Option<PathBuf>) -> Result<TrainToml> {
    match path {
        Some(p) => load_train_toml(p),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                load_train_toml(default)
            } else {
                Ok(TrainToml::default())
            }
        }
    }
}

/// Input dimensions come from the data, never from configuration.
fn apply_cohort_dims(config: &mut LungPredictionConfig, shapes: &TensorShapes) {
    config.image_channels = shapes.image[0];
    config.clinical_dim = shapes.clinical;
    config.aux_dim = shapes.aux;
}

fn check_shape_agreement(reference: &Cohort, other: &Cohort) -> Result<()> {
    if reference.shapes != other.shapes {
        bail!(
            "Tensor shapes disagree across splits: {} has {:?}, {} has {:?}",
            reference.split,
            reference.shapes,
            other.split,
            other.shapes
        );
    }
    Ok(())
}

/// Train a model and checkpoint per-cohort bests.
pub fn run_train(args: TrainArgs) -> Result<()> {
    let start = Instant::now();

    // 1. Load config and merge CLI overrides
    let toml = load_toml(&args.config)?;
    let mut model_config = build_model_config(
        &toml.model,
        args.hidden_size,
        args.phi,
        args.layer_num,
        args.dropout,
    );
    let training_config = build_training_config(
        &toml.training,
        args.max_epoch,
        args.batch_size,
        args.base_lr,
        args.seed,
    );
    let data_root = resolve_data_root(&toml.data, args.data_root)?;
    let run_dir = args.output_dir.join(&args.run_name);

    // 2. Load the three cohorts
    let train_cohort =
        CohortReader::read_split(&data_root, Split::Training, model_config.num_classes)?;
    let internal =
        CohortReader::read_split(&data_root, Split::InternalTest, model_config.num_classes)?;
    let external =
        CohortReader::read_split(&data_root, Split::ExternalTest, model_config.num_classes)?;

    // 3. Check shape agreement across splits
    check_shape_agreement(&train_cohort, &internal)?;
    check_shape_agreement(&train_cohort, &external)?;
    apply_cohort_dims(&mut model_config, &train_cohort.shapes);

    // 4. Seed the backend, then build the model
    TrainBackend::seed(training_config.seed);
    let device = Default::default();
    let mut model: LungPrediction<TrainBackend> = model_config.init(&device);

    // 5. Warm-start from a pretrained checkpoint if given
    if let Some(path) = &args.pretrained {
        model = load_checkpoint(model, path, &device)
            .with_context(|| format!("Loading pretrained weights from {}", path.display()))?;
        tracing::info!(path = %path.display(), "Loaded pretrained weights");
    }

    // 6. Run the training loop
    let outcome = train(
        &training_config,
        model,
        &train_cohort,
        &internal,
        &external,
        &run_dir,
        &device,
    )?;

    println!("\n--- Training Summary ---");
    println!("Epochs: {}", outcome.epochs_run);
    println!("Iterations: {}", outcome.iterations);
    println!("Best internal accuracy: {:.4}", outcome.best_internal_accuracy);
    println!("Best external accuracy: {:.4}", outcome.best_external_accuracy);
    println!("Run directory: {}", run_dir.display());
    println!("Elapsed: {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}

/// Evaluate a checkpoint over one cohort and print the metric battery.
pub fn run_evaluate(args: EvalArgs) -> Result<()> {
    // 1. Load config and resolve the cohort
    let toml = load_toml(&args.config)?;
    let mut model_config = build_model_config(
        &toml.model,
        args.hidden_size,
        args.phi,
        args.layer_num,
        None,
    );
    let data_root = resolve_data_root(&toml.data, args.data_root)?;
    let split = Split::from_name(&args.split).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown split '{}'; expected training, internal_test, or external_test",
            args.split
        )
    })?;
    let cohort = CohortReader::read_split(&data_root, split, model_config.num_classes)?;
    apply_cohort_dims(&mut model_config, &cohort.shapes);

    // 2. Restore the checkpoint into a freshly built model
    let device = Default::default();
    let model = load_checkpoint(
        model_config.init::<EvalBackend>(&device),
        &args.checkpoint,
        &device,
    )?;

    // 3. Full evaluation pass
    let summary = evaluate(&model, &cohort, args.batch_size, &device)?;
    let balance = cohort.summary();

    println!("--- {split} Evaluation ---");
    println!("Checkpoint: {}", args.checkpoint.display());
    println!(
        "Samples: {} ({} positive / {} negative)",
        balance.total, balance.positives, balance.negatives
    );
    println!("Loss: {:.4}", summary.mean_loss);
    println!("Accuracy: {:.4}", summary.mean_accuracy);
    println!("Precision: {:.4}", summary.metrics.macro_precision);
    println!("Recall: {:.4}", summary.metrics.macro_recall);
    println!("F1: {:.4}", summary.metrics.macro_f1);
    println!("Specificity: {:.4}", summary.metrics.specificity);
    println!("AUROC: {:.4}", summary.metrics.auroc);
    println!("AUPRC: {:.4}", summary.metrics.auprc);
    println!(
        "Confusion: TN={} FP={} FN={} TP={}",
        summary.metrics.confusion.true_negatives,
        summary.metrics.confusion.false_positives,
        summary.metrics.confusion.false_negatives,
        summary.metrics.confusion.true_positives
    );

    Ok(())
}

/// Print sample counts and label balance for every split under a data root.
pub fn run_summary(args: SummaryArgs) -> Result<()> {
    let toml = load_toml(&args.config)?;
    let num_classes = toml.model.num_classes.unwrap_or(2);
    let data_root = resolve_data_root(&toml.data, args.data_root)?;

    let mut entries = Vec::with_capacity(Split::ALL.len());
    for split in Split::ALL {
        let cohort = CohortReader::read_split(&data_root, split, num_classes)?;
        let balance = cohort.summary();
        entries.push((split, cohort.shapes, balance));
    }

    if args.json {
        let values: Vec<serde_json::Value> = entries
            .iter()
            .map(|(split, shapes, balance)| {
                serde_json::json!({
                    "split": split.file_stem(),
                    "total": balance.total,
                    "positives": balance.positives,
                    "negatives": balance.negatives,
                    "image": shapes.image,
                    "clinical": shapes.clinical,
                    "aux": shapes.aux,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else {
        println!("--- Cohort Summary ---");
        println!("Data root: {}", data_root.display());
        for (split, shapes, balance) in &entries {
            println!(
                "{split}: {} samples ({} positive / {} negative), image {:?}, clinical {}, aux {}",
                balance.total,
                balance.positives,
                balance.negatives,
                shapes.image,
                shapes.clinical,
                shapes.aux
            );
        }
    }

    Ok(())
}
