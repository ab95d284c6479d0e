//! Epoch-based training loop with a single Adam optimizer on the full model.
//!
//! Ties together the batch bridge, cross-entropy loss, cyclical schedule,
//! per-cohort evaluation, and best-accuracy checkpointing. Scalars stream
//! to the run's JSONL store; epoch summaries go to the text log.

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use cohort::{Cohort, Split};
use indicatif::{ProgressBar, ProgressStyle};

use crate::model::{LungBatch, LungPrediction};
use crate::training::checkpoint::BestCheckpoint;
use crate::training::evaluate::{evaluate, EpochSummary};
use crate::training::logits::{batch_accuracy, labels_to_vec, positive_class_probabilities};
use crate::training::metrics::{auprc, auroc};
use crate::training::scalars::{EpochLog, ScalarLogger};
use crate::training::schedule::CyclicLr;

/// Schedule floor as a fraction of the peak learning rate.
const LR_FLOOR_RATIO: f64 = 0.05;

/// Configuration for one training run.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Number of epochs to run.
    #[config(default = 40)]
    pub max_epoch: usize,
    /// Samples per training batch. Held-out cohorts always evaluate
    /// with singleton batches.
    #[config(default = 16)]
    pub batch_size: usize,
    /// Peak learning rate. The cyclical schedule floors at
    /// `LR_FLOOR_RATIO` times this value.
    #[config(default = 1e-3)]
    pub base_lr: f64,
    /// Weight decay for Adam.
    #[config(default = 0.01)]
    pub weight_decay: f64,
    /// Per-step decay of the schedule's triangle amplitude.
    #[config(default = 0.95)]
    pub lr_gamma: f64,
    /// Schedule steps from floor to peak. One step is one epoch.
    #[config(default = 8)]
    pub lr_step_size_up: usize,
    /// Backend seed. Applied by the caller before model construction;
    /// recorded here so the run config captures it.
    #[config(default = 42)]
    pub seed: u64,
}

/// Final state of a completed training run.
#[derive(Debug)]
pub struct TrainOutcome<B: Backend> {
    /// Model parameters after the last epoch.
    pub model: LungPrediction<B>,
    pub epochs_run: usize,
    /// Total optimizer steps taken.
    pub iterations: usize,
    pub best_internal_accuracy: f64,
    pub best_external_accuracy: f64,
}

fn log_cohort_summary(
    log: &mut EpochLog,
    epoch: usize,
    split: Split,
    summary: &EpochSummary,
) -> Result<()> {
    log.write_line(&format!(
        "Epoch {epoch} {split}: loss {:.4}, accuracy {:.4}, precision {:.4}, \
         recall {:.4}, F1 {:.4}, specificity {:.4}, AUROC {:.4}, AUPRC {:.4}",
        summary.mean_loss,
        summary.mean_accuracy,
        summary.metrics.macro_precision,
        summary.metrics.macro_recall,
        summary.metrics.macro_f1,
        summary.metrics.specificity,
        summary.metrics.auroc,
        summary.metrics.auprc,
    ))
}

/// Run the training loop.
///
/// Each epoch: forward/backward/step over the training cohort in insertion
/// order, one schedule advance, then independent full passes over the
/// internal and external test cohorts with per-cohort best-accuracy
/// checkpointing. Any non-finite loss or degenerate metric aborts the run;
/// artifacts from completed epochs remain on disk.
///
/// The caller seeds the backend and constructs the model; this function
/// consumes the model and returns it updated inside [`TrainOutcome`].
pub fn train<B: AutodiffBackend>(
    config: &TrainingConfig,
    mut model: LungPrediction<B>,
    train_cohort: &Cohort,
    internal_test: &Cohort,
    external_test: &Cohort,
    run_dir: &Path,
    device: &B::Device,
) -> Result<TrainOutcome<B>> {
    if train_cohort.is_empty() {
        bail!("Cannot train on an empty {} cohort", train_cohort.split);
    }

    std::fs::create_dir_all(run_dir)
        .with_context(|| format!("Failed to create run directory {}", run_dir.display()))?;
    config
        .save(run_dir.join("config.json"))
        .context("Failed to save training config")?;

    let mut scalars = ScalarLogger::create(run_dir)?;
    let mut epoch_log = EpochLog::create(run_dir)?;

    let optim_config = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay as f32)));
    let mut optimizer = optim_config.init();

    let mut schedule = CyclicLr::new(
        config.base_lr * LR_FLOOR_RATIO,
        config.base_lr,
        config.lr_gamma,
        config.lr_step_size_up,
    );
    let mut internal_best = BestCheckpoint::new(Split::InternalTest, run_dir);
    let mut external_best = BestCheckpoint::new(Split::ExternalTest, run_dir);

    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let num_batches = train_cohort.num_batches(config.batch_size);
    let train_start = Instant::now();
    let mut iteration: usize = 0;

    tracing::info!(
        epochs = config.max_epoch,
        batch_size = config.batch_size,
        batches_per_epoch = num_batches,
        train = train_cohort.len(),
        internal_test = internal_test.len(),
        external_test = external_test.len(),
        run_dir = %run_dir.display(),
        "Starting training"
    );

    for epoch in 0..config.max_epoch {
        let lr = schedule.lr();

        let mut loss_sum = 0.0;
        let mut accuracy_sum = 0.0;
        let mut train_labels = Vec::with_capacity(train_cohort.len());
        let mut train_probabilities = Vec::with_capacity(train_cohort.len());

        let progress = ProgressBar::new(num_batches as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("valid progress bar template")
                .progress_chars("=> "),
        );
        progress.set_message(format!("Epoch {epoch}"));

        for records in train_cohort.batches(config.batch_size) {
            let batch = LungBatch::<B>::from_records(records, &train_cohort.shapes, device);
            let (logits, _) = model.forward(batch.images, batch.clinical, batch.aux);

            let loss = loss_fn.forward(logits.clone(), batch.labels.clone());
            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                bail!("Loss became non-finite ({loss_value}) at epoch {epoch} iteration {iteration}");
            }
            let accuracy = batch_accuracy(logits.clone(), batch.labels.clone());

            train_probabilities.extend(positive_class_probabilities(logits));
            train_labels.extend(labels_to_vec(batch.labels));

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(lr.into(), model, grads);

            loss_sum += loss_value;
            accuracy_sum += accuracy;
            scalars.log("train/loss_ce", iteration, loss_value)?;
            scalars.log("train/accuracy", iteration, accuracy)?;
            iteration += 1;
            progress.inc(1);
        }
        progress.finish_and_clear();

        // One schedule step per epoch, after all batches.
        schedule.advance();

        let epoch_loss = loss_sum / num_batches as f64;
        let epoch_accuracy = accuracy_sum / num_batches as f64;
        let train_auroc = auroc(&train_labels, &train_probabilities)
            .with_context(|| format!("Computing AUROC for the {} cohort", train_cohort.split))?;
        let train_auprc = auprc(&train_labels, &train_probabilities)
            .with_context(|| format!("Computing AUPRC for the {} cohort", train_cohort.split))?;

        scalars.log("train/epoch_loss", epoch, epoch_loss)?;
        scalars.log("train/epoch_accuracy", epoch, epoch_accuracy)?;
        scalars.log("train/auroc", epoch, train_auroc)?;
        scalars.log("train/auprc", epoch, train_auprc)?;
        scalars.log("train/lr", epoch, lr)?;
        epoch_log.write_line(&format!(
            "Epoch {epoch} {}: lr {lr:.6}, loss {epoch_loss:.4}, accuracy {epoch_accuracy:.4}, \
             AUROC {train_auroc:.4}, AUPRC {train_auprc:.4}",
            train_cohort.split,
        ))?;

        // Held-out passes run on the inference view of the model, in
        // singleton batches, each against its own best-accuracy state.
        let valid_model = model.valid();

        let internal = evaluate(&valid_model, internal_test, 1, device)?;
        scalars.log("internal_test/accuracy", epoch, internal.mean_accuracy)?;
        scalars.log("internal_test/loss", epoch, internal.mean_loss)?;
        log_cohort_summary(&mut epoch_log, epoch, internal_test.split, &internal)?;
        internal_best.observe(internal.mean_accuracy, &valid_model)?;

        let external = evaluate(&valid_model, external_test, 1, device)?;
        scalars.log("external_test/accuracy", epoch, external.mean_accuracy)?;
        scalars.log("external_test/loss", epoch, external.mean_loss)?;
        log_cohort_summary(&mut epoch_log, epoch, external_test.split, &external)?;
        external_best.observe(external.mean_accuracy, &valid_model)?;

        scalars.flush()?;
        tracing::info!(
            epoch,
            lr = format!("{lr:.2e}"),
            loss = format!("{epoch_loss:.4}"),
            accuracy = format!("{epoch_accuracy:.4}"),
            internal_accuracy = format!("{:.4}", internal.mean_accuracy),
            external_accuracy = format!("{:.4}", external.mean_accuracy),
            "Epoch complete"
        );
    }

    scalars.flush()?;
    tracing::info!(
        epochs = config.max_epoch,
        iterations = iteration,
        best_internal = internal_best.best_accuracy(),
        best_external = external_best.best_accuracy(),
        elapsed_secs = format!("{:.1}", train_start.elapsed().as_secs_f64()),
        "Training finished"
    );

    Ok(TrainOutcome {
        model,
        epochs_run: config.max_epoch,
        iterations: iteration,
        best_internal_accuracy: internal_best.best_accuracy(),
        best_external_accuracy: external_best.best_accuracy(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LungPredictionConfig;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use cohort::{SampleRecord, TensorShapes};
    use tempfile::TempDir;

    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    const SHAPES: TensorShapes = TensorShapes {
        image: [1, 4, 4],
        clinical: 3,
        aux: 2,
    };

    fn record(id: usize, label: i64) -> SampleRecord {
        // Label-dependent fill so the task is learnable.
        let fill = if label == 1 { 0.8 } else { -0.8 };
        SampleRecord {
            sample_id: format!("s{id}"),
            image: vec![fill; 16],
            clinical: vec![fill; 3],
            aux: vec![fill; 2],
            label,
        }
    }

    fn cohort(split: Split, labels: &[i64]) -> Cohort {
        Cohort {
            split,
            shapes: SHAPES,
            records: labels
                .iter()
                .enumerate()
                .map(|(i, &l)| record(i, l))
                .collect(),
        }
    }

    fn test_model() -> LungPrediction<TestAutodiffBackend> {
        let device = Default::default();
        TestAutodiffBackend::seed(42);
        LungPredictionConfig::new()
            .with_hidden_size(8)
            .with_layer_num(1)
            .with_clinical_dim(3)
            .with_aux_dim(2)
            .init(&device)
    }

    fn test_config(max_epoch: usize) -> TrainingConfig {
        TrainingConfig::new()
            .with_max_epoch(max_epoch)
            .with_batch_size(4)
            .with_base_lr(1e-3)
    }

    #[test]
    fn test_zero_epochs_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let train_cohort = cohort(Split::Training, &[0, 1, 0, 1]);
        let internal = cohort(Split::InternalTest, &[0, 1]);
        let external = cohort(Split::ExternalTest, &[0, 1]);

        let outcome = train(
            &test_config(0),
            test_model(),
            &train_cohort,
            &internal,
            &external,
            dir.path(),
            &device,
        )
        .unwrap();

        assert_eq!(outcome.epochs_run, 0);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.best_internal_accuracy, 0.0);
        assert_eq!(outcome.best_external_accuracy, 0.0);

        // Run artifacts exist, but no epoch ran and nothing was saved.
        assert!(dir.path().join("config.json").exists());
        let scalars = std::fs::read_to_string(dir.path().join("scalars.jsonl")).unwrap();
        assert!(scalars.is_empty());
        assert!(!dir.path().join("internal_test_model.mpk").exists());
        assert!(!dir.path().join("external_test_model.mpk").exists());
    }

    #[test]
    fn test_two_epochs_produce_artifacts_and_checkpoints() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let train_cohort = cohort(Split::Training, &[0, 1, 0, 1, 1, 0]);
        let internal = cohort(Split::InternalTest, &[0, 1, 1]);
        let external = cohort(Split::ExternalTest, &[1, 0]);

        let outcome = train(
            &test_config(2),
            test_model(),
            &train_cohort,
            &internal,
            &external,
            dir.path(),
            &device,
        )
        .unwrap();

        assert_eq!(outcome.epochs_run, 2);
        // Six samples in batches of four: two optimizer steps per epoch.
        assert_eq!(outcome.iterations, 4);
        assert!((0.0..=1.0).contains(&outcome.best_internal_accuracy));
        assert!((0.0..=1.0).contains(&outcome.best_external_accuracy));

        let scalars = std::fs::read_to_string(dir.path().join("scalars.jsonl")).unwrap();
        for tag in [
            "train/loss_ce",
            "train/accuracy",
            "train/epoch_loss",
            "train/epoch_accuracy",
            "train/auroc",
            "train/auprc",
            "train/lr",
            "internal_test/accuracy",
            "internal_test/loss",
            "external_test/accuracy",
            "external_test/loss",
        ] {
            assert!(scalars.contains(tag), "missing scalar tag {tag}");
        }
        assert_eq!(
            scalars.matches("train/loss_ce").count(),
            4,
            "one loss point per iteration"
        );

        // A checkpoint exists whenever its cohort ever scored above zero.
        if outcome.best_internal_accuracy > 0.0 {
            assert!(dir.path().join("internal_test_model.mpk").exists());
        }
        if outcome.best_external_accuracy > 0.0 {
            assert!(dir.path().join("external_test_model.mpk").exists());
        }

        let logs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| {
                let name = entry.unwrap().file_name().into_string().unwrap();
                name.ends_with("_train.txt").then_some(name)
            })
            .collect();
        assert_eq!(logs.len(), 1, "expected one epoch log, found {logs:?}");
    }

    #[test]
    fn test_single_class_training_cohort_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let train_cohort = cohort(Split::Training, &[0, 0, 0, 0]);
        let internal = cohort(Split::InternalTest, &[0, 1]);
        let external = cohort(Split::ExternalTest, &[0, 1]);

        let err = train(
            &test_config(1),
            test_model(),
            &train_cohort,
            &internal,
            &external,
            dir.path(),
            &device,
        )
        .unwrap_err();

        let chain = format!("{err:#}");
        assert!(chain.contains("Training"), "missing cohort name: {chain}");
        assert!(chain.contains("AUROC"), "missing metric name: {chain}");
    }

    #[test]
    fn test_empty_training_cohort_is_rejected() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let empty = Cohort {
            split: Split::Training,
            shapes: SHAPES,
            records: vec![],
        };
        let internal = cohort(Split::InternalTest, &[0, 1]);
        let external = cohort(Split::ExternalTest, &[0, 1]);

        let err = train(
            &test_config(1),
            test_model(),
            &empty,
            &internal,
            &external,
            dir.path(),
            &device,
        )
        .unwrap_err();
        assert!(err.to_string().contains("empty Training cohort"));
    }
}
