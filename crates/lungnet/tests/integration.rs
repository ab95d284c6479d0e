//! Integration tests for the lungnet crate.
//!
//! These tests exercise cross-module interactions: Parquet cohorts ->
//! batch bridge -> model -> training loop -> checkpoints -> evaluation.
//! All use the NdArray backend and synthetic data.

use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use burn::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

use cohort::{CohortReader, CohortWriter, SampleRecord, Split, TensorShapes};
use lungnet::model::{LungPrediction, LungPredictionConfig};
use lungnet::training::checkpoint::load_checkpoint;
use lungnet::training::evaluate::evaluate;
use lungnet::training::trainer::{train, TrainingConfig};

type TestBackend = NdArray<f32>;
type TestAutodiffBackend = Autodiff<NdArray<f32>>;

// Non-square image so height/width transpositions cannot hide.
const SHAPES: TensorShapes = TensorShapes {
    image: [2, 6, 5],
    clinical: 4,
    aux: 3,
};

/// Helper: one sample whose values separate cleanly by label.
fn make_record(id: usize, label: i64) -> SampleRecord {
    let base = if label == 1 { 0.6 } else { -0.6 };
    let fill = base + 0.01 * id as f32;
    SampleRecord {
        sample_id: format!("case-{id:03}"),
        image: vec![fill; SHAPES.image_len()],
        clinical: vec![fill; SHAPES.clinical],
        aux: vec![fill; SHAPES.aux],
        label,
    }
}

/// Helper: write one split's Parquet file under `root`.
fn write_split(root: &std::path::Path, split: Split, labels: &[i64]) {
    let mut writer = CohortWriter::new(root.join(split.file_name()), SHAPES);
    for (id, &label) in labels.iter().enumerate() {
        writer.record(make_record(id, label));
    }
    writer.finish().unwrap();
}

fn write_all_splits(root: &std::path::Path) {
    write_split(root, Split::Training, &[0, 1, 0, 1, 1, 0, 1, 0]);
    write_split(root, Split::InternalTest, &[0, 1, 1, 0]);
    write_split(root, Split::ExternalTest, &[1, 0, 0]);
}

fn model_config() -> LungPredictionConfig {
    LungPredictionConfig::new()
        .with_image_channels(SHAPES.image[0])
        .with_clinical_dim(SHAPES.clinical)
        .with_aux_dim(SHAPES.aux)
        .with_hidden_size(8)
        .with_layer_num(1)
        .with_phi(0.25)
}

#[test]
fn test_parquet_to_training_to_checkpoints() {
    let data_dir = TempDir::new().unwrap();
    let run_dir = TempDir::new().unwrap();
    write_all_splits(data_dir.path());

    let train_cohort = CohortReader::read_split(data_dir.path(), Split::Training, 2).unwrap();
    let internal = CohortReader::read_split(data_dir.path(), Split::InternalTest, 2).unwrap();
    let external = CohortReader::read_split(data_dir.path(), Split::ExternalTest, 2).unwrap();
    assert_eq!(train_cohort.shapes, SHAPES);

    let device = Default::default();
    TestAutodiffBackend::seed(42);
    let model: LungPrediction<TestAutodiffBackend> = model_config().init(&device);

    let config = TrainingConfig::new()
        .with_max_epoch(2)
        .with_batch_size(3)
        .with_base_lr(1e-2);
    let outcome = train(
        &config,
        model,
        &train_cohort,
        &internal,
        &external,
        run_dir.path(),
        &device,
    )
    .unwrap();

    assert_eq!(outcome.epochs_run, 2);
    // Eight samples in batches of three: three steps per epoch.
    assert_eq!(outcome.iterations, 6);

    // Run artifacts.
    assert!(run_dir.path().join("config.json").exists());
    let scalars = std::fs::read_to_string(run_dir.path().join("scalars.jsonl")).unwrap();
    for line in scalars.lines() {
        let point: Value = serde_json::from_str(line).unwrap();
        assert!(point["tag"].is_string());
        assert!(point["value"].as_f64().unwrap().is_finite());
    }
    assert_eq!(
        scalars.matches("\"train/loss_ce\"").count(),
        6,
        "one loss point per optimizer step"
    );

    // The text log holds one training line and two cohort lines per epoch.
    let log_name = std::fs::read_dir(run_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .find(|name| name.ends_with("_train.txt"))
        .expect("missing epoch log");
    let log = std::fs::read_to_string(run_dir.path().join(log_name)).unwrap();
    assert_eq!(log.lines().count(), 6);
    assert!(log.contains("Internal test"));
    assert!(log.contains("External test"));
}

#[test]
fn test_best_checkpoint_reproduces_best_accuracy() {
    let data_dir = TempDir::new().unwrap();
    let run_dir = TempDir::new().unwrap();
    write_all_splits(data_dir.path());

    let train_cohort = CohortReader::read_split(data_dir.path(), Split::Training, 2).unwrap();
    let internal = CohortReader::read_split(data_dir.path(), Split::InternalTest, 2).unwrap();
    let external = CohortReader::read_split(data_dir.path(), Split::ExternalTest, 2).unwrap();

    let device = Default::default();
    TestAutodiffBackend::seed(7);
    let model: LungPrediction<TestAutodiffBackend> = model_config().init(&device);

    let config = TrainingConfig::new()
        .with_max_epoch(3)
        .with_batch_size(4)
        .with_base_lr(1e-2);
    let outcome = train(
        &config,
        model,
        &train_cohort,
        &internal,
        &external,
        run_dir.path(),
        &device,
    )
    .unwrap();

    if outcome.best_internal_accuracy == 0.0 {
        // No epoch beat the initial threshold; nothing was persisted.
        assert!(!run_dir.path().join("internal_test_model.mpk").exists());
        return;
    }

    // Restoring the internal-best parameters must reproduce the recorded
    // best accuracy exactly: evaluation is deterministic and read-only.
    let restored: LungPrediction<TestBackend> = load_checkpoint(
        model_config().init(&device),
        &run_dir.path().join(Split::InternalTest.checkpoint_stem()),
        &device,
    )
    .unwrap();

    let summary = evaluate(&restored, &internal, 1, &device).unwrap();
    assert!(
        (summary.mean_accuracy - outcome.best_internal_accuracy).abs() < 1e-12,
        "restored accuracy {} != recorded best {}",
        summary.mean_accuracy,
        outcome.best_internal_accuracy
    );
    assert_eq!(summary.metrics.confusion.total(), internal.len());
}

#[test]
fn test_evaluate_loaded_cohort_with_fresh_model() {
    let data_dir = TempDir::new().unwrap();
    write_all_splits(data_dir.path());

    let external = CohortReader::read_split(data_dir.path(), Split::ExternalTest, 2).unwrap();

    let device = Default::default();
    TestBackend::seed(11);
    let model: LungPrediction<TestBackend> = model_config().init(&device);

    let summary = evaluate(&model, &external, 1, &device).unwrap();
    assert_eq!(summary.metrics.confusion.total(), external.len());
    assert!(summary.mean_loss.is_finite());
    assert!((0.0..=1.0).contains(&summary.mean_accuracy));
    assert!((0.0..=1.0).contains(&summary.metrics.auroc));
    assert!((0.0..=1.0).contains(&summary.metrics.auprc));
}
