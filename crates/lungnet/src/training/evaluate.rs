//! Inference-mode evaluation of a model over one full cohort pass.

use anyhow::{bail, Context, Result};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;
use cohort::Cohort;

use crate::model::{LungBatch, LungPrediction};
use crate::training::logits::{
    batch_accuracy, labels_to_vec, positive_class_probabilities, predicted_classes,
};
use crate::training::metrics::CohortMetrics;

/// Metrics for one full pass over a cohort.
#[derive(Debug, Clone)]
pub struct EpochSummary {
    /// Cross-entropy loss, averaged over batches.
    pub mean_loss: f64,
    /// Accuracy averaged over batches, not samples. Differs from
    /// `metrics.accuracy` when batch sizes are uneven.
    pub mean_accuracy: f64,
    /// Sample-level metric battery over the accumulated predictions.
    pub metrics: CohortMetrics,
}

/// Run `model` over `cohort` and aggregate the metric battery.
///
/// The model is only read; callers on an autodiff backend should pass
/// `model.valid()` so no gradients are tracked. Loss and accuracy are
/// accumulated per batch and divided by the batch count. Held-out
/// cohorts are conventionally evaluated with `batch_size` 1.
pub fn evaluate<B: Backend>(
    model: &LungPrediction<B>,
    cohort: &Cohort,
    batch_size: usize,
    device: &B::Device,
) -> Result<EpochSummary> {
    if cohort.is_empty() {
        bail!(
            "Cannot evaluate the {} cohort: it contains no samples",
            cohort.split
        );
    }

    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let num_batches = cohort.num_batches(batch_size);

    let mut loss_sum = 0.0;
    let mut accuracy_sum = 0.0;
    let mut labels = Vec::with_capacity(cohort.len());
    let mut predictions = Vec::with_capacity(cohort.len());
    let mut probabilities = Vec::with_capacity(cohort.len());

    for records in cohort.batches(batch_size) {
        let batch = LungBatch::<B>::from_records(records, &cohort.shapes, device);
        let (logits, _) = model.forward(batch.images, batch.clinical, batch.aux);

        let loss = loss_fn.forward(logits.clone(), batch.labels.clone());
        loss_sum += loss.into_scalar().elem::<f64>();
        accuracy_sum += batch_accuracy(logits.clone(), batch.labels.clone());

        predictions.extend(predicted_classes(logits.clone()));
        probabilities.extend(positive_class_probabilities(logits));
        labels.extend(labels_to_vec(batch.labels));
    }

    let metrics = CohortMetrics::aggregate(&labels, &predictions, &probabilities)
        .with_context(|| format!("Computing metrics for the {} cohort", cohort.split))?;

    Ok(EpochSummary {
        mean_loss: loss_sum / num_batches as f64,
        mean_accuracy: accuracy_sum / num_batches as f64,
        metrics,
    })
}
