//! Binary-classification metrics computed over one full cohort pass.
//!
//! All functions take ground-truth labels first. Degenerate cohorts
//! (single-class labels, no negatives) surface as [`MetricError`] rather
//! than silently producing NaN.

use thiserror::Error;

/// Errors raised while aggregating cohort metrics.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("Expected equal sample counts, got {left} and {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("Cannot compute metrics over an empty cohort")]
    EmptyCohort,
    #[error("Label {label} is outside the binary range {{0, 1}}")]
    NonBinaryLabel { label: i64 },
    #[error("Specificity is undefined: no negative samples (TN + FP = 0)")]
    NoNegatives,
    #[error("{metric} is undefined: every sample belongs to class {class}")]
    SingleClass { metric: &'static str, class: i64 },
}

/// Binary confusion matrix with positive label 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    /// Count the four cells from parallel label and prediction sequences.
    pub fn from_predictions(labels: &[i64], predictions: &[i64]) -> Result<Self, MetricError> {
        if labels.len() != predictions.len() {
            return Err(MetricError::LengthMismatch {
                left: labels.len(),
                right: predictions.len(),
            });
        }
        if labels.is_empty() {
            return Err(MetricError::EmptyCohort);
        }

        let mut matrix = ConfusionMatrix {
            true_negatives: 0,
            false_positives: 0,
            false_negatives: 0,
            true_positives: 0,
        };
        for (&label, &prediction) in labels.iter().zip(predictions) {
            for value in [label, prediction] {
                if value != 0 && value != 1 {
                    return Err(MetricError::NonBinaryLabel { label: value });
                }
            }
            match (label, prediction) {
                (0, 0) => matrix.true_negatives += 1,
                (0, 1) => matrix.false_positives += 1,
                (1, 0) => matrix.false_negatives += 1,
                (1, 1) => matrix.true_positives += 1,
                _ => unreachable!("values validated above"),
            }
        }
        Ok(matrix)
    }

    /// Total number of samples counted.
    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    /// Per-sample accuracy, (TN + TP) / N.
    pub fn accuracy(&self) -> f64 {
        (self.true_negatives + self.true_positives) as f64 / self.total() as f64
    }

    /// True-negative rate, TN / (TN + FP).
    pub fn specificity(&self) -> Result<f64, MetricError> {
        let negatives = self.true_negatives + self.false_positives;
        if negatives == 0 {
            return Err(MetricError::NoNegatives);
        }
        Ok(self.true_negatives as f64 / negatives as f64)
    }
}

fn ratio_or_zero(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Macro-averaged (precision, recall, F1) over both classes.
///
/// Per-class ratios with a zero denominator contribute 0, matching the
/// usual zero-division convention for degenerate prediction sets.
pub fn macro_precision_recall_f1(matrix: &ConfusionMatrix) -> (f64, f64, f64) {
    let positive_precision =
        ratio_or_zero(matrix.true_positives, matrix.true_positives + matrix.false_positives);
    let positive_recall =
        ratio_or_zero(matrix.true_positives, matrix.true_positives + matrix.false_negatives);
    let negative_precision =
        ratio_or_zero(matrix.true_negatives, matrix.true_negatives + matrix.false_negatives);
    let negative_recall =
        ratio_or_zero(matrix.true_negatives, matrix.true_negatives + matrix.false_positives);

    let precision = (positive_precision + negative_precision) / 2.0;
    let recall = (positive_recall + negative_recall) / 2.0;
    let f1 = (f1_score(positive_precision, positive_recall)
        + f1_score(negative_precision, negative_recall))
        / 2.0;
    (precision, recall, f1)
}

fn check_probability_inputs(
    labels: &[i64],
    probabilities: &[f64],
    metric: &'static str,
) -> Result<(usize, usize), MetricError> {
    if labels.len() != probabilities.len() {
        return Err(MetricError::LengthMismatch {
            left: labels.len(),
            right: probabilities.len(),
        });
    }
    if labels.is_empty() {
        return Err(MetricError::EmptyCohort);
    }
    let mut positives = 0;
    for &label in labels {
        match label {
            0 => {}
            1 => positives += 1,
            other => return Err(MetricError::NonBinaryLabel { label: other }),
        }
    }
    let negatives = labels.len() - positives;
    if positives == 0 {
        return Err(MetricError::SingleClass { metric, class: 0 });
    }
    if negatives == 0 {
        return Err(MetricError::SingleClass { metric, class: 1 });
    }
    Ok((positives, negatives))
}

/// Area under the ROC curve via the rank-sum (Mann-Whitney) formula.
///
/// Tied probabilities receive their average rank, so ties between a
/// positive and a negative contribute 0.5 each.
pub fn auroc(labels: &[i64], probabilities: &[f64]) -> Result<f64, MetricError> {
    let (positives, negatives) = check_probability_inputs(labels, probabilities, "AUROC")?;
    let n = labels.len();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    // Average 1-based ranks across tie groups.
    let mut ranks = vec![0.0f64; n];
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && probabilities[order[end + 1]] == probabilities[order[start]] {
            end += 1;
        }
        let rank = (start + end + 2) as f64 / 2.0;
        for &index in &order[start..=end] {
            ranks[index] = rank;
        }
        start = end + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(&label, _)| label == 1)
        .map(|(_, &rank)| rank)
        .sum();

    let positives = positives as f64;
    let negatives = negatives as f64;
    Ok((positive_rank_sum - positives * (positives + 1.0) / 2.0) / (positives * negatives))
}

/// Area under the precision-recall curve as step-wise average precision:
/// the sum of precision at each distinct threshold weighted by the recall
/// gained there.
pub fn auprc(labels: &[i64], probabilities: &[f64]) -> Result<f64, MetricError> {
    let (positives, _) = check_probability_inputs(labels, probabilities, "AUPRC")?;
    let n = labels.len();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));

    let mut true_positives = 0usize;
    let mut false_positives = 0usize;
    let mut previous_recall = 0.0;
    let mut average_precision = 0.0;

    let mut index = 0;
    while index < n {
        // Consume one tie group of equal probabilities as a single threshold.
        let threshold = probabilities[order[index]];
        while index < n && probabilities[order[index]] == threshold {
            if labels[order[index]] == 1 {
                true_positives += 1;
            } else {
                false_positives += 1;
            }
            index += 1;
        }
        let precision = true_positives as f64 / (true_positives + false_positives) as f64;
        let recall = true_positives as f64 / positives as f64;
        average_precision += (recall - previous_recall) * precision;
        previous_recall = recall;
    }

    Ok(average_precision)
}

/// Sample-level metrics over one full cohort pass.
#[derive(Debug, Clone)]
pub struct CohortMetrics {
    /// Per-sample accuracy from the confusion matrix.
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub specificity: f64,
    pub auroc: f64,
    pub auprc: f64,
    pub confusion: ConfusionMatrix,
}

impl CohortMetrics {
    /// Aggregate the full metric battery from parallel sequences of
    /// ground-truth labels, predicted labels, and positive-class
    /// probabilities.
    pub fn aggregate(
        labels: &[i64],
        predictions: &[i64],
        probabilities: &[f64],
    ) -> Result<Self, MetricError> {
        if labels.len() != probabilities.len() {
            return Err(MetricError::LengthMismatch {
                left: labels.len(),
                right: probabilities.len(),
            });
        }
        let confusion = ConfusionMatrix::from_predictions(labels, predictions)?;
        let (macro_precision, macro_recall, macro_f1) = macro_precision_recall_f1(&confusion);

        Ok(CohortMetrics {
            accuracy: confusion.accuracy(),
            macro_precision,
            macro_recall,
            macro_f1,
            specificity: confusion.specificity()?,
            auroc: auroc(labels, probabilities)?,
            auprc: auprc(labels, probabilities)?,
            confusion,
        })
    }
}
