//! Data types for cohort samples, splits, and summaries.

use std::fmt;

/// Named dataset split. Three cohorts exist per data root: the training set
/// and two held-out test sets (internal and external).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Training,
    InternalTest,
    ExternalTest,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Training => write!(f, "Training"),
            Self::InternalTest => write!(f, "Internal test"),
            Self::ExternalTest => write!(f, "External test"),
        }
    }
}

impl Split {
    /// All splits in canonical order.
    pub const ALL: [Split; 3] = [Split::Training, Split::InternalTest, Split::ExternalTest];

    /// Snake-case stem used for file naming.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::InternalTest => "internal_test",
            Self::ExternalTest => "external_test",
        }
    }

    /// Parquet file name for this split under a data root.
    pub fn file_name(&self) -> String {
        format!("{}.parquet", self.file_stem())
    }

    /// Checkpoint file stem for this split. The recorder appends its own
    /// extension when saving.
    pub fn checkpoint_stem(&self) -> String {
        format!("{}_model", self.file_stem())
    }

    /// Parse from a split name. Accepts the display name, the file stem, or
    /// a hyphenated stem. Returns None for unrecognized values.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Training" | "training" => Some(Self::Training),
            "Internal test" | "internal_test" | "internal-test" => Some(Self::InternalTest),
            "External test" | "external_test" | "external-test" => Some(Self::ExternalTest),
            _ => None,
        }
    }
}

/// Fixed per-cohort tensor dimensions. Every record in a cohort carries the
/// same shapes; the reader enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorShapes {
    /// Image dimensions as [channels, height, width].
    pub image: [usize; 3],
    /// Length of the clinical feature vector.
    pub clinical: usize,
    /// Length of the auxiliary feature vector.
    pub aux: usize,
}

impl TensorShapes {
    /// Flat element count of one image tensor.
    pub fn image_len(&self) -> usize {
        self.image[0] * self.image[1] * self.image[2]
    }
}

/// A single labeled multi-modal sample.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    /// Stable identifier from the source cohort (patient/scan id).
    pub sample_id: String,
    /// Image tensor in channels-height-width order, row major.
    pub image: Vec<f32>,
    /// Clinical feature vector.
    pub clinical: Vec<f32>,
    /// Auxiliary feature vector.
    pub aux: Vec<f32>,
    /// Class label, 0 or 1 for the binary task.
    pub label: i64,
}

/// Label balance for a cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortSummary {
    /// Total number of samples.
    pub total: usize,
    /// Samples with label 1.
    pub positives: usize,
    /// Samples with label 0.
    pub negatives: usize,
}

/// An ordered collection of samples for one split, with validated shapes.
#[derive(Debug, Clone)]
pub struct Cohort {
    /// Which split these samples belong to.
    pub split: Split,
    /// Tensor dimensions shared by every record.
    pub shapes: TensorShapes,
    /// Samples in insertion order.
    pub records: Vec<SampleRecord>,
}

impl Cohort {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the cohort holds no samples.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fixed-size batches in insertion order. The final batch is shorter
    /// when `batch_size` does not divide the cohort size.
    ///
    /// # Panics
    /// Panics if `batch_size` is zero.
    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, SampleRecord> {
        self.records.chunks(batch_size)
    }

    /// Number of batches produced by [`Cohort::batches`] for a given size.
    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.records.len().div_ceil(batch_size)
    }

    /// Count samples per class.
    pub fn summary(&self) -> CohortSummary {
        let positives = self.records.iter().filter(|r| r.label == 1).count();
        let negatives = self.records.iter().filter(|r| r.label == 0).count();
        CohortSummary {
            total: self.records.len(),
            positives,
            negatives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(id: usize, label: i64) -> SampleRecord {
        SampleRecord {
            sample_id: format!("s{id}"),
            image: vec![0.0; 4],
            clinical: vec![0.0; 2],
            aux: vec![0.0; 1],
            label,
        }
    }

    fn make_cohort(labels: &[i64]) -> Cohort {
        Cohort {
            split: Split::Training,
            shapes: TensorShapes {
                image: [1, 2, 2],
                clinical: 2,
                aux: 1,
            },
            records: labels
                .iter()
                .enumerate()
                .map(|(i, &l)| make_record(i, l))
                .collect(),
        }
    }

    #[test]
    fn test_split_display() {
        assert_eq!(Split::Training.to_string(), "Training");
        assert_eq!(Split::InternalTest.to_string(), "Internal test");
        assert_eq!(Split::ExternalTest.to_string(), "External test");
    }

    #[test]
    fn test_split_file_names() {
        assert_eq!(Split::Training.file_name(), "training.parquet");
        assert_eq!(Split::InternalTest.file_name(), "internal_test.parquet");
        assert_eq!(Split::ExternalTest.checkpoint_stem(), "external_test_model");
    }

    #[test]
    fn test_split_from_name() {
        assert_eq!(Split::from_name("Training"), Some(Split::Training));
        assert_eq!(Split::from_name("internal_test"), Some(Split::InternalTest));
        assert_eq!(Split::from_name("internal-test"), Some(Split::InternalTest));
        assert_eq!(Split::from_name("External test"), Some(Split::ExternalTest));
        assert_eq!(Split::from_name("validation"), None);
        assert_eq!(Split::from_name(""), None);
    }

    #[test]
    fn test_batches_keeps_short_final_batch() {
        let cohort = make_cohort(&[0, 1, 0, 1, 1]);
        let sizes: Vec<usize> = cohort.batches(2).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(cohort.num_batches(2), 3);
        assert_eq!(cohort.num_batches(5), 1);
        assert_eq!(cohort.num_batches(8), 1);
    }

    #[test]
    fn test_batches_preserve_insertion_order() {
        let cohort = make_cohort(&[0, 1, 0, 1]);
        let ids: Vec<&str> = cohort
            .batches(3)
            .flatten()
            .map(|r| r.sample_id.as_str())
            .collect();
        assert_eq!(ids, vec!["s0", "s1", "s2", "s3"]);
    }

    #[test]
    fn test_summary_counts() {
        let cohort = make_cohort(&[0, 1, 1, 0, 1]);
        let summary = cohort.summary();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.positives, 3);
        assert_eq!(summary.negatives, 2);
    }

    #[test]
    fn test_image_len() {
        let shapes = TensorShapes {
            image: [3, 8, 8],
            clinical: 9,
            aux: 4,
        };
        assert_eq!(shapes.image_len(), 192);
    }
}
