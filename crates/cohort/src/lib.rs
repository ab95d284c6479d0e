//! Parquet I/O for multi-modal classification cohorts.
//!
//! Provides sample record types, named dataset splits, and reading/writing
//! of cohort files for training and evaluating the lung classifier.

pub mod reader;
pub mod types;
pub mod writer;

pub use reader::CohortReader;
pub use types::{Cohort, CohortSummary, SampleRecord, Split, TensorShapes};
pub use writer::{cohort_schema, CohortWriter};
