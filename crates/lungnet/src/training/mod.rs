//! Training pipeline: cyclical learning-rate schedule, evaluation metrics,
//! per-cohort checkpointing, run logging, and the Adam training loop.

pub mod checkpoint;
pub mod evaluate;
pub mod logits;
pub mod metrics;
pub mod scalars;
pub mod schedule;
pub mod trainer;
