//! Multi-modal binary lung classifier: the fused network, cohort metrics,
//! and the epoch-based training and evaluation loops around it.

pub mod model;
pub mod training;
