//! Model components: the fused classifier network and the bridge between
//! host-side cohort records and burn tensors.

pub mod batch;
pub mod net;

pub use batch::LungBatch;
pub use net::{LungPrediction, LungPredictionConfig};
