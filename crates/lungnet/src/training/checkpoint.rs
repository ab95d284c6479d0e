//! Per-cohort best-accuracy checkpointing.

use std::path::{Path, PathBuf};

use anyhow::Result;
use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use cohort::Split;

use crate::model::LungPrediction;

/// Tracks the best accuracy seen for one cohort and persists the model
/// parameters whenever it strictly improves.
///
/// Each cohort keeps independent state and an independent checkpoint
/// file; an improvement on one never moves the other's threshold. Only
/// the latest best checkpoint is retained.
#[derive(Debug)]
pub struct BestCheckpoint {
    split: Split,
    path: PathBuf,
    best_accuracy: f64,
}

impl BestCheckpoint {
    /// Track `split`, writing checkpoints under `run_dir`. The best
    /// accuracy starts at 0, so a first epoch scoring 0 is not saved.
    pub fn new(split: Split, run_dir: &Path) -> Self {
        Self {
            split,
            path: run_dir.join(split.checkpoint_stem()),
            best_accuracy: 0.0,
        }
    }

    /// Best accuracy observed so far.
    pub fn best_accuracy(&self) -> f64 {
        self.best_accuracy
    }

    /// Checkpoint path stem. The recorder appends its own extension.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compare `accuracy` with the best seen. On strict improvement,
    /// persist the model (overwriting any prior checkpoint for this
    /// cohort) and return true.
    pub fn observe<B: Backend>(
        &mut self,
        accuracy: f64,
        model: &LungPrediction<B>,
    ) -> Result<bool> {
        if accuracy <= self.best_accuracy {
            return Ok(false);
        }
        self.best_accuracy = accuracy;

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        model
            .clone()
            .save_file(&self.path, &recorder)
            .map_err(|e| anyhow::anyhow!("Failed to save {} checkpoint: {e}", self.split))?;
        tracing::info!(
            cohort = %self.split,
            accuracy,
            path = %self.path.display(),
            "New best accuracy, checkpoint saved"
        );
        Ok(true)
    }
}

/// Load model parameters from a checkpoint written by [`BestCheckpoint`].
///
/// `path` is the stem without extension, as returned by
/// [`BestCheckpoint::path`].
pub fn load_checkpoint<B: Backend>(
    model: LungPrediction<B>,
    path: &Path,
    device: &B::Device,
) -> Result<LungPrediction<B>> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .load_file(path, &recorder, device)
        .map_err(|e| anyhow::anyhow!("Failed to load checkpoint from {}: {e}", path.display()))
}
