//! TOML config loading for the lungpred CLI.
//!
//! Deserializes `configs/train.toml` with `[data]`, `[model]`, and
//! `[training]` sections, then merges with CLI overrides.

use std::path::{Path, PathBuf};

use lungnet::model::LungPredictionConfig;
use lungnet::training::trainer::TrainingConfig;
use serde::Deserialize;

/// Top-level structure matching `configs/train.toml`.
///
/// Every section and field is optional; omitted values fall back to the
/// builtin defaults, and CLI flags override both.
#[derive(Debug, Default, Deserialize)]
pub struct TrainToml {
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub training: TrainingSection,
}

/// `[data]` section: where the cohort Parquet files live.
#[derive(Debug, Default, Deserialize)]
pub struct DataSection {
    /// Directory with training.parquet, internal_test.parquet, and
    /// external_test.parquet.
    pub root: Option<PathBuf>,
}

/// `[model]` section: architecture knobs. Input dimensions come from the
/// cohort itself, never from configuration.
#[derive(Debug, Default, Deserialize)]
pub struct ModelSection {
    pub hidden_size: Option<usize>,
    /// Width multiplier for the convolutional encoder.
    pub phi: Option<f64>,
    pub layer_num: Option<usize>,
    pub dropout: Option<f64>,
    pub num_classes: Option<usize>,
}

/// `[training]` section: loop hyperparameters.
#[derive(Debug, Default, Deserialize)]
pub struct TrainingSection {
    pub max_epoch: Option<usize>,
    pub batch_size: Option<usize>,
    pub base_lr: Option<f64>,
    pub weight_decay: Option<f64>,
    pub lr_gamma: Option<f64>,
    pub lr_step_size_up: Option<usize>,
    pub seed: Option<u64>,
}

/// Load and deserialize a `TrainToml` from a TOML file.
pub fn load_train_toml(path: &Path) -> anyhow::Result<TrainToml> {
    let contents = std::fs::read_to_string(path)?;
    let config: TrainToml = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), "Loaded train config");
    Ok(config)
}

/// Build a model configuration from TOML values and CLI flags.
///
/// Priority chain: builtin defaults < TOML values < CLI flags. Input
/// dimensions (image channels, clinical and aux widths) are filled in
/// later from the loaded cohort.
pub fn build_model_config(
    toml: &ModelSection,
    hidden_size_cli: Option<usize>,
    phi_cli: Option<f64>,
    layer_num_cli: Option<usize>,
    dropout_cli: Option<f64>,
) -> LungPredictionConfig {
    let mut config = LungPredictionConfig::new();

    // Apply TOML overrides
    if let Some(n) = toml.hidden_size {
        config.hidden_size = n;
    }
    if let Some(v) = toml.phi {
        config.phi = v;
    }
    if let Some(n) = toml.layer_num {
        config.layer_num = n;
    }
    if let Some(v) = toml.dropout {
        config.dropout = v;
    }
    if let Some(n) = toml.num_classes {
        config.num_classes = n;
    }

    // CLI overrides take highest priority
    if let Some(n) = hidden_size_cli {
        config.hidden_size = n;
    }
    if let Some(v) = phi_cli {
        config.phi = v;
    }
    if let Some(n) = layer_num_cli {
        config.layer_num = n;
    }
    if let Some(v) = dropout_cli {
        config.dropout = v;
    }

    config
}

/// Build a training configuration from TOML values and CLI flags.
///
/// Priority chain: builtin defaults < TOML values < CLI flags.
pub fn build_training_config(
    toml: &TrainingSection,
    max_epoch_cli: Option<usize>,
    batch_size_cli: Option<usize>,
    base_lr_cli: Option<f64>,
    seed_cli: Option<u64>,
) -> TrainingConfig {
    let mut config = TrainingConfig::new();

    // Apply TOML overrides
    if let Some(n) = toml.max_epoch {
        config.max_epoch = n;
    }
    if let Some(n) = toml.batch_size {
        config.batch_size = n;
    }
    if let Some(v) = toml.base_lr {
        config.base_lr = v;
    }
    if let Some(v) = toml.weight_decay {
        config.weight_decay = v;
    }
    if let Some(v) = toml.lr_gamma {
        config.lr_gamma = v;
    }
    if let Some(n) = toml.lr_step_size_up {
        config.lr_step_size_up = n;
    }
    if let Some(n) = toml.seed {
        config.seed = n;
    }

    // CLI overrides take highest priority
    if let Some(n) = max_epoch_cli {
        config.max_epoch = n;
    }
    if let Some(n) = batch_size_cli {
        config.batch_size = n;
    }
    if let Some(v) = base_lr_cli {
        config.base_lr = v;
    }
    if let Some(n) = seed_cli {
        config.seed = n;
    }

    config
}

/// Resolve the data root. Priority: CLI flag, then `[data] root`.
pub fn resolve_data_root(toml: &DataSection, cli: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    cli.or_else(|| toml.root.clone()).ok_or_else(|| {
        anyhow::anyhow!("No data root configured; pass --data-root or set [data] root in the config")
    })
}
