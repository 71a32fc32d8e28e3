use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use super::Backbone;
use crate::error::OrchestratorError;

/// The options of a fine-tuning run, read from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FinetuneConfig {
    /// Where the `cifar-10-batches-bin` directory lives.
    pub data_dir: PathBuf,
    /// The fraction of the training set kept by class-balanced subsampling.
    pub pct: f64,
    pub batch_size: NonZeroUsize,
    pub backbone: Backbone,
    /// The output width of the projection head stored in the pretrained checkpoint.
    pub projection_dim: NonZeroUsize,
    /// The pretraining epoch whose checkpoint is loaded.
    pub load_epoch: usize,
    /// Whether the encoder is trained along with the linear head.
    pub finetune: bool,
    pub momentum: f32,
    /// The peak of the cosine factor applied to `base_lr`.
    pub learning_rate: f64,
    pub finetune_epochs: NonZeroUsize,
    /// The horizon of the cosine schedule, in epochs. Defaults to `finetune_epochs`.
    #[serde(default)]
    pub epochs: Option<NonZeroUsize>,
    #[serde(default = "default_base_lr")]
    pub base_lr: f64,
    #[serde(default = "default_lr_min")]
    pub lr_min: f64,
    #[serde(default = "default_patience")]
    pub patience: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Where checkpoints and the run log are read from and written to.
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,
}

fn default_base_lr() -> f64 {
    0.2
}

fn default_lr_min() -> f64 {
    1e-3
}

fn default_patience() -> usize {
    2
}

fn default_run_dir() -> PathBuf {
    PathBuf::from(".")
}

impl FinetuneConfig {
    /// Reads and validates a config file.
    ///
    /// # Arguments
    /// * `path` - The JSON file to read.
    ///
    /// # Returns
    /// The config or an error if the file can't be read, parsed or holds invalid values.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, OrchestratorError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let config: Self =
            serde_json::from_str(&content).map_err(|source| OrchestratorError::ParseConfig {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// The amount of epochs the learning rate schedule spans.
    pub fn schedule_epochs(&self) -> usize {
        self.epochs.unwrap_or(self.finetune_epochs).get()
    }

    pub fn validate(&self) -> Result<(), OrchestratorError> {
        let positive = [
            ("learning_rate", self.learning_rate),
            ("base_lr", self.base_lr),
        ];

        for (name, value) in positive {
            if !(value.is_finite() && value > 0.) {
                return Err(OrchestratorError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }

        if !(self.lr_min.is_finite() && self.lr_min >= 0.) {
            return Err(OrchestratorError::InvalidConfig(format!(
                "lr_min must be a non negative number, got {}",
                self.lr_min
            )));
        }

        if !(0. ..1.).contains(&self.momentum) {
            return Err(OrchestratorError::InvalidConfig(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }

        Ok(())
    }
}
