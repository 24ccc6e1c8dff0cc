use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, NetworkError};

/// Hyperparameters of a training run.
///
/// Read from RON, e.g. `(epochs: 50, learning_rate: 0.001, decay_divisor: 2.0)`.
/// Fields left out keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// The learning rate is divided by this every 10 epochs, must be > 1
    pub decay_divisor: f64,
    pub log_progress: bool,
    /// Reseeds the network's random source before training
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 0.01,
            decay_divisor: 1.68,
            log_progress: false,
            seed: None,
        }
    }
}

impl TrainingConfig {
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: TrainingConfig = ron::from_str(source)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_ron(&source)
    }

    pub fn validate(&self) -> Result<(), NetworkError> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            Err(NetworkError::InvalidHyperparameter {
                name: "learning_rate",
                value: self.learning_rate,
            })?;
        }
        if !(self.decay_divisor > 1.0 && self.decay_divisor.is_finite()) {
            Err(NetworkError::InvalidHyperparameter {
                name: "decay_divisor",
                value: self.decay_divisor,
            })?;
        }
        Ok(())
    }
}
