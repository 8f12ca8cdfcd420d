//! Training hyperparameters

use crate::model::ModelConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest accepted physics loss weight relative to the primary loss
pub const MAX_PHYSICS_WEIGHT: f32 = 0.1;

/// Hyperparameters for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f32,
    pub learning_rate: f32,
    pub weight_decay: f32,
    pub epochs: usize,
    /// Windows per optimizer step; 0 means one full batch per epoch
    pub batch_size: usize,
    pub grad_clip: f32,
    /// λ in `total = mse + λ·physics`
    pub physics_weight: f32,
    pub patience: usize,
    pub min_delta: f32,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            hidden_size: 64,
            num_layers: 2,
            dropout: 0.2,
            learning_rate: 0.001,
            weight_decay: 1e-4,
            epochs: 100,
            batch_size: 32,
            grad_clip: 1.0,
            physics_weight: 0.01,
            patience: 20,
            min_delta: 0.0,
            seed: 42,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f32| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(Error::Configuration(format!("{name} must be finite and > 0, got {v}")))
            }
        };
        positive("learning_rate", self.learning_rate)?;
        positive("grad_clip", self.grad_clip)?;
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(Error::Configuration(format!(
                "weight_decay must be >= 0, got {}",
                self.weight_decay
            )));
        }
        if !(0.0..=MAX_PHYSICS_WEIGHT).contains(&self.physics_weight) {
            return Err(Error::Configuration(format!(
                "physics_weight must be in [0, {MAX_PHYSICS_WEIGHT}], got {}",
                self.physics_weight
            )));
        }
        if self.epochs == 0 {
            return Err(Error::Configuration("epochs must be > 0".into()));
        }
        if self.patience == 0 {
            return Err(Error::Configuration("patience must be > 0".into()));
        }
        if !(self.min_delta.is_finite() && self.min_delta >= 0.0) {
            return Err(Error::Configuration("min_delta must be >= 0".into()));
        }
        self.model_config(1).validate()
    }

    /// Architecture for `input_size` features
    pub fn model_config(&self, input_size: usize) -> ModelConfig {
        ModelConfig::new(input_size, self.hidden_size, self.num_layers, self.dropout)
    }

    /// String-encoded hyperparameters for metadata and tracking
    pub fn to_params(&self) -> BTreeMap<String, String> {
        [
            ("hidden_size", self.hidden_size.to_string()),
            ("num_layers", self.num_layers.to_string()),
            ("dropout", self.dropout.to_string()),
            ("learning_rate", self.learning_rate.to_string()),
            ("weight_decay", self.weight_decay.to_string()),
            ("epochs", self.epochs.to_string()),
            ("batch_size", self.batch_size.to_string()),
            ("grad_clip", self.grad_clip.to_string()),
            ("physics_weight", self.physics_weight.to_string()),
            ("patience", self.patience.to_string()),
            ("min_delta", self.min_delta.to_string()),
            ("seed", self.seed.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        TrainConfig::default().validate().unwrap();
    }

    #[test]
    fn test_physics_weight_bounds() {
        let mut config = TrainConfig::default();
        config.physics_weight = 0.0;
        assert!(config.validate().is_ok());
        config.physics_weight = 0.1;
        assert!(config.validate().is_ok());
        config.physics_weight = 0.5;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
        config.physics_weight = -0.01;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_architecture() {
        let config = TrainConfig {
            hidden_size: 2,
            ..TrainConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_rates() {
        let config = TrainConfig {
            learning_rate: 0.0,
            ..TrainConfig::default()
        };
        assert!(config.validate().is_err());
        let config = TrainConfig {
            grad_clip: f32::NAN,
            ..TrainConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_params_cover_every_field() {
        let params = TrainConfig::default().to_params();
        assert_eq!(params.len(), 12);
        assert_eq!(params["physics_weight"], "0.01");
        assert_eq!(params["seed"], "42");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: TrainConfig = serde_yaml::from_str("epochs: 5\nlearning_rate: 0.01\n").unwrap();
        assert_eq!(config.epochs, 5);
        assert_eq!(config.patience, 20);
    }
}
