//! Declarative training configuration
//!
//! A YAML [`TrainSpec`] describes where the rows come from, the network
//! shape, the optimization settings and where results go. Command-line
//! [`Overrides`] are applied on top before validation.
//!
//! ```yaml
//! data:
//!   path: data/sensor_logs.csv
//!   features: [co2_ppm, humidity, temperature]
//!   target: co2_ppm
//! model:
//!   sequence_length: 10
//! training:
//!   epochs: 50
//! output:
//!   artifact_dir: artifacts
//!   promote: production
//! ```

mod schema;
mod validate;

pub use schema::{DataSpec, ModelSpec, OutputSpec, SourceKind, TrainSpec, TrainingSpec};
pub use validate::{validate_spec, ValidationError};

use crate::data::{CsvSource, DataSource, Lookback};
use crate::train::{PipelineSettings, TrainConfig};
use crate::tracking::ModelStage;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line values that take precedence over the YAML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub data_path: Option<PathBuf>,
    pub artifact_dir: Option<PathBuf>,
    pub tracking_dir: Option<PathBuf>,
    pub epochs: Option<usize>,
    pub learning_rate: Option<f32>,
    pub sequence_length: Option<usize>,
    pub seed: Option<u64>,
    pub promote: Option<ModelStage>,
}

impl TrainSpec {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Configuration(format!("Failed to parse YAML config: {e}")))
    }

    /// Read and parse a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("Failed to read config file {}: {e}", path.display())))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(path) = &overrides.data_path {
            self.data.path = Some(path.clone());
        }
        if let Some(dir) = &overrides.artifact_dir {
            self.output.artifact_dir = dir.clone();
        }
        if let Some(dir) = &overrides.tracking_dir {
            self.output.tracking_dir = Some(dir.clone());
        }
        if let Some(epochs) = overrides.epochs {
            self.training.epochs = epochs;
        }
        if let Some(lr) = overrides.learning_rate {
            self.training.learning_rate = lr;
        }
        if let Some(length) = overrides.sequence_length {
            self.model.sequence_length = length;
        }
        if let Some(seed) = overrides.seed {
            self.training.seed = seed;
        }
        if overrides.promote.is_some() {
            self.output.promote = overrides.promote;
        }
    }

    pub fn validate(&self, check_paths: bool) -> Result<()> {
        Ok(validate_spec(self, check_paths)?)
    }

    pub fn train_config(&self) -> TrainConfig {
        let t = &self.training;
        TrainConfig {
            hidden_size: self.model.hidden_size,
            num_layers: self.model.num_layers,
            dropout: self.model.dropout,
            learning_rate: t.learning_rate,
            weight_decay: t.weight_decay,
            epochs: t.epochs,
            batch_size: t.batch_size,
            grad_clip: t.grad_clip,
            physics_weight: t.physics_weight,
            patience: t.patience,
            min_delta: t.min_delta,
            seed: t.seed,
        }
    }

    pub fn lookback(&self) -> Lookback {
        match self.data.source {
            SourceKind::File => Lookback::All,
            SourceKind::Window => Lookback::Days(self.data.lookback_days),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            schema: self.data.schema(),
            sequence_length: self.model.sequence_length,
            lookback: self.lookback(),
            train_fraction: self.training.train_fraction,
            val_fraction: self.training.val_fraction,
            training: self.train_config(),
            promote_to: self.output.promote,
            run_id: None,
        }
    }

    /// Row source described by the `data` section
    pub fn data_source(&self) -> Result<Box<dyn DataSource>> {
        let path = self
            .data
            .path
            .as_ref()
            .ok_or_else(|| Error::from(ValidationError::MissingDataPath))?;
        let source = CsvSource::new(path).rolling(self.data.source == SourceKind::Window);
        Ok(Box::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r"
data:
  source: window
  path: data/logs.csv
  lookback_days: 14
  features: [co2_ppm, temperature]
  target: co2_ppm
  cyclical_hour: true
model:
  hidden_size: 32
  sequence_length: 12
training:
  epochs: 5
  physics_weight: 0.05
output:
  artifact_dir: out
  promote: staging
";

    #[test]
    fn test_parse_full_document() {
        let spec = TrainSpec::from_yaml_str(YAML).unwrap();
        assert_eq!(spec.data.source, SourceKind::Window);
        assert_eq!(spec.model.hidden_size, 32);
        assert_eq!(spec.model.num_layers, 2);
        assert_eq!(spec.training.epochs, 5);
        assert_eq!(spec.output.promote, Some(ModelStage::Staging));
        assert_eq!(spec.lookback(), Lookback::Days(14));
        spec.validate(false).unwrap();
    }

    #[test]
    fn test_schema_appends_hour_features() {
        let spec = TrainSpec::from_yaml_str(YAML).unwrap();
        assert_eq!(
            spec.data.schema().features,
            vec!["co2_ppm", "temperature", "hour_sin", "hour_cos"]
        );
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let spec = TrainSpec::from_yaml_str("{}").unwrap();
        assert_eq!(spec, TrainSpec::default());
        assert_eq!(spec.train_config(), TrainConfig::default());
        assert_eq!(spec.validate(false).unwrap_err().to_string(), "Configuration error: Invalid config: Missing data source: set data.path");
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            TrainSpec::from_yaml_str("training:\n  epoch: 3\n"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut spec = TrainSpec::from_yaml_str(YAML).unwrap();
        spec.apply(&Overrides {
            epochs: Some(9),
            seed: Some(7),
            artifact_dir: Some("elsewhere".into()),
            promote: Some(ModelStage::Production),
            ..Overrides::default()
        });
        assert_eq!(spec.training.epochs, 9);
        assert_eq!(spec.train_config().seed, 7);
        assert_eq!(spec.output.artifact_dir, PathBuf::from("elsewhere"));
        assert_eq!(spec.pipeline_settings().promote_to, Some(ModelStage::Production));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut spec = TrainSpec::from_yaml_str(YAML).unwrap();
        spec.training.physics_weight = 0.5;
        assert_eq!(validate_spec(&spec, false), Err(ValidationError::InvalidPhysicsWeight(0.5)));

        let mut spec = TrainSpec::from_yaml_str(YAML).unwrap();
        spec.training.val_fraction = 0.4;
        spec.training.train_fraction = 0.6;
        assert!(matches!(validate_spec(&spec, false), Err(ValidationError::InvalidSplit(..))));

        let mut spec = TrainSpec::from_yaml_str(YAML).unwrap();
        spec.model.sequence_length = 0;
        assert!(spec.validate(false).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_drift_section() {
        let mut spec = TrainSpec::from_yaml_str(YAML).unwrap();
        spec.drift.current_days = 0;
        assert_eq!(
            validate_spec(&spec, false),
            Err(ValidationError::InvalidDriftWindow { current: 0, reference: 7 })
        );

        let mut spec = TrainSpec::from_yaml_str(YAML).unwrap();
        spec.drift.min_samples = 0;
        assert_eq!(validate_spec(&spec, false), Err(ValidationError::InvalidMinSamples(0)));

        for threshold in [0.0, 1.0, 1.5, f64::NAN] {
            let mut spec = TrainSpec::from_yaml_str(YAML).unwrap();
            spec.drift.threshold = threshold;
            assert!(matches!(
                validate_spec(&spec, false),
                Err(ValidationError::InvalidDriftThreshold(_))
            ));
        }

        let mut spec = TrainSpec::from_yaml_str(YAML).unwrap();
        spec.drift.metrics.clear();
        assert_eq!(validate_spec(&spec, false), Err(ValidationError::NoDriftMetrics));
    }

    #[test]
    fn test_drift_section_from_yaml() {
        let yaml = format!("{YAML}drift:\n  reference_days: 14\n  threshold: 0.01\n");
        let spec = TrainSpec::from_yaml_str(&yaml).unwrap();
        assert_eq!(spec.drift.reference_days, 14);
        assert_eq!(spec.drift.current_days, 1);
        spec.validate(false).unwrap();

        let typo = format!("{YAML}drift:\n  treshold: 0.01\n");
        assert!(TrainSpec::from_yaml_str(&typo).is_err());
    }

    #[test]
    fn test_search_section() {
        let yaml = format!("{YAML}search:\n  hidden_size: [16, 32]\n  learning_rate: [0.01, 0.001]\n");
        let spec = TrainSpec::from_yaml_str(&yaml).unwrap();
        assert_eq!(spec.search.num_trials(), 4);
        spec.validate(false).unwrap();

        let mut spec = spec;
        spec.search.epochs = vec![0];
        assert!(matches!(
            validate_spec(&spec, false),
            Err(ValidationError::InvalidSearchGrid(_))
        ));
    }

    #[test]
    fn test_section_defaults_follow_training_defaults() {
        let spec = TrainSpec::default();
        let settings = spec.pipeline_settings();
        let defaults = PipelineSettings::default();
        assert_eq!(settings.training, defaults.training);
        assert_eq!(settings.sequence_length, defaults.sequence_length);
        assert_eq!(settings.train_fraction, defaults.train_fraction);
        assert_eq!(settings.val_fraction, defaults.val_fraction);
    }

    #[test]
    fn test_missing_path_checked_on_disk() {
        let spec = TrainSpec::from_yaml_str(YAML).unwrap();
        assert!(matches!(
            validate_spec(&spec, true),
            Err(ValidationError::DataPathNotFound(_))
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let spec = TrainSpec::from_yaml_str(YAML).unwrap();
        let again = TrainSpec::from_yaml_str(&spec.to_yaml().unwrap()).unwrap();
        assert_eq!(spec, again);
    }
}
