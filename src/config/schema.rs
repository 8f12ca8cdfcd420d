//! YAML schema for declarative training runs

use crate::data::{FeatureSchema, HOUR_COS, HOUR_SIN};
use crate::monitor::DriftConfig;
use crate::tracking::ModelStage;
use crate::train::{PipelineSettings, SearchGrid, TrainConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How rows are read from `data.path`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Whole CSV export
    #[default]
    File,
    /// Rows within `lookback_days` of the newest one
    Window,
}

/// Complete training specification
///
/// Every section and field has a default, so an empty document is valid
/// apart from the data path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainSpec {
    pub data: DataSpec,
    pub model: ModelSpec,
    pub training: TrainingSpec,
    pub output: OutputSpec,
    pub drift: DriftConfig,
    /// Hyperparameter grid for `aircast search`
    pub search: SearchGrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataSpec {
    pub source: SourceKind,
    pub path: Option<PathBuf>,
    pub lookback_days: i64,
    pub features: Vec<String>,
    pub target: String,
    /// Append hour_sin / hour_cos derived from timestamps
    pub cyclical_hour: bool,
}

impl Default for DataSpec {
    fn default() -> Self {
        let schema = FeatureSchema::default();
        Self {
            source: SourceKind::File,
            path: None,
            lookback_days: 30,
            features: schema.features,
            target: schema.target,
            cyclical_hour: false,
        }
    }
}

impl DataSpec {
    pub fn schema(&self) -> FeatureSchema {
        let features = self
            .features
            .iter()
            .filter(|f| f.as_str() != HOUR_SIN && f.as_str() != HOUR_COS)
            .cloned()
            .collect();
        let schema = FeatureSchema::new(features, self.target.clone());
        if self.cyclical_hour {
            schema.with_cyclical_hour()
        } else {
            schema
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelSpec {
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f32,
    pub sequence_length: usize,
}

impl Default for ModelSpec {
    fn default() -> Self {
        let training = TrainConfig::default();
        Self {
            hidden_size: training.hidden_size,
            num_layers: training.num_layers,
            dropout: training.dropout,
            sequence_length: PipelineSettings::default().sequence_length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingSpec {
    pub epochs: usize,
    pub learning_rate: f32,
    pub weight_decay: f32,
    pub batch_size: usize,
    pub grad_clip: f32,
    pub physics_weight: f32,
    pub patience: usize,
    pub min_delta: f32,
    pub seed: u64,
    pub train_fraction: f64,
    pub val_fraction: f64,
}

impl Default for TrainingSpec {
    fn default() -> Self {
        let pipeline = PipelineSettings::default();
        let t = pipeline.training;
        Self {
            epochs: t.epochs,
            learning_rate: t.learning_rate,
            weight_decay: t.weight_decay,
            batch_size: t.batch_size,
            grad_clip: t.grad_clip,
            physics_weight: t.physics_weight,
            patience: t.patience,
            min_delta: t.min_delta,
            seed: t.seed,
            train_fraction: pipeline.train_fraction,
            val_fraction: pipeline.val_fraction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSpec {
    pub artifact_dir: PathBuf,
    /// Tracking records are skipped when unset
    pub tracking_dir: Option<PathBuf>,
    pub experiment: String,
    /// Stage a successful run is promoted to
    pub promote: Option<ModelStage>,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("artifacts"),
            tracking_dir: None,
            experiment: "aircast".into(),
            promote: None,
        }
    }
}
