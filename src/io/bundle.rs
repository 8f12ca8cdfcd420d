//! Bundle documents and their consistency rules

use crate::model::{ModelConfig, ModelWeights};
use crate::scale::ScalerParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describes how a bundle was produced and how to rebuild its model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    /// Ordered input features, exactly as consumed by the model
    pub feature_list: Vec<String>,
    pub target: String,
    pub sequence_length: usize,
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f32,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub hyperparameters: BTreeMap<String, String>,
}

impl Metadata {
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::new(self.input_size, self.hidden_size, self.num_layers, self.dropout)
    }
}

/// Scaler parameters tagged with their run id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerDocument {
    pub run_id: String,
    #[serde(flatten)]
    pub params: ScalerParams,
}

/// SHA-256 digests of every bundle file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub files: BTreeMap<String, String>,
}

/// Everything needed to reproduce a forecast: weights, scalers, metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub weights: ModelWeights,
    pub scaler_x: ScalerParams,
    pub scaler_y: ScalerParams,
    pub metadata: Metadata,
}

impl ArtifactBundle {
    pub fn run_id(&self) -> &str {
        &self.metadata.run_id
    }

    /// First internal inconsistency, if any
    ///
    /// Checks the weights' run id and that scaler widths agree with the
    /// declared feature list and input size.
    pub fn inconsistency(&self) -> Option<String> {
        let meta = &self.metadata;
        if self.weights.run_id != meta.run_id {
            return Some(format!(
                "weights belong to run {} but metadata to run {}",
                self.weights.run_id, meta.run_id
            ));
        }
        if meta.feature_list.len() != meta.input_size {
            return Some(format!(
                "metadata lists {} features but input_size is {}",
                meta.feature_list.len(),
                meta.input_size
            ));
        }
        if self.scaler_x.mean.len() != meta.input_size {
            return Some(format!(
                "input scaler has {} features, model expects {}",
                self.scaler_x.mean.len(),
                meta.input_size
            ));
        }
        if self.scaler_y.mean.len() != 1 {
            return Some(format!(
                "target scaler must be 1-D, has {} entries",
                self.scaler_y.mean.len()
            ));
        }
        if meta.sequence_length == 0 {
            return Some("sequence_length must be > 0".into());
        }
        None
    }
}

/// Small consistent bundle for tests
#[cfg(test)]
pub(crate) fn sample_bundle(run_id: &str) -> ArtifactBundle {
    let config = ModelConfig::new(2, 4, 1, 0.0);
    let model = crate::model::ForecastModel::new(config, 1).unwrap();
    ArtifactBundle {
        weights: model.to_weights(run_id),
        scaler_x: ScalerParams {
            mean: vec![1.0, 2.0],
            std: vec![0.5, 0.25],
        },
        scaler_y: ScalerParams {
            mean: vec![3.0],
            std: vec![1.5],
        },
        metadata: Metadata {
            run_id: run_id.into(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            feature_list: vec!["co2_ppm".into(), "humidity".into()],
            target: "co2_ppm".into(),
            sequence_length: 5,
            input_size: 2,
            hidden_size: 4,
            num_layers: 1,
            dropout: 0.0,
            metrics: BTreeMap::new(),
            hyperparameters: BTreeMap::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistent_bundle() {
        assert_eq!(sample_bundle("r1").inconsistency(), None);
    }

    #[test]
    fn test_run_id_mismatch() {
        let mut b = sample_bundle("r1");
        b.weights.run_id = "r2".into();
        assert!(b.inconsistency().unwrap().contains("r2"));
    }

    #[test]
    fn test_scaler_width_mismatch() {
        let mut b = sample_bundle("r1");
        b.scaler_x.mean.push(0.0);
        b.scaler_x.std.push(1.0);
        assert!(b.inconsistency().is_some());
    }

    #[test]
    fn test_scaler_document_is_flat() {
        let doc = ScalerDocument {
            run_id: "r1".into(),
            params: sample_bundle("r1").scaler_y,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["run_id"], "r1");
        assert_eq!(json["mean"][0], 3.0);
        let back: ScalerDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }
}
