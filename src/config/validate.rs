//! Training specification validation

use super::schema::{SourceKind, TrainSpec};
use crate::train::MAX_PHYSICS_WEIGHT;

/// Validation error type
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Missing data source: set data.path")]
    MissingDataPath,

    #[error("Data path does not exist: {0}")]
    DataPathNotFound(String),

    #[error("Invalid lookback: {0} days (must be > 0)")]
    InvalidLookback(i64),

    #[error("Feature list is empty")]
    NoFeatures,

    #[error("Invalid sequence length: {0} (must be > 0)")]
    InvalidSequenceLength(usize),

    #[error("Invalid hidden size: {0} (must be >= 4)")]
    InvalidHiddenSize(usize),

    #[error("Invalid layer count: {0} (must be > 0)")]
    InvalidNumLayers(usize),

    #[error("Invalid dropout: {0} (must be in [0.0, 1.0))")]
    InvalidDropout(f32),

    #[error("Invalid learning rate: {0} (must be > 0.0 and <= 1.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid epochs: {0} (must be > 0)")]
    InvalidEpochs(usize),

    #[error("Invalid gradient clip: {0} (must be > 0.0)")]
    InvalidGradClip(f32),

    #[error("Invalid physics weight: {0} (must be in [0.0, 0.1])")]
    InvalidPhysicsWeight(f32),

    #[error("Invalid split: train={0}, val={1} (need train > 0, val >= 0, train + val < 1)")]
    InvalidSplit(f64, f64),

    #[error("Invalid drift windows: current={current} days, reference={reference} days (must be > 0)")]
    InvalidDriftWindow { current: i64, reference: i64 },

    #[error("Drift metric list is empty")]
    NoDriftMetrics,

    #[error("Invalid drift threshold: {0} (must be in (0.0, 1.0))")]
    InvalidDriftThreshold(f64),

    #[error("Invalid drift min_samples: {0} (must be >= 1)")]
    InvalidMinSamples(usize),

    #[error("Invalid search grid: {0}")]
    InvalidSearchGrid(String),
}

impl From<ValidationError> for crate::Error {
    fn from(e: ValidationError) -> Self {
        crate::Error::Configuration(format!("Invalid config: {e}"))
    }
}

/// Check a specification before any data is touched
///
/// Path existence is checked only when `check_paths` is set so that specs
/// can be validated away from their data.
pub fn validate_spec(spec: &TrainSpec, check_paths: bool) -> Result<(), ValidationError> {
    let data = &spec.data;
    let path = data.path.as_ref().ok_or(ValidationError::MissingDataPath)?;
    if check_paths && !path.exists() {
        return Err(ValidationError::DataPathNotFound(path.display().to_string()));
    }
    if data.source == SourceKind::Window && data.lookback_days <= 0 {
        return Err(ValidationError::InvalidLookback(data.lookback_days));
    }
    if data.features.is_empty() && !data.cyclical_hour {
        return Err(ValidationError::NoFeatures);
    }

    let model = &spec.model;
    if model.sequence_length == 0 {
        return Err(ValidationError::InvalidSequenceLength(model.sequence_length));
    }
    if model.hidden_size < 4 {
        return Err(ValidationError::InvalidHiddenSize(model.hidden_size));
    }
    if model.num_layers == 0 {
        return Err(ValidationError::InvalidNumLayers(model.num_layers));
    }
    if !(0.0..1.0).contains(&model.dropout) {
        return Err(ValidationError::InvalidDropout(model.dropout));
    }

    let training = &spec.training;
    if training.learning_rate.is_nan() || training.learning_rate <= 0.0 || training.learning_rate > 1.0 {
        return Err(ValidationError::InvalidLearningRate(training.learning_rate));
    }
    if training.epochs == 0 {
        return Err(ValidationError::InvalidEpochs(training.epochs));
    }
    if training.grad_clip.is_nan() || training.grad_clip <= 0.0 {
        return Err(ValidationError::InvalidGradClip(training.grad_clip));
    }
    if !(0.0..=MAX_PHYSICS_WEIGHT).contains(&training.physics_weight) {
        return Err(ValidationError::InvalidPhysicsWeight(training.physics_weight));
    }
    let (train, val) = (training.train_fraction, training.val_fraction);
    if !(train > 0.0 && val >= 0.0 && train + val < 1.0) {
        return Err(ValidationError::InvalidSplit(train, val));
    }

    let drift = &spec.drift;
    if drift.current_days <= 0 || drift.reference_days <= 0 {
        return Err(ValidationError::InvalidDriftWindow {
            current: drift.current_days,
            reference: drift.reference_days,
        });
    }
    if drift.metrics.is_empty() {
        return Err(ValidationError::NoDriftMetrics);
    }
    if !(drift.threshold > 0.0 && drift.threshold < 1.0) {
        return Err(ValidationError::InvalidDriftThreshold(drift.threshold));
    }
    if drift.min_samples == 0 {
        return Err(ValidationError::InvalidMinSamples(drift.min_samples));
    }

    if let Some(problem) = spec.search.problem() {
        return Err(ValidationError::InvalidSearchGrid(problem));
    }
    Ok(())
}
