//! Forecasting from a loaded artifact bundle

use crate::data::synthetic::gaussian;
use crate::data::{fill_matrix, FeatureRow};
use crate::io::{ArtifactBundle, Metadata};
use crate::model::ForecastModel;
use crate::scale::{StandardScaler, TargetScaler};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use ndarray::{s, Array2, Array3, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Center of the confidence heuristic
const CONFIDENCE_CENTER: f64 = 75.0;
const CONFIDENCE_SPREAD: f64 = 200.0;
const CONFIDENCE_MIN: f64 = 0.6;
const CONFIDENCE_MAX: f64 = 0.95;
/// Per-step confidence decay of multi-step forecasts
const CONFIDENCE_DECAY: f64 = 0.95;
/// Std of the perturbation applied to the synthetic next row (scaled space)
const ROLLOUT_NOISE_STD: f64 = 0.1;

/// `clamp(1 − |value − 75| / 200, 0.6, 0.95)`
pub fn base_confidence(value: f64) -> f64 {
    (1.0 - (value - CONFIDENCE_CENTER).abs() / CONFIDENCE_SPREAD).clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}

/// Single forecast in physical units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub value: f64,
    /// Time the forecast refers to
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
}

/// One entry of a multi-step forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    pub step: usize,
    pub predicted_time: DateTime<Utc>,
    pub forecast_value: f64,
    pub confidence: f64,
}

/// Read-only forecaster over one artifact bundle
///
/// Every call reproduces the training-time preprocessing: forward fill in
/// feature-list order, then the bundle's fitted input scaler.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    model: ForecastModel,
    scaler_x: StandardScaler,
    scaler_y: TargetScaler,
    metadata: Metadata,
    interval: Duration,
}

impl InferenceEngine {
    /// Build the model declared by the bundle metadata and load its weights
    pub fn new(bundle: ArtifactBundle) -> Result<Self> {
        if let Some(problem) = bundle.inconsistency() {
            return Err(Error::Configuration(problem));
        }
        let model = ForecastModel::from_weights(bundle.metadata.model_config(), &bundle.weights)?;
        let scaler_x = StandardScaler::from_params(bundle.scaler_x)?;
        let scaler_y = TargetScaler::from_params(bundle.scaler_y)?;
        tracing::info!(
            run_id = %bundle.metadata.run_id,
            features = ?bundle.metadata.feature_list,
            sequence_length = bundle.metadata.sequence_length,
            parameters = model.num_parameters(),
            "inference engine ready"
        );
        Ok(Self {
            model,
            scaler_x,
            scaler_y,
            metadata: bundle.metadata,
            interval: Duration::hours(1),
        })
    }

    /// Spacing between multi-step forecast times
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn run_id(&self) -> &str {
        &self.metadata.run_id
    }

    pub fn sequence_length(&self) -> usize {
        self.metadata.sequence_length
    }

    /// Forecast the value one interval after the newest row
    pub fn predict_single(&self, rows: &[FeatureRow]) -> Result<Forecast> {
        let (scaled, anchor) = self.prepare(rows)?;
        let value = self.forecast_scaled(&scaled);
        if !value.is_finite() {
            return Err(Error::Preprocessing(format!("non-finite forecast for run {}", self.run_id())));
        }
        Ok(Forecast {
            value,
            timestamp: anchor + self.interval,
            confidence: base_confidence(value),
        })
    }

    /// Iterated forecast over `horizon` intervals with thread-local noise
    pub fn predict_multi_step(&self, rows: &[FeatureRow], horizon: usize) -> Result<Vec<ForecastStep>> {
        self.predict_multi_step_with(rows, horizon, &mut rand::rng())
    }

    /// Iterated forecast with a caller-supplied noise source
    ///
    /// After each step the oldest row leaves the window and a copy of the
    /// newest row perturbed by N(0, 0.1) in scaled space is appended.
    /// Confidence decays by 0.95 per step and never increases. The rollout
    /// stops at the first non-finite value.
    pub fn predict_multi_step_with<R: Rng>(
        &self,
        rows: &[FeatureRow],
        horizon: usize,
        rng: &mut R,
    ) -> Result<Vec<ForecastStep>> {
        let (mut window, anchor) = self.prepare(rows)?;
        let length = self.sequence_length();
        let mut steps = Vec::with_capacity(horizon);
        let mut ceiling = CONFIDENCE_MAX;

        for step in 1..=horizon {
            let value = self.forecast_scaled(&window);
            if !value.is_finite() {
                tracing::warn!(step, "stopping rollout at non-finite forecast");
                break;
            }
            let decay = CONFIDENCE_DECAY.powi(step as i32 - 1);
            let confidence = (base_confidence(value) * decay).min(ceiling);
            ceiling = confidence;
            steps.push(ForecastStep {
                step,
                predicted_time: anchor + self.interval * step as i32,
                forecast_value: value,
                confidence,
            });

            let mut next = window.row(window.nrows() - 1).to_owned();
            next.mapv_inplace(|v| v + (ROLLOUT_NOISE_STD * gaussian(rng)) as f32);
            if window.nrows() >= length {
                window = window.slice(s![1.., ..]).to_owned();
            }
            window.push_row(next.view()).map_err(|e| Error::Preprocessing(e.to_string()))?;
        }
        tracing::debug!(requested = horizon, produced = steps.len(), "multi-step forecast");
        Ok(steps)
    }

    /// Fill, project and scale rows; keep at most the last L
    fn prepare(&self, rows: &[FeatureRow]) -> Result<(Array2<f32>, DateTime<Utc>)> {
        let Some(anchor) = rows.iter().map(|r| r.timestamp).max() else {
            return Err(Error::insufficient(1, 0, "inference rows"));
        };
        let mut ordered = rows.to_vec();
        ordered.sort_by_key(|r| r.timestamp);
        let filled = fill_matrix(&ordered, &self.metadata.feature_list);
        let start = filled.nrows().saturating_sub(self.sequence_length());
        let scaled = self.scaler_x.transform_rows(filled.slice(s![start.., ..]))?;
        Ok((scaled, anchor))
    }

    /// Model output in physical units for a scaled window of at most L rows
    ///
    /// Short windows are left-padded with zero rows.
    fn forecast_scaled(&self, window: &Array2<f32>) -> f64 {
        let length = self.sequence_length();
        let features = window.ncols();
        let mut input = Array3::<f32>::zeros((1, length, features));
        let offset = length.saturating_sub(window.nrows());
        let keep = window.nrows().min(length);
        input
            .index_axis_mut(Axis(0), 0)
            .slice_mut(s![offset.., ..])
            .assign(&window.slice(s![window.nrows() - keep.., ..]));
        let scaled = self.model.predict(input.view());
        self.scaler_y.inverse_value(scaled[0])
    }
}
