//! Training loop
//!
//! [`Trainer`] fits a [`ForecastModel`](crate::model::ForecastModel) on scaled
//! windows with Adam, gradient clipping, the physics-informed loss term and
//! early stopping. [`TrainingPipeline`] wraps it into a full run: fetch rows,
//! build windows, split chronologically, fit the scalers, train, evaluate on
//! the held-out tail and persist the artifact bundle. [`GridSearch`] runs the
//! pipeline once per point of a hyperparameter grid.

mod callback;
mod config;
mod early_stopping;
mod metrics;
mod pipeline;
mod search;
mod trainer;

pub use callback::{EpochCallback, NoCallback, SinkCallback};
pub use config::{TrainConfig, MAX_PHYSICS_WEIGHT};
pub use early_stopping::EarlyStopping;
pub use metrics::{evaluate, Metric, R2Score, RegressionReport, MAE, MSE};
pub use pipeline::{PipelineOutcome, PipelineSettings, TrainingPipeline};
pub use search::{GridSearch, SearchGrid, SearchReport, Trial, TrialResult};
pub use trainer::{EpochMetrics, TrainReport, Trainer};
