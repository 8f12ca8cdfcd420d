//! aircast: physics-regularized air-quality forecasting
//!
//! Turns time-ordered sensor readings into a near-future forecast of an air
//! quality metric and tells when live data has drifted far enough from what
//! the model was trained on to warrant retraining.
//!
//! # Pipeline
//!
//! - [`data`]: feature rows, forward-fill policy, sliding windows, row sources
//! - [`scale`]: standardization fitted on the training partition only
//! - [`model`]: multi-layer LSTM encoder with a physics-regularized dense head
//! - [`train`]: optimizer loop with clipping, early stopping and divergence abort
//! - [`io`]: immutable, digest-checked artifact bundles
//! - [`inference`]: single and multi-step forecasts from a loaded bundle
//! - [`monitor`]: two-sample KS drift gate
//! - [`tracking`]: experiment runs, metrics and model stage promotion
//!
//! # Example
//!
//! ```no_run
//! use aircast::data::{MemorySource, SyntheticGenerator};
//! use aircast::inference::InferenceEngine;
//! use aircast::io::{ArtifactRef, ArtifactStore};
//! use aircast::train::{PipelineSettings, TrainingPipeline};
//!
//! # fn main() -> aircast::Result<()> {
//! let rows = SyntheticGenerator::new(42).generate(500);
//! let store = ArtifactStore::new("artifacts");
//! let pipeline = TrainingPipeline::new(PipelineSettings::default())?;
//! pipeline.run(&MemorySource::new(rows.clone()), &store, None)?;
//!
//! let engine = InferenceEngine::new(store.load(&ArtifactRef::Latest)?)?;
//! let forecast = engine.predict_multi_step(&rows[rows.len() - 10..], 6)?;
//! println!("{forecast:?}");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod inference;
pub mod io;
pub mod model;
pub mod monitor;
pub mod optim;
pub mod scale;
pub mod tracking;
pub mod train;

pub use error::{Error, Result};
