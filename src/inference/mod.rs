//! Forecast serving
//!
//! An [`InferenceEngine`] is built from one [`ArtifactBundle`](crate::io::ArtifactBundle)
//! and reproduces the training-time preprocessing for single and multi-step
//! forecasts. Forecast values can be mapped onto severity bands with
//! [`classify`].

mod category;
mod engine;

pub use category::{classify, AqiCategory, Classification};
pub use engine::{base_confidence, Forecast, ForecastStep, InferenceEngine};
