//! Regression metrics for held-out evaluation

mod regression;

pub use regression::{evaluate, Metric, R2Score, RegressionReport, MAE, MSE};
