//! Regression metrics: MSE, MAE, R²
//!
//! Computed in physical units on `f64` after inverse-transforming both the
//! predictions and the ground truth.

use crate::data::Sequences;
use crate::model::ForecastModel;
use crate::scale::TargetScaler;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A scalar score comparing predictions to targets
pub trait Metric {
    /// Score for equally long `predictions` and `targets`; 0 when both are empty
    fn compute(&self, predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64;

    fn name(&self) -> &'static str;

    fn higher_is_better(&self) -> bool {
        true
    }
}

/// Mean squared error
#[derive(Debug, Clone, Copy, Default)]
pub struct MSE;

impl Metric for MSE {
    fn compute(&self, predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64 {
        debug_assert_eq!(predictions.len(), targets.len());
        if predictions.is_empty() {
            return 0.0;
        }
        let sum: f64 = predictions.iter().zip(targets).map(|(p, t)| (t - p).powi(2)).sum();
        sum / predictions.len() as f64
    }

    fn name(&self) -> &'static str {
        "MSE"
    }

    fn higher_is_better(&self) -> bool {
        false
    }
}

/// Mean absolute error
#[derive(Debug, Clone, Copy, Default)]
pub struct MAE;

impl Metric for MAE {
    fn compute(&self, predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64 {
        debug_assert_eq!(predictions.len(), targets.len());
        if predictions.is_empty() {
            return 0.0;
        }
        let sum: f64 = predictions.iter().zip(targets).map(|(p, t)| (t - p).abs()).sum();
        sum / predictions.len() as f64
    }

    fn name(&self) -> &'static str {
        "MAE"
    }

    fn higher_is_better(&self) -> bool {
        false
    }
}

/// Coefficient of determination, `1 − SS_res / SS_tot`
///
/// Constant targets score 1.0 for a perfect prediction and 0.0 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct R2Score;

impl Metric for R2Score {
    fn compute(&self, predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> f64 {
        debug_assert_eq!(predictions.len(), targets.len());
        if predictions.is_empty() {
            return 0.0;
        }
        let mean = targets.sum() / targets.len() as f64;
        let ss_res: f64 = predictions.iter().zip(targets).map(|(p, t)| (t - p).powi(2)).sum();
        let ss_tot: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();
        if ss_tot == 0.0 {
            return if ss_res == 0.0 { 1.0 } else { 0.0 };
        }
        1.0 - ss_res / ss_tot
    }

    fn name(&self) -> &'static str {
        "R²"
    }
}

/// Held-out scores in physical units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub mse: f64,
    pub mae: f64,
    pub r2: f64,
    pub samples: usize,
}

impl RegressionReport {
    pub fn from_predictions(predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> Self {
        Self {
            mse: MSE.compute(predictions, targets),
            mae: MAE.compute(predictions, targets),
            r2: R2Score.compute(predictions, targets),
            samples: predictions.len(),
        }
    }

    /// Stable metric keys: `test_mse`, `test_mae`, `test_r2`
    pub fn to_metrics(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("test_mse".to_string(), self.mse),
            ("test_mae".to_string(), self.mae),
            ("test_r2".to_string(), self.r2),
        ])
    }
}

/// Score `model` on scaled `test` windows after undoing target scaling
pub fn evaluate(model: &ForecastModel, test: &Sequences, target_scaler: &TargetScaler) -> RegressionReport {
    let scaled = model.predict(test.inputs.view());
    let predictions: Array1<f64> = scaled.iter().map(|&v| target_scaler.inverse_value(v)).collect();
    let truth: Array1<f64> = test.targets.iter().map(|&v| target_scaler.inverse_value(v)).collect();
    RegressionReport::from_predictions(predictions.view(), truth.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_perfect_prediction() {
        let y = array![1.0, 2.0, 3.0];
        let report = RegressionReport::from_predictions(y.view(), y.view());
        assert_eq!(report.mse, 0.0);
        assert_eq!(report.mae, 0.0);
        assert_abs_diff_eq!(report.r2, 1.0);
        assert_eq!(report.samples, 3);
    }

    #[test]
    fn test_known_values() {
        let pred = array![1.5, 2.5, 3.5];
        let truth = array![1.0, 2.0, 3.0];
        assert_abs_diff_eq!(MSE.compute(pred.view(), truth.view()), 0.25);
        assert_abs_diff_eq!(MAE.compute(pred.view(), truth.view()), 0.5);
        // SS_res = 0.75, SS_tot = 2
        assert_abs_diff_eq!(R2Score.compute(pred.view(), truth.view()), 0.625);
    }

    #[test]
    fn test_mean_prediction_scores_zero_r2() {
        let truth = array![1.0, 2.0, 3.0];
        let pred = array![2.0, 2.0, 2.0];
        assert_abs_diff_eq!(R2Score.compute(pred.view(), truth.view()), 0.0);
    }

    #[test]
    fn test_constant_targets() {
        let truth = array![4.0, 4.0];
        assert_eq!(R2Score.compute(truth.view(), truth.view()), 1.0);
        assert_eq!(R2Score.compute(array![3.0, 5.0].view(), truth.view()), 0.0);
    }

    #[test]
    fn test_empty_is_zero() {
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(MSE.compute(empty.view(), empty.view()), 0.0);
        assert_eq!(R2Score.compute(empty.view(), empty.view()), 0.0);
    }

    #[test]
    fn test_metric_keys() {
        let y = array![1.0, 2.0];
        let keys: Vec<String> = RegressionReport::from_predictions(y.view(), y.view())
            .to_metrics()
            .into_keys()
            .collect();
        assert_eq!(keys, vec!["test_mae", "test_mse", "test_r2"]);
        assert!(!MAE.higher_is_better());
        assert!(R2Score.higher_is_better());
    }
}
