//! Leakage-safe standardization
//!
//! Scalers are created only by fitting on a training partition (or by
//! restoring persisted parameters) and have no refit method, so validation,
//! test and inference data can only ever be transformed with statistics
//! computed from training data.

use crate::{Error, Result};
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Added to the standard deviation before dividing
pub const EPSILON: f64 = 1e-8;

/// Per-feature mean and population standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ScalerParams {
    fn validate(&self) -> Result<()> {
        if self.mean.len() != self.std.len() || self.mean.is_empty() {
            return Err(Error::Configuration(format!(
                "scaler has {} means and {} standard deviations",
                self.mean.len(),
                self.std.len()
            )));
        }
        if self.mean.iter().chain(&self.std).any(|v| !v.is_finite()) || self.std.iter().any(|s| *s < 0.0) {
            return Err(Error::Configuration("scaler parameters must be finite, std >= 0".into()));
        }
        Ok(())
    }
}

/// Mean/std accumulated in f64, in row order
fn column_stats(x: ArrayView2<'_, f32>) -> (Vec<f64>, Vec<f64>) {
    let n = x.nrows() as f64;
    x.axis_iter(Axis(1))
        .map(|col| {
            let mean = col.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
            let var = col.iter().map(|&v| (f64::from(v) - mean).powi(2)).sum::<f64>() / n;
            (mean, var.sqrt())
        })
        .unzip()
}

/// Fitted feature scaler
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    params: ScalerParams,
}

impl StandardScaler {
    /// Fit on training windows `(N, L, F)` flattened to `(N·L, F)`
    pub fn fit(train: &Array3<f32>) -> Result<Self> {
        let (n, l, f) = train.dim();
        let flat = train
            .view()
            .into_shape_with_order((n * l, f))
            .map_err(|e| Error::Preprocessing(format!("cannot flatten training tensor: {e}")))?;
        Self::fit_rows(flat)
    }

    /// Fit on a `(rows, F)` matrix
    pub fn fit_rows(x: ArrayView2<'_, f32>) -> Result<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(Error::insufficient(1, x.nrows(), "scaler fit"));
        }
        let (mean, std) = column_stats(x);
        Ok(Self {
            params: ScalerParams { mean, std },
        })
    }

    /// Restore a scaler from persisted parameters
    pub fn from_params(params: ScalerParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ScalerParams {
        &self.params
    }

    pub fn num_features(&self) -> usize {
        self.params.mean.len()
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.num_features() {
            return Err(Error::Configuration(format!(
                "scaler fitted on {} features, got {width}",
                self.num_features()
            )));
        }
        Ok(())
    }

    /// `(x - mean) / (std + ε)` on a `(rows, F)` matrix
    pub fn transform_rows(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        self.check_width(x.ncols())?;
        let mut out = x.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.params.mean[j], self.params.std[j] + EPSILON);
            col.mapv_inplace(|v| ((f64::from(v) - m) / s) as f32);
        }
        Ok(out)
    }

    pub fn inverse_transform_rows(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        self.check_width(x.ncols())?;
        let mut out = x.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.params.mean[j], self.params.std[j] + EPSILON);
            col.mapv_inplace(|v| (f64::from(v) * s + m) as f32);
        }
        Ok(out)
    }

    /// Transform `(N, L, F)` windows
    pub fn transform(&self, x: &Array3<f32>) -> Result<Array3<f32>> {
        self.check_width(x.dim().2)?;
        let mut out = x.clone();
        for (j, mut lane) in out.axis_iter_mut(Axis(2)).enumerate() {
            let (m, s) = (self.params.mean[j], self.params.std[j] + EPSILON);
            lane.mapv_inplace(|v| ((f64::from(v) - m) / s) as f32);
        }
        Ok(out)
    }

    pub fn inverse_transform(&self, x: &Array3<f32>) -> Result<Array3<f32>> {
        self.check_width(x.dim().2)?;
        let mut out = x.clone();
        for (j, mut lane) in out.axis_iter_mut(Axis(2)).enumerate() {
            let (m, s) = (self.params.mean[j], self.params.std[j] + EPSILON);
            lane.mapv_inplace(|v| (f64::from(v) * s + m) as f32);
        }
        Ok(out)
    }
}

/// Fitted 1-D scaler for the target column
#[derive(Debug, Clone, PartialEq)]
pub struct TargetScaler {
    params: ScalerParams,
}

impl TargetScaler {
    pub fn fit(train_targets: &Array1<f32>) -> Result<Self> {
        if train_targets.is_empty() {
            return Err(Error::insufficient(1, 0, "target scaler fit"));
        }
        let column = train_targets.view().insert_axis(Axis(1));
        let (mean, std) = column_stats(column);
        Ok(Self {
            params: ScalerParams { mean, std },
        })
    }

    pub fn from_params(params: ScalerParams) -> Result<Self> {
        params.validate()?;
        if params.mean.len() != 1 {
            return Err(Error::Configuration(format!(
                "target scaler must be 1-D, got {} columns",
                params.mean.len()
            )));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &ScalerParams {
        &self.params
    }

    fn mean_std(&self) -> (f64, f64) {
        (self.params.mean[0], self.params.std[0] + EPSILON)
    }

    pub fn transform(&self, y: &Array1<f32>) -> Array1<f32> {
        let (m, s) = self.mean_std();
        y.mapv(|v| ((f64::from(v) - m) / s) as f32)
    }

    pub fn inverse_transform(&self, y: &Array1<f32>) -> Array1<f32> {
        let (m, s) = self.mean_std();
        y.mapv(|v| (f64::from(v) * s + m) as f32)
    }

    /// Standardized model output back to physical units
    pub fn inverse_value(&self, y: f32) -> f64 {
        let (m, s) = self.mean_std();
        f64::from(y) * s + m
    }
}
