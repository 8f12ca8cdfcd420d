//! Advection-diffusion consistency penalty between consecutive forecasts
//!
//! For a concentration `C` the 1-D advection-diffusion equation reads
//! `∂C/∂t + u·∂C/∂x = D·∂²C/∂x² + S`. Only one sensor location exists, so the
//! spatial curvature is taken as zero and the advective term is approximated
//! with the temporal gradient. The residual over a forecast horizon is
//!
//! ```text
//! r_t = ΔC_t/dt − D·0 + u·ΔC_t/dt − S_t,   S_t = 0.01 · mean(inputs_t)
//! ```
//!
//! and the penalty is `mean(r²)`. This is a soft regularizer: keep its loss
//! weight small (0.01–0.1 of the primary loss).

use ndarray::{Array1, ArrayView1, ArrayView2};

/// Diffusion coefficient `D`
pub const DIFFUSION_COEFF: f32 = 0.1;
/// Advection velocity `u`
pub const ADVECTION_VELOCITY: f32 = 0.05;
/// Source term scale applied to the mean of the input features
pub const SOURCE_SCALE: f32 = 0.01;
/// Normalized time step
pub const DT: f32 = 1.0;

fn source_term(inputs: ArrayView2<'_, f32>, t: usize) -> f32 {
    if t >= inputs.nrows() || inputs.ncols() == 0 {
        return 0.0;
    }
    SOURCE_SCALE * inputs.row(t).mean().unwrap_or(0.0)
}

fn residuals(predictions: ArrayView1<'_, f32>, inputs: ArrayView2<'_, f32>) -> Array1<f32> {
    let steps = predictions.len().saturating_sub(1);
    // Curvature term is zero with a single spatial point
    let d2c_dx2 = 0.0;
    Array1::from_shape_fn(steps, |t| {
        let dc_dt = (predictions[t + 1] - predictions[t]) / DT;
        dc_dt - DIFFUSION_COEFF * d2c_dx2 + ADVECTION_VELOCITY * dc_dt - source_term(inputs, t)
    })
}

/// Mean squared physics residual over a horizon of consecutive predictions
///
/// `inputs` holds one feature row per predicted step (row `t` drives the
/// source term between steps `t` and `t + 1`). Returns exactly `0.0` when the
/// horizon has fewer than two steps.
pub fn physics_residual(predictions: ArrayView1<'_, f32>, inputs: ArrayView2<'_, f32>) -> f32 {
    if predictions.len() < 2 {
        return 0.0;
    }
    let r = residuals(predictions, inputs);
    r.mapv(|v| v * v).mean().unwrap_or(0.0)
}

/// Penalty and its gradient with respect to every prediction
pub fn physics_residual_grad(
    predictions: ArrayView1<'_, f32>,
    inputs: ArrayView2<'_, f32>,
) -> (f32, Array1<f32>) {
    let mut grad = Array1::<f32>::zeros(predictions.len());
    if predictions.len() < 2 {
        return (0.0, grad);
    }
    let r = residuals(predictions, inputs);
    let n = r.len() as f32;
    let k = (1.0 + ADVECTION_VELOCITY) / DT;
    for (t, &rt) in r.iter().enumerate() {
        let g = 2.0 * rt / n * k;
        grad[t + 1] += g;
        grad[t] -= g;
    }
    let loss = r.mapv(|v| v * v).sum() / n;
    (loss, grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_degenerate_horizon_is_zero() {
        let inputs = Array2::<f32>::ones((1, 3));
        assert_eq!(physics_residual(array![5.0f32].view(), inputs.view()), 0.0);
        assert_eq!(physics_residual(Array1::<f32>::zeros(0).view(), inputs.view()), 0.0);
        let (loss, grad) = physics_residual_grad(array![5.0f32].view(), inputs.view());
        assert_eq!(loss, 0.0);
        assert_eq!(grad, array![0.0]);
    }

    #[test]
    fn test_constant_forecast_without_source_is_zero() {
        let inputs = Array2::<f32>::zeros((4, 2));
        let p = array![1.0f32, 1.0, 1.0, 1.0];
        assert_eq!(physics_residual(p.view(), inputs.view()), 0.0);
    }

    #[test]
    fn test_known_value() {
        let inputs = Array2::<f32>::zeros((2, 1));
        // dC/dt = 2, residual = 2 * 1.05 = 2.1
        let p = array![0.0f32, 2.0];
        let loss = physics_residual(p.view(), inputs.view());
        assert!((loss - 4.41).abs() < 1e-5);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let inputs = array![[0.5f32, 1.0], [-0.2, 0.3], [1.5, -0.5], [0.0, 0.0]];
        let p = array![0.3f32, -0.1, 0.8, 0.2];
        let (loss, grad) = physics_residual_grad(p.view(), inputs.view());
        assert!((loss - physics_residual(p.view(), inputs.view())).abs() < 1e-6);
        let eps = 1e-3;
        for i in 0..p.len() {
            let mut plus = p.clone();
            plus[i] += eps;
            let mut minus = p.clone();
            minus[i] -= eps;
            let numeric = (physics_residual(plus.view(), inputs.view())
                - physics_residual(minus.view(), inputs.view()))
                / (2.0 * eps);
            assert!((numeric - grad[i]).abs() < 1e-2, "step {i}: {numeric} vs {}", grad[i]);
        }
    }
}
