//! Gradient clipping utilities

use crate::model::Param;

/// Global L2 norm over every parameter gradient
pub fn global_grad_norm(params: &[&mut Param]) -> f32 {
    params.iter().map(|p| p.grad_norm_sq()).sum::<f32>().sqrt()
}

/// Clip gradients by global norm
///
/// Algorithm:
/// 1. global_norm = sqrt(sum of all gradient squared norms)
/// 2. If global_norm > max_norm, every gradient is scaled by max_norm / global_norm
///
/// Returns the global norm before clipping. A non-finite norm is returned
/// unchanged and leaves the gradients untouched.
pub fn clip_grad_norm(params: &mut [&mut Param], max_norm: f32) -> f32 {
    let global_norm = global_grad_norm(params);

    if global_norm.is_finite() && global_norm > max_norm {
        let clip_coef = max_norm / global_norm;
        for param in params.iter_mut() {
            param.grad.mapv_inplace(|g| g * clip_coef);
        }
    }

    global_norm
}
