//! Adam optimizer with L2 weight decay

use super::Optimizer;
use crate::model::Param;
use ndarray::Array2;

/// Adam optimizer
///
/// Weight decay is classic L2: `λ·θ` is added to the gradient before the
/// moment updates.
///
/// ```text
/// g_t = ∇θ + λ·θ
/// m_t = β1·m_{t-1} + (1 − β1)·g_t
/// v_t = β2·v_{t-1} + (1 − β2)·g_t²
/// θ_t = θ_{t-1} − lr_t · m_t / (√v_t + ε),  lr_t = lr·√(1 − β2^t) / (1 − β1^t)
/// ```
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    t: u64,
    m: Vec<Array2<f32>>,
    v: Vec<Array2<f32>>,
}

impl Adam {
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            weight_decay,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// β1 = 0.9, β2 = 0.999, ε = 1e-8
    pub fn default_params(lr: f32, weight_decay: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8, weight_decay)
    }

    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }

    #[must_use]
    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }

    fn ensure_moments(&mut self, params: &[&mut Param]) {
        if self.m.len() != params.len() {
            self.m = params.iter().map(|p| Array2::zeros(p.value.raw_dim())).collect();
            self.v = params.iter().map(|p| Array2::zeros(p.value.raw_dim())).collect();
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [&mut Param]) {
        self.ensure_moments(params);
        self.t += 1;

        let (beta1, beta2, eps) = (self.beta1, self.beta2, self.epsilon);
        let t = self.t as i32;
        let lr_t = self.lr * ((1.0 - beta2.powi(t)).sqrt() / (1.0 - beta1.powi(t)));

        for (i, param) in params.iter_mut().enumerate() {
            let grad = if self.weight_decay > 0.0 {
                &param.grad + &(&param.value * self.weight_decay)
            } else {
                param.grad.clone()
            };

            let m = &mut self.m[i];
            let v = &mut self.v[i];
            m.zip_mut_with(&grad, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
            v.zip_mut_with(&grad, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

            let update = ndarray::Zip::from(&*m)
                .and(&*v)
                .map_collect(|&m, &v| lr_t * m / (v.sqrt() + eps));
            param.value -= &update;
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_first_step_moves_by_lr() {
        // With bias correction the first update is lr·sign(g)
        let mut opt = Adam::default_params(0.1, 0.0);
        let mut p = Param::new("w", array![[1.0f32, -1.0]]);
        p.grad = array![[2.0, -0.5]];
        opt.step(&mut [&mut p]);
        assert_abs_diff_eq!(p.value[[0, 0]], 0.9, epsilon = 1e-4);
        assert_abs_diff_eq!(p.value[[0, 1]], -0.9, epsilon = 1e-4);
        assert_eq!(opt.step_count(), 1);
    }

    #[test]
    fn test_converges_on_quadratic() {
        // f(x) = (x - 3)^2
        let mut opt = Adam::default_params(0.1, 0.0);
        let mut p = Param::new("x", array![[0.0f32]]);
        for _ in 0..500 {
            p.grad = p.value.mapv(|x| 2.0 * (x - 3.0));
            opt.step(&mut [&mut p]);
        }
        assert_abs_diff_eq!(p.value[[0, 0]], 3.0, epsilon = 1e-2);
    }

    #[test]
    fn test_weight_decay_shrinks_without_gradient() {
        let mut opt = Adam::default_params(0.01, 0.1);
        let mut p = Param::new("w", array![[5.0f32]]);
        for _ in 0..10 {
            opt.step(&mut [&mut p]);
        }
        assert!(p.value[[0, 0]] < 5.0);
    }

    #[test]
    fn test_set_lr() {
        let mut opt = Adam::default_params(0.1, 0.0);
        opt.set_lr(0.05);
        assert_eq!(opt.lr(), 0.05);
    }
}
