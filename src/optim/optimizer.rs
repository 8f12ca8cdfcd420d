//! Optimizer trait

use crate::model::Param;

/// Trait for optimization algorithms
pub trait Optimizer {
    /// Perform a single optimization step using the accumulated gradients
    ///
    /// Parameters must be passed in the same order on every call.
    fn step(&mut self, params: &mut [&mut Param]);

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [&mut Param]) {
        for param in params.iter_mut() {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Plain gradient descent for exercising the default methods
    struct TestOptimizer {
        learning_rate: f32,
    }

    impl Optimizer for TestOptimizer {
        fn step(&mut self, params: &mut [&mut Param]) {
            for param in params.iter_mut() {
                let update = &param.grad * self.learning_rate;
                param.value -= &update;
            }
        }

        fn lr(&self) -> f32 {
            self.learning_rate
        }

        fn set_lr(&mut self, lr: f32) {
            self.learning_rate = lr;
        }
    }

    #[test]
    fn test_step_and_zero_grad() {
        let mut opt = TestOptimizer { learning_rate: 0.1 };
        let mut p = Param::new("w", array![[1.0f32, 2.0]]);
        p.grad = array![[0.5, 1.0]];
        opt.step(&mut [&mut p]);
        assert!((p.value[[0, 0]] - 0.95).abs() < 1e-6);
        assert!((p.value[[0, 1]] - 1.9).abs() < 1e-6);
        opt.zero_grad(&mut [&mut p]);
        assert_eq!(p.grad_norm_sq(), 0.0);
    }

    #[test]
    fn test_set_lr() {
        let mut opt = TestOptimizer { learning_rate: 0.1 };
        opt.set_lr(0.01);
        assert_eq!(opt.lr(), 0.01);
    }
}
