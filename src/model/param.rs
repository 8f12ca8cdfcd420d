//! Trainable parameter with its accumulated gradient

use ndarray::Array2;
use rand::Rng;

/// Named weight matrix plus gradient buffer of the same shape
///
/// Biases are stored as `(1, out)` rows so every parameter shares one type.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: Array2<f32>,
    pub grad: Array2<f32>,
}

impl Param {
    pub fn new(name: impl Into<String>, value: Array2<f32>) -> Self {
        let grad = Array2::zeros(value.raw_dim());
        Self {
            name: name.into(),
            value,
            grad,
        }
    }

    pub fn zeros(name: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self::new(name, Array2::zeros((rows, cols)))
    }

    /// Xavier-uniform initialization: U(-a, a), a = sqrt(6 / (fan_in + fan_out))
    pub fn xavier<R: Rng>(name: impl Into<String>, fan_in: usize, fan_out: usize, rng: &mut R) -> Self {
        let a = (6.0 / (fan_in + fan_out) as f32).sqrt();
        let value = Array2::from_shape_simple_fn((fan_in, fan_out), || rng.random_range(-a..a));
        Self::new(name, value)
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn shape(&self) -> [usize; 2] {
        let (r, c) = self.value.dim();
        [r, c]
    }

    /// Squared L2 norm of the gradient
    pub fn grad_norm_sq(&self) -> f32 {
        self.grad.iter().map(|g| g * g).sum()
    }
}
