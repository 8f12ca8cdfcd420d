//! Fully connected layer and pointwise activations

use super::param::Param;
use ndarray::{Array2, Axis};
use rand::Rng;

/// `y = x · W + b` with `W: (in, out)`
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    pub weight: Param,
    pub bias: Param,
}

impl Dense {
    pub fn new<R: Rng>(name: &str, input: usize, output: usize, rng: &mut R) -> Self {
        Self {
            weight: Param::xavier(format!("{name}.weight"), input, output, rng),
            bias: Param::zeros(format!("{name}.bias"), 1, output),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weight.value.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weight.value.ncols()
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        x.dot(&self.weight.value) + &self.bias.value
    }

    /// Accumulate parameter gradients and return `dL/dx`
    pub fn backward(&mut self, x: &Array2<f32>, dy: &Array2<f32>) -> Array2<f32> {
        self.weight.grad += &x.t().dot(dy);
        self.bias.grad += &dy.sum_axis(Axis(0)).insert_axis(Axis(0));
        dy.dot(&self.weight.value.t())
    }

    pub fn params(&self) -> [&Param; 2] {
        [&self.weight, &self.bias]
    }

    pub fn params_mut(&mut self) -> [&mut Param; 2] {
        [&mut self.weight, &mut self.bias]
    }
}

pub fn relu(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(|v| v.max(0.0))
}

/// Derivative mask of ReLU evaluated at its output
pub fn relu_derivative(y: &Array2<f32>) -> Array2<f32> {
    y.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_forward_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = Dense::new("fc", 3, 2, &mut rng);
        let y = layer.forward(&Array2::ones((5, 3)));
        assert_eq!(y.dim(), (5, 2));
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut layer = Dense::new("fc", 2, 1, &mut rng);
        let x = array![[0.5f32, -1.0], [2.0, 0.25]];
        // L = sum(y)
        let dy = Array2::ones((2, 1));
        layer.backward(&x, &dy);
        let eps = 1e-3;
        let base: f32 = layer.forward(&x).sum();
        let mut bumped = layer.clone();
        bumped.weight.value[[0, 0]] += eps;
        let numeric = (bumped.forward(&x).sum() - base) / eps;
        assert!((numeric - layer.weight.grad[[0, 0]]).abs() < 1e-2);
        assert_eq!(layer.bias.grad[[0, 0]], 2.0);
    }

    #[test]
    fn test_relu_and_derivative() {
        let x = array![[-1.0f32, 0.0, 2.0]];
        let y = relu(&x);
        assert_eq!(y, array![[0.0, 0.0, 2.0]]);
        assert_eq!(relu_derivative(&y), array![[0.0, 0.0, 1.0]]);
    }
}
