//! LSTM encoder with a physics-regularized dense head

use super::dense::{relu, relu_derivative, Dense};
use super::lstm::{LstmLayer, StepCache};
use super::param::Param;
use super::weights::ModelWeights;
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Network architecture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f32,
}

impl ModelConfig {
    pub fn new(input_size: usize, hidden_size: usize, num_layers: usize, dropout: f32) -> Self {
        Self {
            input_size,
            hidden_size,
            num_layers,
            dropout,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(Error::Configuration("input_size must be > 0".into()));
        }
        if self.hidden_size < 4 {
            return Err(Error::Configuration(format!(
                "hidden_size must be >= 4, got {}",
                self.hidden_size
            )));
        }
        if self.num_layers == 0 {
            return Err(Error::Configuration("num_layers must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Configuration(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}

/// Activations of one training-mode forward pass
#[derive(Debug, Clone)]
pub struct ForwardCache {
    lstm: Vec<Vec<StepCache>>,
    // masks[k][t] applied to layer k's output at step t before layer k + 1
    between_masks: Vec<Vec<Option<Array2<f32>>>>,
    steps: usize,
    encoded: Array2<f32>,
    z1: Array2<f32>,
    m1: Option<Array2<f32>>,
    d1: Array2<f32>,
    z2: Array2<f32>,
    m2: Option<Array2<f32>>,
    d2: Array2<f32>,
    z3: Array2<f32>,
}

/// Scalar forecaster working in standardized space
///
/// `(B, L, F)` windows are encoded by a stacked LSTM; the top layer's final
/// hidden state passes through `physics_1 → physics_2 → diffusion → output`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastModel {
    config: ModelConfig,
    lstm: Vec<LstmLayer>,
    physics_1: Dense,
    physics_2: Dense,
    diffusion: Dense,
    output: Dense,
}

/// Inverted dropout mask, `None` when dropout is disabled
fn dropout_mask<R: Rng>(rng: Option<&mut R>, p: f32, shape: (usize, usize)) -> Option<Array2<f32>> {
    let rng = rng?;
    if p <= 0.0 {
        return None;
    }
    let scale = 1.0 / (1.0 - p);
    Some(Array2::from_shape_simple_fn(shape, || {
        if rng.random::<f32>() < p {
            0.0
        } else {
            scale
        }
    }))
}

fn apply_mask(x: Array2<f32>, mask: &Option<Array2<f32>>) -> Array2<f32> {
    match mask {
        Some(m) => x * m,
        None => x,
    }
}

impl ForecastModel {
    /// Deterministically initialized model
    pub fn new(config: ModelConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let h = config.hidden_size;
        let lstm = (0..config.num_layers)
            .map(|k| {
                let input = if k == 0 { config.input_size } else { h };
                LstmLayer::new(&format!("lstm.{k}"), input, h, &mut rng)
            })
            .collect();
        Ok(Self {
            config,
            lstm,
            physics_1: Dense::new("physics_1", h, h, &mut rng),
            physics_2: Dense::new("physics_2", h, h / 2, &mut rng),
            diffusion: Dense::new("diffusion", h / 2, h / 4, &mut rng),
            output: Dense::new("output", h / 4, 1, &mut rng),
        })
    }

    /// Rebuild a model from persisted weights
    ///
    /// Every stored parameter must match the architecture by name and shape.
    pub fn from_weights(config: ModelConfig, weights: &ModelWeights) -> Result<Self> {
        let mut model = Self::new(config, 0)?;
        weights.restore_into(model.parameters_mut())?;
        Ok(model)
    }

    pub fn to_weights(&self, run_id: &str) -> ModelWeights {
        ModelWeights::from_params(run_id, self.parameters())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Evaluation-mode forecast for a batch of windows, dropout disabled
    pub fn predict(&self, x: ArrayView3<'_, f32>) -> Array1<f32> {
        self.forward_impl::<StdRng>(x, None).0
    }

    /// Training-mode forward pass with dropout masks drawn from `rng`
    pub fn forward_train<R: Rng>(&self, x: ArrayView3<'_, f32>, rng: &mut R) -> (Array1<f32>, ForwardCache) {
        self.forward_impl(x, Some(rng))
    }

    fn forward_impl<R: Rng>(&self, x: ArrayView3<'_, f32>, mut rng: Option<&mut R>) -> (Array1<f32>, ForwardCache) {
        let (batch, steps_len, _) = x.dim();
        let h = self.config.hidden_size;
        let p = self.config.dropout;

        let mut steps: Vec<Array2<f32>> = x.axis_iter(Axis(1)).map(|s| s.to_owned()).collect();
        let mut lstm_caches = Vec::with_capacity(self.lstm.len());
        let mut between_masks = Vec::with_capacity(self.lstm.len().saturating_sub(1));

        for (k, layer) in self.lstm.iter().enumerate() {
            let (outputs, caches) = layer.forward(&steps);
            lstm_caches.push(caches);
            if k + 1 < self.lstm.len() {
                let masks: Vec<Option<Array2<f32>>> = outputs
                    .iter()
                    .map(|o| dropout_mask(rng.as_deref_mut(), p, o.dim()))
                    .collect();
                steps = outputs
                    .into_iter()
                    .zip(&masks)
                    .map(|(o, m)| apply_mask(o, m))
                    .collect();
                between_masks.push(masks);
            } else {
                steps = outputs;
            }
        }

        let encoded = steps.pop().unwrap_or_else(|| Array2::zeros((batch, h)));
        let z1 = relu(&self.physics_1.forward(&encoded));
        let m1 = dropout_mask(rng.as_deref_mut(), p, z1.dim());
        let d1 = apply_mask(z1.clone(), &m1);
        let z2 = relu(&self.physics_2.forward(&d1));
        let m2 = dropout_mask(rng.as_deref_mut(), p, z2.dim());
        let d2 = apply_mask(z2.clone(), &m2);
        let z3 = self.diffusion.forward(&d2).mapv(f32::tanh);
        let y = self.output.forward(&z3).column(0).to_owned();

        let cache = ForwardCache {
            lstm: lstm_caches,
            between_masks,
            steps: steps_len,
            encoded,
            z1,
            m1,
            d1,
            z2,
            m2,
            d2,
            z3,
        };
        (y, cache)
    }

    /// Accumulate `dL/dθ` for every parameter given `dL/dy`
    pub fn backward(&mut self, cache: &ForwardCache, d_out: ArrayView1<'_, f32>) {
        let dy = d_out.to_owned().insert_axis(Axis(1));
        let dz3 = self.output.backward(&cache.z3, &dy);
        let da3 = dz3 * &cache.z3.mapv(|v| 1.0 - v * v);
        let dd2 = self.diffusion.backward(&cache.d2, &da3);
        let da2 = apply_mask(dd2, &cache.m2) * &relu_derivative(&cache.z2);
        let dd1 = self.physics_2.backward(&cache.d1, &da2);
        let da1 = apply_mask(dd1, &cache.m1) * &relu_derivative(&cache.z1);
        let dh = self.physics_1.backward(&cache.encoded, &da1);

        if cache.steps == 0 {
            return;
        }
        let mut d_outputs: Vec<Array2<f32>> = (0..cache.steps).map(|_| Array2::zeros(dh.raw_dim())).collect();
        d_outputs[cache.steps - 1] = dh;

        for k in (0..self.lstm.len()).rev() {
            let d_inputs = self.lstm[k].backward(&cache.lstm[k], &d_outputs);
            if k == 0 {
                break;
            }
            d_outputs = d_inputs
                .into_iter()
                .zip(&cache.between_masks[k - 1])
                .map(|(d, m)| apply_mask(d, m))
                .collect();
        }
    }

    pub fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.zero_grad();
        }
    }

    /// Parameters in persistence order
    pub fn parameters(&self) -> Vec<&Param> {
        self.lstm
            .iter()
            .flat_map(|l| l.params())
            .chain(self.physics_1.params())
            .chain(self.physics_2.params())
            .chain(self.diffusion.params())
            .chain(self.output.params())
            .collect()
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Param> {
        self.lstm
            .iter_mut()
            .flat_map(|l| l.params_mut())
            .chain(self.physics_1.params_mut())
            .chain(self.physics_2.params_mut())
            .chain(self.diffusion.params_mut())
            .chain(self.output.params_mut())
            .collect()
    }

    pub fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }
}
