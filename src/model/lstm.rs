//! LSTM layer with backpropagation through time
//!
//! Gates are packed in `i, f, g, o` order along the last axis:
//!
//! ```text
//! a_t = x_t · W_ih + h_{t-1} · W_hh + b
//! i_t = σ(a_i)  f_t = σ(a_f)  g_t = tanh(a_g)  o_t = σ(a_o)
//! c_t = f_t ⊙ c_{t-1} + i_t ⊙ g_t
//! h_t = o_t ⊙ tanh(c_t)
//! ```

use super::dense::sigmoid;
use super::param::Param;
use ndarray::{concatenate, s, Array2, Axis};
use rand::Rng;

/// One recurrent layer, batch-first, zero initial state
#[derive(Debug, Clone, PartialEq)]
pub struct LstmLayer {
    pub weight_ih: Param,
    pub weight_hh: Param,
    pub bias: Param,
    hidden_size: usize,
}

/// Activations of one time step kept for the backward pass
#[derive(Debug, Clone)]
pub struct StepCache {
    x: Array2<f32>,
    h_prev: Array2<f32>,
    c_prev: Array2<f32>,
    i: Array2<f32>,
    f: Array2<f32>,
    g: Array2<f32>,
    o: Array2<f32>,
    tanh_c: Array2<f32>,
}

impl LstmLayer {
    pub fn new<R: Rng>(name: &str, input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let mut bias = Param::zeros(format!("{name}.bias"), 1, 4 * hidden_size);
        // Forget gate starts open
        bias.value
            .slice_mut(s![.., hidden_size..2 * hidden_size])
            .fill(1.0);
        Self {
            weight_ih: Param::xavier(format!("{name}.weight_ih"), input_size, 4 * hidden_size, rng),
            weight_hh: Param::xavier(format!("{name}.weight_hh"), hidden_size, 4 * hidden_size, rng),
            bias,
            hidden_size,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weight_ih.value.nrows()
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Run the layer over `steps` (each `(B, in)`), returning every hidden state
    pub fn forward(&self, steps: &[Array2<f32>]) -> (Vec<Array2<f32>>, Vec<StepCache>) {
        let batch = steps.first().map_or(0, |x| x.nrows());
        let hs = self.hidden_size;
        let mut h = Array2::<f32>::zeros((batch, hs));
        let mut c = Array2::<f32>::zeros((batch, hs));
        let mut outputs = Vec::with_capacity(steps.len());
        let mut caches = Vec::with_capacity(steps.len());

        for x in steps {
            let a = x.dot(&self.weight_ih.value) + h.dot(&self.weight_hh.value) + &self.bias.value;
            let i = a.slice(s![.., 0..hs]).mapv(sigmoid);
            let f = a.slice(s![.., hs..2 * hs]).mapv(sigmoid);
            let g = a.slice(s![.., 2 * hs..3 * hs]).mapv(f32::tanh);
            let o = a.slice(s![.., 3 * hs..4 * hs]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f32::tanh);
            let h_next = &o * &tanh_c;

            caches.push(StepCache {
                x: x.clone(),
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                tanh_c,
            });
            outputs.push(h_next.clone());
            h = h_next;
            c = c_next;
        }
        (outputs, caches)
    }

    /// Backpropagate `d_outputs[t] = dL/dh_t` through time
    ///
    /// Accumulates parameter gradients and returns `dL/dx_t` for every step.
    pub fn backward(&mut self, caches: &[StepCache], d_outputs: &[Array2<f32>]) -> Vec<Array2<f32>> {
        let Some(first) = caches.first() else {
            return Vec::new();
        };
        let (batch, hs) = (first.h_prev.nrows(), self.hidden_size);
        let mut dh_next = Array2::<f32>::zeros((batch, hs));
        let mut dc_next = Array2::<f32>::zeros((batch, hs));
        let mut d_inputs = vec![Array2::<f32>::zeros((0, 0)); caches.len()];

        for t in (0..caches.len()).rev() {
            let cache = &caches[t];
            let dh = &d_outputs[t] + &dh_next;

            let d_o = &dh * &cache.tanh_c;
            let dc = &dh * &cache.o * &cache.tanh_c.mapv(|v| 1.0 - v * v) + &dc_next;
            let d_f = &dc * &cache.c_prev;
            let d_i = &dc * &cache.g;
            let d_g = &dc * &cache.i;
            dc_next = &dc * &cache.f;

            let da_i = d_i * &cache.i.mapv(|v| v * (1.0 - v));
            let da_f = d_f * &cache.f.mapv(|v| v * (1.0 - v));
            let da_g = d_g * &cache.g.mapv(|v| 1.0 - v * v);
            let da_o = d_o * &cache.o.mapv(|v| v * (1.0 - v));
            let da = concatenate![Axis(1), da_i, da_f, da_g, da_o];

            self.weight_ih.grad += &cache.x.t().dot(&da);
            self.weight_hh.grad += &cache.h_prev.t().dot(&da);
            self.bias.grad += &da.sum_axis(Axis(0)).insert_axis(Axis(0));

            d_inputs[t] = da.dot(&self.weight_ih.value.t());
            dh_next = da.dot(&self.weight_hh.value.t());
        }
        d_inputs
    }

    pub fn params(&self) -> [&Param; 3] {
        [&self.weight_ih, &self.weight_hh, &self.bias]
    }

    pub fn params_mut(&mut self) -> [&mut Param; 3] {
        [&mut self.weight_ih, &mut self.weight_hh, &mut self.bias]
    }
}
