//! Small dense networks with manual backpropagation.
//!
//! The policy and value heads used here are a handful of tanh layers over
//! three-dimensional observations, so the networks are stored as flat
//! `Vec<f32>` buffers and differentiated by hand rather than through an
//! autograd framework.

use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// One dense layer. Weights are stored row-major: `weights[o * in_dim + i]`
/// connects input `i` to output `o`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linear {
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
    pub in_dim: usize,
    pub out_dim: usize,
}

impl Linear {
    /// Xavier-initialized layer.
    pub fn new(in_dim: usize, out_dim: usize, rng: &mut ChaCha8Rng) -> Self {
        let std = (2.0 / (in_dim + out_dim) as f64).sqrt();
        let weights = (0..in_dim * out_dim)
            .map(|_| {
                let z: f64 = StandardNormal.sample(rng);
                (z * std) as f32
            })
            .collect();
        Self {
            weights,
            bias: vec![0.0; out_dim],
            in_dim,
            out_dim,
        }
    }

    pub fn forward(&self, input: &[f32], output: &mut Vec<f32>) {
        debug_assert_eq!(input.len(), self.in_dim);
        output.clear();
        for o in 0..self.out_dim {
            let row = &self.weights[o * self.in_dim..(o + 1) * self.in_dim];
            let mut sum = self.bias[o];
            for (w, x) in row.iter().zip(input) {
                sum += w * x;
            }
            output.push(sum);
        }
    }
}

/// Gradients for one dense layer, same shapes as [`Linear`].
#[derive(Debug, Clone)]
pub struct LinearGrads {
    pub d_weights: Vec<f32>,
    pub d_bias: Vec<f32>,
}

impl LinearGrads {
    fn zeros_like(layer: &Linear) -> Self {
        Self {
            d_weights: vec![0.0; layer.weights.len()],
            d_bias: vec![0.0; layer.bias.len()],
        }
    }
}

/// Multi-layer perceptron: tanh on every hidden layer, linear output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mlp {
    pub layers: Vec<Linear>,
}

/// Per-layer pre-activations and activations from [`Mlp::forward_cached`],
/// consumed by [`Mlp::backward`].
#[derive(Debug, Clone)]
pub struct ForwardCache {
    /// `activations[0]` is the input; `activations[l + 1]` is the output of
    /// layer `l` after its nonlinearity (if any).
    activations: Vec<Vec<f32>>,
}

impl ForwardCache {
    pub fn output(&self) -> &[f32] {
        // activations always holds input + one entry per layer
        self.activations.last().map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Accumulated gradients for a whole [`Mlp`].
#[derive(Debug, Clone)]
pub struct MlpGrads {
    pub layers: Vec<LinearGrads>,
}

impl MlpGrads {
    pub fn zeros_like(net: &Mlp) -> Self {
        Self {
            layers: net.layers.iter().map(LinearGrads::zeros_like).collect(),
        }
    }

    /// Sum of squared gradient entries.
    pub fn squared_norm(&self) -> f32 {
        self.layers
            .iter()
            .map(|l| {
                l.d_weights.iter().map(|g| g * g).sum::<f32>()
                    + l.d_bias.iter().map(|g| g * g).sum::<f32>()
            })
            .sum()
    }

    pub fn scale(&mut self, factor: f32) {
        for layer in &mut self.layers {
            for g in &mut layer.d_weights {
                *g *= factor;
            }
            for g in &mut layer.d_bias {
                *g *= factor;
            }
        }
    }
}

impl Mlp {
    /// Build an MLP from layer sizes, e.g. `[3, 32, 32, 1]`.
    pub fn new(sizes: &[usize], rng: &mut ChaCha8Rng) -> Self {
        assert!(sizes.len() >= 2, "an MLP needs at least input and output sizes");
        let layers = sizes
            .windows(2)
            .map(|w| Linear::new(w[0], w[1], rng))
            .collect();
        Self { layers }
    }

    pub fn in_dim(&self) -> usize {
        self.layers[0].in_dim
    }

    pub fn out_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim
    }

    /// Plain forward pass.
    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut current = input.to_vec();
        let mut next = Vec::new();
        let last = self.layers.len() - 1;
        for (l, layer) in self.layers.iter().enumerate() {
            layer.forward(&current, &mut next);
            if l < last {
                for v in &mut next {
                    *v = v.tanh();
                }
            }
            std::mem::swap(&mut current, &mut next);
        }
        current
    }

    /// Forward pass that records activations for a later backward pass.
    pub fn forward_cached(&self, input: &[f32]) -> ForwardCache {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());
        let last = self.layers.len() - 1;
        for (l, layer) in self.layers.iter().enumerate() {
            let mut out = Vec::new();
            layer.forward(&activations[l], &mut out);
            if l < last {
                for v in &mut out {
                    *v = v.tanh();
                }
            }
            activations.push(out);
        }
        ForwardCache { activations }
    }

    /// Backpropagate `output_grad` (dL/d output) through the cached pass,
    /// accumulating into `grads`.
    pub fn backward(&self, cache: &ForwardCache, output_grad: &[f32], grads: &mut MlpGrads) {
        debug_assert_eq!(output_grad.len(), self.out_dim());
        debug_assert_eq!(grads.layers.len(), self.layers.len());

        let mut delta = output_grad.to_vec();
        for (l, layer) in self.layers.iter().enumerate().rev() {
            let input = &cache.activations[l];
            let layer_grads = &mut grads.layers[l];

            // dL/dW and dL/db for this layer.
            for o in 0..layer.out_dim {
                layer_grads.d_bias[o] += delta[o];
                let row = &mut layer_grads.d_weights[o * layer.in_dim..(o + 1) * layer.in_dim];
                for (g, x) in row.iter_mut().zip(input) {
                    *g += delta[o] * x;
                }
            }

            if l == 0 {
                break;
            }

            // Propagate to the previous layer's activation, then through
            // its tanh: d tanh(z) = 1 - tanh(z)^2, and `input` already
            // holds tanh(z).
            let mut prev_delta = vec![0.0f32; layer.in_dim];
            for o in 0..layer.out_dim {
                let row = &layer.weights[o * layer.in_dim..(o + 1) * layer.in_dim];
                for (pd, w) in prev_delta.iter_mut().zip(row) {
                    *pd += delta[o] * w;
                }
            }
            for (pd, a) in prev_delta.iter_mut().zip(input) {
                *pd *= 1.0 - a * a;
            }
            delta = prev_delta;
        }
    }
}

/// Adam state for one [`Mlp`].
#[derive(Debug, Clone)]
pub struct Adam {
    m: Vec<LinearGrads>,
    v: Vec<LinearGrads>,
    beta1: f32,
    beta2: f32,
    eps: f32,
    t: u64,
}

impl Adam {
    pub fn new(net: &Mlp) -> Self {
        Self {
            m: net.layers.iter().map(LinearGrads::zeros_like).collect(),
            v: net.layers.iter().map(LinearGrads::zeros_like).collect(),
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
        }
    }

    /// Apply one Adam update with the given learning rate.
    pub fn step(&mut self, net: &mut Mlp, grads: &MlpGrads, lr: f32) {
        self.t += 1;
        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);

        for (l, layer) in net.layers.iter_mut().enumerate() {
            let g = &grads.layers[l];
            Self::update_buffer(
                &mut layer.weights,
                &g.d_weights,
                &mut self.m[l].d_weights,
                &mut self.v[l].d_weights,
                self.beta1,
                self.beta2,
                self.eps,
                bias1,
                bias2,
                lr,
            );
            Self::update_buffer(
                &mut layer.bias,
                &g.d_bias,
                &mut self.m[l].d_bias,
                &mut self.v[l].d_bias,
                self.beta1,
                self.beta2,
                self.eps,
                bias1,
                bias2,
                lr,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn update_buffer(
        params: &mut [f32],
        grads: &[f32],
        m: &mut [f32],
        v: &mut [f32],
        beta1: f32,
        beta2: f32,
        eps: f32,
        bias1: f32,
        bias2: f32,
        lr: f32,
    ) {
        for i in 0..params.len() {
            m[i] = beta1 * m[i] + (1.0 - beta1) * grads[i];
            v[i] = beta2 * v[i] + (1.0 - beta2) * grads[i] * grads[i];
            let m_hat = m[i] / bias1;
            let v_hat = v[i] / bias2;
            params[i] -= lr * m_hat / (v_hat.sqrt() + eps);
        }
    }
}
