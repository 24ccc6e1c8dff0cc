use nalgebra::{DMatrix, DVector};

use super::FeedForwardNetwork;
use crate::{error::NetworkError, util};

/// Every gradient entry is clamped to this range, biases included.
pub const GRADIENT_CLIP: f64 = 1.0;

/// Gradient of the loss with respect to one layer's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGradient {
    pub weights: DMatrix<f64>,
    pub bias: DVector<f64>,
}

/// Pre- and post-activations of one forward pass.
///
/// `activations[0]` is the input, `activations[i]` and `pre_activations[i - 1]` belong to layer i.
pub(super) struct ActivationCache {
    pub pre_activations: Vec<DMatrix<f64>>,
    pub activations: Vec<DMatrix<f64>>,
}

impl ActivationCache {
    pub fn output(&self) -> &DMatrix<f64> {
        &self.activations[self.activations.len() - 1]
    }
}

impl FeedForwardNetwork {
    /// Forward pass that keeps every Z and A for the backward pass.
    pub(super) fn forward_cached(&self, x: &DMatrix<f64>) -> ActivationCache {
        let last = self.layers.len() - 1;
        let mut cache = ActivationCache {
            pre_activations: Vec::with_capacity(self.layers.len()),
            activations: Vec::with_capacity(self.layers.len() + 1),
        };
        cache.activations.push(x.clone());

        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.pre_activation(cache.output());
            let a = if i == last { util::softmax(&z) } else { util::relu(&z) };
            cache.pre_activations.push(z);
            cache.activations.push(a);
        }

        cache
    }

    /// Computes the gradients for the batch `x` with one-hot targets `y` and stores them
    /// for the next `update_parameters` call.
    pub fn backward(&mut self, x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<(), NetworkError> {
        self.check_input(x)?;
        self.check_targets(x, y)?;

        let cache = self.forward_cached(x);
        self.backward_from_cache(&cache, y);
        Ok(())
    }

    pub(super) fn backward_from_cache(&mut self, cache: &ActivationCache, y: &DMatrix<f64>) {
        let mut gradients = Vec::with_capacity(self.layers.len());

        // softmax and cross-entropy together differentiate to A - Y
        let mut dz = cache.output() - y;

        for i in (0..self.layers.len()).rev() {
            let a_prev = &cache.activations[i];

            let weights = &dz * a_prev.transpose();
            let bias = dz.column_sum();
            gradients.push(LayerGradient {
                weights: util::clip(weights, -GRADIENT_CLIP, GRADIENT_CLIP),
                bias: bias.map(|v| v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)),
            });

            if i > 0 {
                let da_prev = self.layers[i].weights.tr_mul(&dz);
                dz = da_prev.component_mul(&util::relu_derivative(&cache.pre_activations[i - 1]));
            }
        }

        gradients.reverse();
        self.gradients = Some(gradients);
    }

    /// Gradient descent step with the gradients of the last backward pass.
    pub fn update_parameters(&mut self, learning_rate: f64) -> Result<(), NetworkError> {
        if !(learning_rate > 0.0 && learning_rate.is_finite()) {
            Err(NetworkError::InvalidHyperparameter {
                name: "learning_rate",
                value: learning_rate,
            })?;
        }
        let gradients = self.gradients.as_ref().ok_or(NetworkError::NoGradientsAvailable)?;

        for (layer, gradient) in self.layers.iter_mut().zip(gradients) {
            layer.weights -= &gradient.weights * learning_rate;
            layer.bias -= &gradient.bias * learning_rate;
        }
        Ok(())
    }
}
