use log::debug;
use nalgebra::{DMatrix, DVector};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::{canvas::Prediction, error::NetworkError, util};

mod backprop;
mod training;

pub use backprop::LayerGradient;
pub use training::{EpochReport, StepDecay, TrainingHistory, DECAY_INTERVAL, LOG_INTERVAL};

/// One fully-connected layer: `weights` is (units x inputs), `bias` has one entry per unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub weights: DMatrix<f64>,
    pub bias: DVector<f64>,
}

impl Layer {
    pub fn new(weights: DMatrix<f64>, bias: DVector<f64>) -> Result<Self, NetworkError> {
        if weights.nrows() != bias.nrows() {
            Err(NetworkError::ShapeMismatch {
                what: "bias rows",
                got: bias.nrows(),
                expected: weights.nrows(),
            })?;
        }

        Ok(Self { weights, bias })
    }

    // He initialization: standard normal scaled by sqrt(2 / fan_in), zero biases
    fn he_initialized(fan_in: usize, units: usize, rng: &mut StdRng) -> Self {
        let scale = (2.0 / fan_in as f64).sqrt();
        let weights = DMatrix::from_fn(units, fan_in, |_, _| rng.sample::<f64, _>(StandardNormal) * scale);
        Self {
            weights,
            bias: DVector::zeros(units),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.weights.nrows()
    }

    /// Z = W * A + b, with the bias added to every sample column
    fn pre_activation(&self, input: &DMatrix<f64>) -> DMatrix<f64> {
        let mut z = &self.weights * input;
        for mut column in z.column_iter_mut() {
            column += &self.bias;
        }
        z
    }
}

/// Fully-connected multilayer perceptron with ReLU hidden layers and a softmax output layer.
///
/// Samples are columns: a batch of N inputs is a (input_size x N) matrix and produces an
/// (output_size x N) matrix of class probabilities.
#[derive(Debug)]
pub struct FeedForwardNetwork {
    layer_sizes: Vec<usize>,
    layers: Vec<Layer>,
    gradients: Option<Vec<LayerGradient>>,
    weights_counter: usize,
    bias_counter: usize,
    rng: StdRng,
}

pub(crate) fn validate_layer_sizes(layer_sizes: &[usize]) -> Result<(), NetworkError> {
    if layer_sizes.len() < 2 {
        Err(NetworkError::InvalidArchitecture {
            reason: format!("need at least 2 layer sizes, got {}", layer_sizes.len()),
        })?;
    }
    if let Some(i) = layer_sizes.iter().position(|&size| size == 0) {
        Err(NetworkError::InvalidArchitecture {
            reason: format!("layer {i} has no units"),
        })?;
    }
    Ok(())
}

impl FeedForwardNetwork {
    /// Builds a randomly initialized network, seeded from the OS.
    pub fn new(layer_sizes: Vec<usize>) -> Result<Self, NetworkError> {
        Self::with_rng(layer_sizes, StdRng::from_entropy())
    }

    /// Builds a randomly initialized network with a reproducible random source.
    pub fn with_seed(layer_sizes: Vec<usize>, seed: u64) -> Result<Self, NetworkError> {
        Self::with_rng(layer_sizes, StdRng::seed_from_u64(seed))
    }

    /// Builds a network whose initialization and shuffling draw from `rng`.
    pub fn with_rng(layer_sizes: Vec<usize>, mut rng: StdRng) -> Result<Self, NetworkError> {
        validate_layer_sizes(&layer_sizes)?;

        let layers = layer_sizes
            .windows(2)
            .map(|pair| Layer::he_initialized(pair[0], pair[1], &mut rng))
            .collect();

        let network = Self::assemble(layer_sizes, layers, rng);
        debug!(
            "created network {:?} with {} weights and {} biases",
            network.layer_sizes, network.weights_counter, network.bias_counter
        );
        Ok(network)
    }

    /// Builds a network from explicit layers. Consecutive layers must chain, i.e. every
    /// layer's input size equals the previous layer's output size.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self, NetworkError> {
        let layer_sizes = layer_sizes_of(&layers)?;
        Ok(Self::assemble(layer_sizes, layers, StdRng::from_entropy()))
    }

    fn assemble(layer_sizes: Vec<usize>, layers: Vec<Layer>, rng: StdRng) -> Self {
        let mut network = Self {
            layer_sizes,
            layers,
            gradients: None,
            weights_counter: 0,
            bias_counter: 0,
            rng,
        };
        network.count_parameters();
        network
    }

    fn count_parameters(&mut self) {
        self.weights_counter = self.layers.iter().map(|l| l.weights.len()).sum();
        self.bias_counter = self.layers.iter().map(|l| l.bias.len()).sum();
    }

    /// Swaps in a complete new parameter set. Gradients of the old parameters are dropped.
    pub(crate) fn replace_parameters(&mut self, layer_sizes: Vec<usize>, layers: Vec<Layer>) {
        self.layer_sizes = layer_sizes;
        self.layers = layers;
        self.gradients = None;
        self.count_parameters();
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn input_size(&self) -> usize {
        self.layer_sizes[0]
    }

    pub fn output_size(&self) -> usize {
        self.layer_sizes[self.layer_sizes.len() - 1]
    }

    pub fn weights_count(&self) -> usize {
        self.weights_counter
    }

    pub fn bias_count(&self) -> usize {
        self.bias_counter
    }

    pub fn parameter_count(&self) -> usize {
        self.weights_counter + self.bias_counter
    }

    /// Accuracy per trainable parameter, used to compare architectures.
    pub fn parameter_efficiency(&self, accuracy: f64) -> f64 {
        accuracy / self.parameter_count() as f64
    }

    /// Gradients of the most recent backward pass, one entry per layer
    pub fn gradients(&self) -> Option<&[LayerGradient]> {
        self.gradients.as_deref()
    }

    pub(crate) fn check_input(&self, x: &DMatrix<f64>) -> Result<(), NetworkError> {
        if x.nrows() != self.input_size() {
            Err(NetworkError::ShapeMismatch {
                what: "input rows",
                got: x.nrows(),
                expected: self.input_size(),
            })?;
        }
        Ok(())
    }

    pub(crate) fn check_targets(&self, x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<(), NetworkError> {
        if y.nrows() != self.output_size() {
            Err(NetworkError::ShapeMismatch {
                what: "target rows",
                got: y.nrows(),
                expected: self.output_size(),
            })?;
        }
        if y.ncols() != x.ncols() {
            Err(NetworkError::ShapeMismatch {
                what: "target columns",
                got: y.ncols(),
                expected: x.ncols(),
            })?;
        }
        if x.ncols() == 0 {
            Err(NetworkError::EmptyBatch)?;
        }
        Ok(())
    }

    /// Class probabilities for every sample column of `x`.
    pub fn forward(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, NetworkError> {
        self.check_input(x)?;

        let (output_layer, hidden_layers) = self.layers.split_last().ok_or_else(|| NetworkError::InvalidArchitecture {
            reason: "network has no layers".to_owned(),
        })?;

        let mut a = x.clone();
        for layer in hidden_layers {
            a = util::relu(&layer.pre_activation(&a));
        }
        Ok(util::softmax(&output_layer.pre_activation(&a)))
    }

    /// Forward pass for a single sample given as a flat vector.
    pub fn forward_sample(&self, input: &[f64]) -> Result<DVector<f64>, NetworkError> {
        let x = DMatrix::from_column_slice(input.len(), 1, input);
        let a = self.forward(&x)?;
        Ok(a.column(0).into_owned())
    }

    /// Mean cross-entropy of `predictions` against one-hot `targets`.
    pub fn compute_loss(predictions: &DMatrix<f64>, targets: &DMatrix<f64>) -> Result<f64, NetworkError> {
        if predictions.nrows() != targets.nrows() {
            Err(NetworkError::ShapeMismatch {
                what: "prediction rows",
                got: predictions.nrows(),
                expected: targets.nrows(),
            })?;
        }
        if predictions.ncols() != targets.ncols() {
            Err(NetworkError::ShapeMismatch {
                what: "prediction columns",
                got: predictions.ncols(),
                expected: targets.ncols(),
            })?;
        }
        if targets.ncols() == 0 {
            Err(NetworkError::EmptyBatch)?;
        }
        Ok(util::cross_entropy(predictions, targets))
    }

    /// Classifies one sample, e.g. the pixel vector of a drawing.
    pub fn predict(&self, input: &[f64]) -> Result<Prediction, NetworkError> {
        let probabilities = self.forward_sample(input)?;
        Ok(Prediction::new(probabilities))
    }

    /// Fraction of sample columns whose most likely class equals the label.
    pub fn evaluate(&self, x: &DMatrix<f64>, labels: &[usize]) -> Result<f64, NetworkError> {
        if labels.len() != x.ncols() {
            Err(NetworkError::ShapeMismatch {
                what: "label count",
                got: labels.len(),
                expected: x.ncols(),
            })?;
        }
        if labels.is_empty() {
            Err(NetworkError::EmptyBatch)?;
        }

        let predictions = self.forward(x)?;
        Ok(accuracy(&predictions, labels))
    }
}

pub(crate) fn accuracy(predictions: &DMatrix<f64>, labels: &[usize]) -> f64 {
    let hits = util::argmax_columns(predictions)
        .iter()
        .zip(labels)
        .filter(|(predicted, actual)| predicted == actual)
        .count();
    hits as f64 / labels.len() as f64
}

fn layer_sizes_of(layers: &[Layer]) -> Result<Vec<usize>, NetworkError> {
    let first = layers.first().ok_or_else(|| NetworkError::InvalidArchitecture {
        reason: "need at least one layer".to_owned(),
    })?;

    let mut layer_sizes = vec![first.input_size()];
    for layer in layers {
        let previous = layer_sizes[layer_sizes.len() - 1];
        if layer.input_size() != previous {
            Err(NetworkError::ShapeMismatch {
                what: "weight columns",
                got: layer.input_size(),
                expected: previous,
            })?;
        }
        if layer.bias.nrows() != layer.output_size() {
            Err(NetworkError::ShapeMismatch {
                what: "bias rows",
                got: layer.bias.nrows(),
                expected: layer.output_size(),
            })?;
        }
        layer_sizes.push(layer.output_size());
    }

    validate_layer_sizes(&layer_sizes)?;
    Ok(layer_sizes)
}
