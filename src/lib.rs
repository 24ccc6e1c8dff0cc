//! Feed-forward neural network engine for recognizing handwritten digits.
//!
//! A [`FeedForwardNetwork`] maps columns of pixel intensities to class probabilities
//! through ReLU hidden layers and a softmax output layer. It is trained with full-batch
//! gradient descent on cross-entropy loss and can be dumped to and restored from a
//! parameter archive.

pub mod canvas;
pub mod config;
pub mod data;
pub mod error;
pub mod neural_net;
pub mod persistence;
pub mod util;

pub use canvas::Prediction;
pub use config::TrainingConfig;
pub use data::{one_hot, Dataset};
pub use error::{ConfigError, NetworkError, PersistenceError};
pub use neural_net::{FeedForwardNetwork, Layer, LayerGradient, StepDecay, TrainingHistory};
