use core::fmt;
use std::{error::Error, io, path::PathBuf};

/// Errors raised by the network for invalid architectures, inputs and call orders.
#[derive(Debug)]
pub enum NetworkError {
    /// Fewer than two layer sizes, or a layer with zero units.
    InvalidArchitecture { reason: String },

    /// A matrix dimension does not match what the network was built for.
    ShapeMismatch {
        /// Which dimension was checked (e.g. "input rows", "target columns").
        what: &'static str,
        got: usize,
        expected: usize,
    },

    /// `update_parameters` was called before any backward pass.
    NoGradientsAvailable,

    /// A batch with zero sample columns.
    EmptyBatch,

    /// A training hyperparameter outside its valid range.
    InvalidHyperparameter { name: &'static str, value: f64 },

    Persistence(PersistenceError),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::InvalidArchitecture { reason } => write!(f, "invalid architecture: {reason}"),
            NetworkError::ShapeMismatch { what, got, expected } => {
                write!(f, "shape mismatch for {what}: got {got}, expected {expected}")
            }
            NetworkError::NoGradientsAvailable => {
                write!(f, "no gradients available, run a backward pass before updating parameters")
            }
            NetworkError::EmptyBatch => write!(f, "batch contains no samples"),
            NetworkError::InvalidHyperparameter { name, value } => write!(f, "invalid value {value} for {name}"),
            NetworkError::Persistence(err) => write!(f, "persistence error: {err}"),
        }
    }
}

impl Error for NetworkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NetworkError::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PersistenceError> for NetworkError {
    fn from(value: PersistenceError) -> Self {
        NetworkError::Persistence(value)
    }
}

/// Errors reading or writing a parameter archive.
///
/// A load that fails with any of these leaves the network unchanged.
#[derive(Debug)]
pub enum PersistenceError {
    Io { path: PathBuf, source: io::Error },
    Encoding(serde_pickle::Error),
    MissingEntry(String),
    UnexpectedEntry(String),
    EntryShape {
        name: String,
        got: (usize, usize),
        expected: (usize, usize),
    },
    InvalidLayerSizes(Vec<usize>),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io { path, source } => write!(f, "couldn't access {}: {source}", path.display()),
            PersistenceError::Encoding(err) => write!(f, "malformed archive: {err}"),
            PersistenceError::MissingEntry(name) => write!(f, "archive has no entry {name}"),
            PersistenceError::UnexpectedEntry(name) => write!(f, "archive has unexpected entry {name}"),
            PersistenceError::EntryShape { name, got, expected } => write!(
                f,
                "entry {name} has shape {}x{}, layer sizes require {}x{}",
                got.0, got.1, expected.0, expected.1
            ),
            PersistenceError::InvalidLayerSizes(sizes) => write!(f, "archive declares invalid layer sizes {sizes:?}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PersistenceError::Io { source, .. } => Some(source),
            PersistenceError::Encoding(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_pickle::Error> for PersistenceError {
    fn from(value: serde_pickle::Error) -> Self {
        PersistenceError::Encoding(value)
    }
}

/// Errors loading a training configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse(ron::error::SpannedError),
    Invalid(NetworkError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "couldn't read config {}: {source}", path.display()),
            ConfigError::Parse(err) => write!(f, "couldn't parse config: {err}"),
            ConfigError::Invalid(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid(err) => Some(err),
        }
    }
}

impl From<ron::error::SpannedError> for ConfigError {
    fn from(value: ron::error::SpannedError) -> Self {
        ConfigError::Parse(value)
    }
}
