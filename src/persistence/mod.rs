//! Flat parameter dumps.
//!
//! An archive maps `W{i}` / `b{i}` (1-based layer index) to the parameter matrices and
//! records the layer sizes next to them, pickled with `serde-pickle`. Biases are stored as
//! single-column matrices.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use serde_pickle::{DeOptions, SerOptions};

use crate::{
    error::{NetworkError, PersistenceError},
    neural_net::{validate_layer_sizes, FeedForwardNetwork, Layer},
};

pub const ARCHIVE_EXTENSION: &str = ".pkl";

#[derive(Debug, Serialize, Deserialize)]
struct Archive {
    layer_sizes: Vec<usize>,
    parameters: BTreeMap<String, DMatrix<f64>>,
}

/// Appends the archive extension unless `name` already ends with it.
pub fn archive_path(name: &str) -> PathBuf {
    if name.ends_with(ARCHIVE_EXTENSION) {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{name}{ARCHIVE_EXTENSION}"))
    }
}

fn weight_key(layer: usize) -> String {
    format!("W{layer}")
}

fn bias_key(layer: usize) -> String {
    format!("b{layer}")
}

impl Archive {
    fn of(network: &FeedForwardNetwork) -> Self {
        let mut parameters = BTreeMap::new();
        for (i, layer) in network.layers().iter().enumerate() {
            parameters.insert(weight_key(i + 1), layer.weights.clone());
            parameters.insert(
                bias_key(i + 1),
                DMatrix::from_column_slice(layer.bias.len(), 1, layer.bias.as_slice()),
            );
        }

        Self {
            layer_sizes: network.layer_sizes().to_vec(),
            parameters,
        }
    }

    /// Checks the stored matrices against the stored layer sizes and turns them into layers.
    fn into_layers(mut self) -> Result<(Vec<usize>, Vec<Layer>), PersistenceError> {
        validate_layer_sizes(&self.layer_sizes).map_err(|_| PersistenceError::InvalidLayerSizes(self.layer_sizes.clone()))?;

        let mut layers = Vec::with_capacity(self.layer_sizes.len() - 1);
        for i in 1..self.layer_sizes.len() {
            let (fan_in, units) = (self.layer_sizes[i - 1], self.layer_sizes[i]);
            let weights = take_entry(&mut self.parameters, &weight_key(i), (units, fan_in))?;
            let bias = take_entry(&mut self.parameters, &bias_key(i), (units, 1))?;
            layers.push(Layer {
                weights,
                bias: bias.column(0).into_owned(),
            });
        }

        if let Some(name) = self.parameters.keys().next() {
            Err(PersistenceError::UnexpectedEntry(name.clone()))?;
        }

        Ok((self.layer_sizes, layers))
    }
}

fn take_entry(
    parameters: &mut BTreeMap<String, DMatrix<f64>>,
    name: &str,
    expected: (usize, usize),
) -> Result<DMatrix<f64>, PersistenceError> {
    let matrix = parameters
        .remove(name)
        .ok_or_else(|| PersistenceError::MissingEntry(name.to_owned()))?;
    if matrix.shape() != expected {
        Err(PersistenceError::EntryShape {
            name: name.to_owned(),
            got: matrix.shape(),
            expected,
        })?;
    }
    Ok(matrix)
}

fn read_archive(path: &Path) -> Result<Archive, PersistenceError> {
    let io_error = |source| PersistenceError::Io {
        path: path.to_owned(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    Ok(serde_pickle::from_reader(BufReader::new(file), DeOptions::new())?)
}

impl FeedForwardNetwork {
    /// Writes all parameters and the layer sizes to `name` (extension added if missing).
    /// Returns the path actually written.
    pub fn save(&self, name: &str) -> Result<PathBuf, NetworkError> {
        let path = archive_path(name);
        let io_error = |source| PersistenceError::Io {
            path: path.clone(),
            source,
        };

        let archive = Archive::of(self);
        let mut writer = BufWriter::new(File::create(&path).map_err(io_error)?);
        serde_pickle::to_writer(&mut writer, &archive, SerOptions::new()).map_err(PersistenceError::from)?;
        writer.flush().map_err(io_error)?;

        debug!("saved network {:?} to {}", self.layer_sizes(), path.display());
        Ok(path)
    }

    /// Replaces layer sizes and parameters with the contents of an archive.
    ///
    /// The archive is fully read and checked before anything is replaced, so on error the
    /// network keeps its previous state.
    pub fn load(&mut self, name: &str) -> Result<(), NetworkError> {
        let path = archive_path(name);
        let (layer_sizes, layers) = read_archive(&path)?.into_layers()?;

        if layer_sizes != self.layer_sizes() {
            warn!(
                "loading {} replaces architecture {:?} with {:?}",
                path.display(),
                self.layer_sizes(),
                layer_sizes
            );
        }
        debug!("loaded network {:?} from {}", layer_sizes, path.display());
        self.replace_parameters(layer_sizes, layers);
        Ok(())
    }

    /// Builds a network straight from an archive.
    pub fn from_archive(name: &str) -> Result<Self, NetworkError> {
        let path = archive_path(name);
        let (layer_sizes, layers) = read_archive(&path)?.into_layers()?;
        debug!("loaded network {:?} from {}", layer_sizes, path.display());
        FeedForwardNetwork::from_layers(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_archive(path: &Path, archive: &Archive) {
        let mut file = File::create(path).unwrap();
        serde_pickle::to_writer(&mut file, archive, SerOptions::new()).unwrap();
    }

    #[test]
    fn extension_is_appended_once() {
        assert_eq!(archive_path("model"), PathBuf::from("model.pkl"));
        assert_eq!(archive_path("model.pkl"), PathBuf::from("model.pkl"));
        assert_eq!(archive_path("model.bin"), PathBuf::from("model.bin.pkl"));
    }

    #[test]
    fn archive_uses_canonical_names() {
        let net = FeedForwardNetwork::with_seed(vec![3, 4, 2], 1).unwrap();
        let archive = Archive::of(&net);
        let keys: Vec<_> = archive.parameters.keys().cloned().collect();
        assert_eq!(keys, vec!["W1", "W2", "b1", "b2"]);
        assert_eq!(archive.parameters["b1"].shape(), (4, 1));
        assert_eq!(archive.layer_sizes, vec![3, 4, 2]);
    }

    #[test]
    fn mismatched_entry_shape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pkl");
        let net = FeedForwardNetwork::with_seed(vec![3, 4, 2], 1).unwrap();
        let mut archive = Archive::of(&net);
        archive.parameters.insert("W2".to_owned(), DMatrix::zeros(2, 5));
        write_archive(&path, &archive);

        let mut target = FeedForwardNetwork::with_seed(vec![3, 4, 2], 2).unwrap();
        let before = target.layers().to_vec();
        let err = target.load(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::Persistence(PersistenceError::EntryShape { ref name, got: (2, 5), expected: (2, 4) }) if name == "W2"
        ));
        assert_eq!(target.layers(), &before[..]);
    }

    #[test]
    fn missing_and_extra_entries_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let net = FeedForwardNetwork::with_seed(vec![3, 4, 2], 1).unwrap();

        let mut missing = Archive::of(&net);
        missing.parameters.remove("b2");
        let missing_path = dir.path().join("missing.pkl");
        write_archive(&missing_path, &missing);
        assert!(matches!(
            FeedForwardNetwork::from_archive(missing_path.to_str().unwrap()),
            Err(NetworkError::Persistence(PersistenceError::MissingEntry(ref name))) if name == "b2"
        ));

        let mut extra = Archive::of(&net);
        extra.parameters.insert("W3".to_owned(), DMatrix::zeros(1, 1));
        let extra_path = dir.path().join("extra.pkl");
        write_archive(&extra_path, &extra);
        assert!(matches!(
            FeedForwardNetwork::from_archive(extra_path.to_str().unwrap()),
            Err(NetworkError::Persistence(PersistenceError::UnexpectedEntry(ref name))) if name == "W3"
        ));
    }

    #[test]
    fn invalid_layer_sizes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sizes.pkl");
        write_archive(
            &path,
            &Archive {
                layer_sizes: vec![3],
                parameters: BTreeMap::new(),
            },
        );
        assert!(matches!(
            FeedForwardNetwork::from_archive(path.to_str().unwrap()),
            Err(NetworkError::Persistence(PersistenceError::InvalidLayerSizes(_)))
        ));
    }

    #[test]
    fn missing_file_and_garbage_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent");
        assert!(matches!(
            FeedForwardNetwork::from_archive(absent.to_str().unwrap()),
            Err(NetworkError::Persistence(PersistenceError::Io { .. }))
        ));

        let garbage = dir.path().join("garbage.pkl");
        std::fs::write(&garbage, b"definitely not a pickle").unwrap();
        assert!(matches!(
            FeedForwardNetwork::from_archive(garbage.to_str().unwrap()),
            Err(NetworkError::Persistence(PersistenceError::Encoding(_)))
        ));
    }
}
