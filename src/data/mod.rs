use nalgebra::{DMatrix, DVector};
use rand::{seq::SliceRandom, Rng};
use rand_distr::Normal;

use crate::error::NetworkError;

/// Labelled samples, one sample per feature column.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub features: DMatrix<f64>,
    pub labels: Vec<usize>,
}

/// One-hot targets, shaped (classes x labels.len()).
pub fn one_hot(labels: &[usize], classes: usize) -> Result<DMatrix<f64>, NetworkError> {
    let mut targets = DMatrix::zeros(classes, labels.len());
    for (column, &label) in labels.iter().enumerate() {
        if label >= classes {
            Err(NetworkError::ShapeMismatch {
                what: "label value",
                got: label,
                expected: classes,
            })?;
        }
        targets[(label, column)] = 1.0;
    }
    Ok(targets)
}

/// Gaussian blobs around one corner of the unit cube per class: the centre of class `c` has
/// feature `j` set to 1 when `j % classes == c`. Separable as long as `features >= classes`
/// and `spread` stays well below 0.5.
pub fn clusters<R: Rng + ?Sized>(
    classes: usize,
    features: usize,
    per_class: usize,
    spread: f64,
    rng: &mut R,
) -> Result<Dataset, NetworkError> {
    let noise = Normal::new(0.0, spread).map_err(|_| NetworkError::InvalidHyperparameter {
        name: "spread",
        value: spread,
    })?;

    let labels: Vec<usize> = (0..classes).flat_map(|c| std::iter::repeat(c).take(per_class)).collect();
    let features = DMatrix::from_fn(features, labels.len(), |j, i| {
        let centre = if j % classes == labels[i] { 1.0 } else { 0.0 };
        centre + rng.sample(noise)
    });
    Dataset::new(features, labels)
}

impl Dataset {
    pub fn new(features: DMatrix<f64>, labels: Vec<usize>) -> Result<Self, NetworkError> {
        if features.ncols() != labels.len() {
            Err(NetworkError::ShapeMismatch {
                what: "label count",
                got: labels.len(),
                expected: features.ncols(),
            })?;
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.features.nrows()
    }

    pub fn targets(&self, classes: usize) -> Result<DMatrix<f64>, NetworkError> {
        one_hot(&self.labels, classes)
    }

    /// Applies one random permutation to samples and labels alike.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut permutation: Vec<usize> = (0..self.len()).collect();
        permutation.shuffle(rng);
        self.features = self.features.select_columns(permutation.iter());
        self.labels = permutation.iter().map(|&i| self.labels[i]).collect();
    }

    /// Splits off the first `n` samples, e.g. for a train/test split.
    pub fn split_at(&self, n: usize) -> (Dataset, Dataset) {
        let n = n.min(self.len());
        let head = Dataset {
            features: self.features.columns(0, n).into_owned(),
            labels: self.labels[..n].to_vec(),
        };
        let tail = Dataset {
            features: self.features.columns(n, self.len() - n).into_owned(),
            labels: self.labels[n..].to_vec(),
        };
        (head, tail)
    }

    // scale every feature row to [a, b]
    pub fn normalize(&mut self, a: f64, b: f64) {
        for ri in 0..self.features.nrows() {
            let mut row = self.features.row(ri).clone_owned();
            let min = row.min();
            let max = row.max();
            row.add_scalar_mut(-min);
            if max != min {
                row *= (b - a) / (max - min);
            }
            row.add_scalar_mut(a);
            self.features.set_row(ri, &row);
        }
    }

    /// Features of one sample as a vector
    pub fn sample(&self, index: usize) -> DVector<f64> {
        self.features.column(index).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn dataset() -> Dataset {
        // feature 0 equals the label, feature 1 is ten times it
        let features = DMatrix::from_fn(2, 6, |r, c| if r == 0 { c as f64 } else { 10.0 * c as f64 });
        Dataset::new(features, (0..6).collect()).unwrap()
    }

    #[test]
    fn one_hot_marks_label_rows() {
        let targets = one_hot(&[2, 0, 1], 3).unwrap();
        assert_eq!(
            targets,
            DMatrix::from_row_slice(3, 3, &[0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0])
        );
        for column in targets.column_iter() {
            assert_eq!(column.sum(), 1.0);
        }
    }

    #[test]
    fn one_hot_rejects_out_of_range_label() {
        assert!(matches!(
            one_hot(&[0, 10], 10),
            Err(NetworkError::ShapeMismatch { what: "label value", got: 10, expected: 10 })
        ));
    }

    #[test]
    fn shuffle_keeps_pairs_together() {
        let mut ds = dataset();
        ds.shuffle(&mut StdRng::seed_from_u64(3));
        let mut seen = ds.labels.clone();
        seen.sort();
        assert_eq!(seen, (0..6).collect::<Vec<_>>());
        for (i, &label) in ds.labels.iter().enumerate() {
            assert_eq!(ds.features[(0, i)], label as f64);
            assert_eq!(ds.features[(1, i)], 10.0 * label as f64);
        }
    }

    #[test]
    fn split_partitions_samples() {
        let (train, test) = dataset().split_at(4);
        assert_eq!(train.len(), 4);
        assert_eq!(test.labels, vec![4, 5]);
        assert_eq!(test.sample(0), DVector::from_vec(vec![4.0, 40.0]));
    }

    #[test]
    fn normalize_scales_rows_into_range() {
        let mut ds = dataset();
        ds.normalize(0.0, 1.0);
        assert_eq!(ds.features.row(0).min(), 0.0);
        assert!((ds.features.row(1).max() - 1.0).abs() < 1e-12);
        assert!((ds.features[(1, 1)] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn clusters_are_labelled_per_class() {
        let ds = clusters(3, 4, 5, 0.1, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(ds.len(), 15);
        assert_eq!(ds.feature_count(), 4);
        assert_eq!(&ds.labels[..6], &[0, 0, 0, 0, 0, 1]);
        // every sample sits closest to its own centre feature
        for i in 0..ds.len() {
            assert!(ds.features[(ds.labels[i], i)] > 0.5);
        }
    }

    #[test]
    fn mismatched_labels_are_rejected() {
        assert!(Dataset::new(DMatrix::zeros(2, 3), vec![0, 1]).is_err());
    }
}
