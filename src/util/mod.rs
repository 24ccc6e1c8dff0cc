use nalgebra::{DMatrix, DVector};

/// Added to the softmax denominator and inside the loss logarithm.
pub const EPSILON: f64 = 1e-8;

pub fn relu(z: &DMatrix<f64>) -> DMatrix<f64> {
    z.map(|v| v.max(0.0))
}

/// 1 where the pre-activation was strictly positive, 0 elsewhere
pub fn relu_derivative(z: &DMatrix<f64>) -> DMatrix<f64> {
    z.map(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

/// Column-wise softmax, every column is treated as one sample.
///
/// The column maximum is subtracted before exponentiating so large scores
/// don't overflow.
pub fn softmax(z: &DMatrix<f64>) -> DMatrix<f64> {
    let mut result = z.clone();
    for mut column in result.column_iter_mut() {
        let max = column.max();
        column.apply(|v| *v = (*v - max).exp());
        let sum = column.sum();
        column /= sum + EPSILON;
    }
    result
}

/// Mean cross-entropy between predicted probabilities and one-hot targets.
pub fn cross_entropy(predictions: &DMatrix<f64>, targets: &DMatrix<f64>) -> f64 {
    let log_probs = predictions.map(|p| (p + EPSILON).ln());
    -targets.component_mul(&log_probs).sum() / targets.ncols() as f64
}

/// Row index of the largest entry of every column
pub fn argmax_columns(m: &DMatrix<f64>) -> Vec<usize> {
    m.column_iter().map(|column| column.imax()).collect()
}

pub fn argmax(v: &DVector<f64>) -> usize {
    v.imax()
}

pub fn clip(m: DMatrix<f64>, min: f64, max: f64) -> DMatrix<f64> {
    m.map(|v| v.clamp(min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_zeroes_negative_entries() {
        let z = DMatrix::from_row_slice(2, 2, &[-1.0, 2.0, 0.0, -0.5]);
        assert_eq!(relu(&z), DMatrix::from_row_slice(2, 2, &[0.0, 2.0, 0.0, 0.0]));
        assert_eq!(relu_derivative(&z), DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]));
    }

    #[test]
    fn softmax_columns_are_distributions() {
        let z = DMatrix::from_row_slice(3, 2, &[1.0, 1000.0, 2.0, -1000.0, 3.0, 999.0]);
        let a = softmax(&z);
        for column in a.column_iter() {
            assert!((column.sum() - 1.0).abs() < 1e-6);
            assert!(column.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
        // largest score wins in each column
        assert_eq!(argmax_columns(&a), vec![2, 0]);
    }

    #[test]
    fn cross_entropy_of_confident_correct_prediction_is_small() {
        let targets = DMatrix::from_row_slice(2, 1, &[1.0, 0.0]);
        let good = DMatrix::from_row_slice(2, 1, &[1.0, 0.0]);
        let bad = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        assert!(cross_entropy(&good, &targets) < 1e-6);
        // ln(1e-8) bounds the worst case
        assert!((cross_entropy(&bad, &targets) - 8.0 * 10f64.ln()).abs() < 1e-6);
    }

    #[test]
    fn clip_bounds_every_entry() {
        let m = DMatrix::from_row_slice(1, 3, &[-5.0, 0.25, 7.0]);
        assert_eq!(clip(m, -1.0, 1.0), DMatrix::from_row_slice(1, 3, &[-1.0, 0.25, 1.0]));
    }
}
