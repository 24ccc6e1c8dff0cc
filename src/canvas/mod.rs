//! Glue between drawings and the network: pixel vectors in, predictions out.

use std::path::Path;

use image::imageops::FilterType;
use nalgebra::DVector;

use crate::util;

/// Side length of the square drawing grid the recognizer is trained on (28x28 = 784 inputs).
pub const GRID_SIDE: u32 = 28;

/// Class probabilities for one drawing together with the most likely digit.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub probabilities: DVector<f64>,
    pub digit: usize,
}

impl Prediction {
    pub fn new(probabilities: DVector<f64>) -> Self {
        let digit = util::argmax(&probabilities);
        Self { probabilities, digit }
    }

    pub fn confidence(&self) -> f64 {
        self.probabilities[self.digit]
    }
}

/// Loads an image as a `side * side` row-major vector of intensities in [0, 1].
///
/// Bright pixels count as ink. Pass `invert` for dark ink on light paper.
pub fn pixels_from_image(path: &Path, side: u32, invert: bool) -> Result<Vec<f64>, image::ImageError> {
    let image = image::open(path)?;
    Ok(pixels_from_luma(&image.resize_exact(side, side, FilterType::Triangle).to_luma8(), invert))
}

pub fn pixels_from_luma(image: &image::GrayImage, invert: bool) -> Vec<f64> {
    // GrayImage pixels are stored row by row, matching the grid's index = x + y * side
    image
        .pixels()
        .map(|p| {
            let value = p.0[0] as f64 / 255.0;
            if invert {
                1.0 - value
            } else {
                value
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn prediction_picks_most_likely_digit() {
        let mut probabilities = DVector::from_element(10, 0.05);
        probabilities[7] = 0.55;
        let prediction = Prediction::new(probabilities);
        assert_eq!(prediction.digit, 7);
        assert_eq!(prediction.confidence(), 0.55);
    }

    #[test]
    fn luma_pixels_are_row_major_and_scaled() {
        let mut image = GrayImage::new(2, 2);
        image.put_pixel(1, 0, Luma([255]));
        image.put_pixel(0, 1, Luma([51]));
        let close = |got: Vec<f64>, expected: [f64; 4]| got.iter().zip(expected).all(|(a, b)| (a - b).abs() < 1e-12);
        assert!(close(pixels_from_luma(&image, false), [0.0, 1.0, 0.2, 0.0]));
        assert!(close(pixels_from_luma(&image, true), [1.0, 0.0, 0.8, 1.0]));
    }
}
