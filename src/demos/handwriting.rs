use std::path::Path;

use digit_recognizer::{canvas, FeedForwardNetwork};

/// Classifies a drawing with a saved model and prints the probability of every digit.
pub fn run_sample(model_name: &str, image: &Path, invert: bool) -> anyhow::Result<()> {
    let net = FeedForwardNetwork::from_archive(model_name)?;
    // 28x28 pixels => 784 inputs for the usual [784, ..., 10] layouts
    let side = (net.input_size() as f64).sqrt() as u32;
    let pixels = canvas::pixels_from_image(image, side, invert)?;
    let prediction = net.predict(&pixels)?;

    for (digit, p) in prediction.probabilities.iter().enumerate() {
        println!("{digit}: {:6.2}%", p * 100.0);
    }
    println!("prediction: {} ({:.2}%)", prediction.digit, prediction.confidence() * 100.0);

    Ok(())
}
