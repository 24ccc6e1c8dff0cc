use std::path::Path;

use digit_recognizer::{data, FeedForwardNetwork, TrainingConfig, TrainingHistory};
use log::info;
use plotters::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

const CLASSES: usize = 10;
const FEATURES: usize = 16;
const SAMPLES_PER_CLASS: usize = 200;
const TEST_SAMPLES: usize = 400;

fn plot_loss(history: &TrainingHistory, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (1080, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let losses = history.losses();
    let max = losses.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut chart = ChartBuilder::on(&root)
        .caption("Cross-Entropy Loss by Epoch", ("sans-serif", 20).into_font())
        .margin(3)
        .x_label_area_size(30)
        .y_label_area_size(30)
        .build_cartesian_2d(0f32..losses.len().max(1) as f32, 0f32..(max as f32 * 1.05))?;

    chart
        .draw_series(LineSeries::new(
            losses.iter().enumerate().map(|(epoch, &loss)| (epoch as f32, loss as f32)),
            RED.stroke_width(1),
        ))?
        .label("training loss")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], RED.filled()));

    chart.configure_mesh().x_desc("Training Epoch").y_desc("Loss").draw()?;
    chart.configure_series_labels().border_style(BLACK).draw()?;
    root.present()?;

    Ok(())
}

/// Trains a small network on Gaussian clusters, plots the loss curve and saves the model.
pub fn run_sample(config: &TrainingConfig, model_name: &str) -> anyhow::Result<()> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut dataset = data::clusters(CLASSES, FEATURES, SAMPLES_PER_CLASS, 0.3, &mut rng)?;
    dataset.shuffle(&mut rng);
    let (test, train) = dataset.split_at(TEST_SAMPLES);

    let mut net = FeedForwardNetwork::with_rng(vec![FEATURES, 32, CLASSES], StdRng::from_rng(&mut rng)?)?;
    let history = net.train(&train.features, &train.targets(CLASSES)?, &train.labels, config)?;

    let accuracy = net.evaluate(&test.features, &test.labels)?;
    info!(
        "architecture {:?}: accuracy {:.4}, {} parameters, efficiency {:.8e}",
        net.layer_sizes(),
        accuracy,
        net.parameter_count(),
        net.parameter_efficiency(accuracy)
    );

    plot_loss(&history, Path::new("training_loss.jpg")).map_err(|e| anyhow::anyhow!("couldn't plot loss: {e}"))?;
    let path = net.save(model_name)?;
    info!("model written to {}", path.display());

    Ok(())
}
