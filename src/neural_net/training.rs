use log::{debug, info};
use nalgebra::DMatrix;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::{accuracy, FeedForwardNetwork};
use crate::{config::TrainingConfig, error::NetworkError};

/// The learning rate is divided after every epoch that is a non-zero multiple of this.
pub const DECAY_INTERVAL: usize = 10;
/// Progress is logged on every epoch that is a multiple of this.
pub const LOG_INTERVAL: usize = 5;

/// Step-decayed learning rate: divided by `divisor` every `DECAY_INTERVAL` epochs, never raised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDecay {
    initial: f64,
    divisor: f64,
    current: f64,
}

impl StepDecay {
    pub fn new(initial: f64, divisor: f64) -> Self {
        Self { initial, divisor, current: initial }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Called after the update of `epoch`, lowers the rate on decay boundaries.
    /// Returns whether the rate changed.
    pub fn advance(&mut self, epoch: usize) -> bool {
        if epoch % DECAY_INTERVAL == 0 && epoch != 0 {
            self.current /= self.divisor;
            return true;
        }
        false
    }

    /// Rate applied to the update of `epoch`.
    pub fn rate_for_epoch(&self, epoch: usize) -> f64 {
        let boundaries = epoch.saturating_sub(1) / DECAY_INTERVAL;
        self.initial / self.divisor.powi(boundaries as i32)
    }

    /// Rate left over once `epochs` epochs have run.
    pub fn rate_after(&self, epochs: usize) -> f64 {
        self.rate_for_epoch(epochs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    /// Rate used for this epoch's parameter update
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochReport>,
    pub final_learning_rate: f64,
}

impl TrainingHistory {
    pub fn first_loss(&self) -> Option<f64> {
        self.epochs.first().map(|r| r.loss)
    }

    pub fn last_loss(&self) -> Option<f64> {
        self.epochs.last().map(|r| r.loss)
    }

    pub fn losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|r| r.loss).collect()
    }
}

impl FeedForwardNetwork {
    /// Full-batch gradient descent over `config.epochs` epochs.
    ///
    /// `x` holds one sample per column, `y` the matching one-hot targets and `labels` the
    /// class indices used for the accuracy figures. Samples are reshuffled every epoch, the
    /// learning rate follows a [`StepDecay`] schedule.
    pub fn train(
        &mut self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        labels: &[usize],
        config: &TrainingConfig,
    ) -> Result<TrainingHistory, NetworkError> {
        config.validate()?;
        self.check_input(x)?;
        self.check_targets(x, y)?;
        self.check_labels(x, labels)?;

        if let Some(seed) = config.seed {
            self.rng = StdRng::seed_from_u64(seed);
        }

        let mut x = x.clone();
        let mut y = y.clone();
        let mut labels = labels.to_vec();
        let mut permutation: Vec<usize> = (0..x.ncols()).collect();
        let mut schedule = StepDecay::new(config.learning_rate, config.decay_divisor);
        let mut history = TrainingHistory {
            epochs: Vec::with_capacity(config.epochs),
            final_learning_rate: config.learning_rate,
        };

        for epoch in 0..config.epochs {
            // shuffle samples, keeping features, targets and labels paired
            permutation.shuffle(&mut self.rng);
            x = x.select_columns(permutation.iter());
            y = y.select_columns(permutation.iter());
            labels = permutation.iter().map(|&i| labels[i]).collect();

            let cache = self.forward_cached(&x);
            let loss = FeedForwardNetwork::compute_loss(cache.output(), &y)?;
            let batch_accuracy = accuracy(cache.output(), &labels);

            self.backward_from_cache(&cache, &y);
            let learning_rate = schedule.current();
            self.update_parameters(learning_rate)?;

            if config.log_progress && epoch % LOG_INTERVAL == 0 {
                info!(
                    "Epoch {epoch}: Loss = {loss:.4}, Accuracy = {:.2}%, Learning Rate = {learning_rate:.6}",
                    batch_accuracy * 100.0
                );
            }
            if schedule.advance(epoch) {
                debug!("learning rate decayed to {} after epoch {epoch}", schedule.current());
            }

            history.epochs.push(EpochReport {
                epoch,
                loss,
                accuracy: batch_accuracy,
                learning_rate,
            });
        }

        history.final_learning_rate = schedule.current();
        Ok(history)
    }

    /// [`FeedForwardNetwork::train`] with the hyperparameters spelled out.
    #[allow(clippy::too_many_arguments)]
    pub fn train_with(
        &mut self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        labels: &[usize],
        epochs: usize,
        learning_rate: f64,
        log_progress: bool,
        decay_divisor: f64,
    ) -> Result<TrainingHistory, NetworkError> {
        let config = TrainingConfig {
            epochs,
            learning_rate,
            decay_divisor,
            log_progress,
            seed: None,
        };
        self.train(x, y, labels, &config)
    }

    fn check_labels(&self, x: &DMatrix<f64>, labels: &[usize]) -> Result<(), NetworkError> {
        if labels.len() != x.ncols() {
            Err(NetworkError::ShapeMismatch {
                what: "label count",
                got: labels.len(),
                expected: x.ncols(),
            })?;
        }
        if let Some(&label) = labels.iter().find(|&&label| label >= self.output_size()) {
            Err(NetworkError::ShapeMismatch {
                what: "label value",
                got: label,
                expected: self.output_size(),
            })?;
        }
        Ok(())
    }
}
