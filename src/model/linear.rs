//! Linear baseline over the flattened window.
//!
//! `rul = w · x + b` where `x` is the whole `sequence_length × feature_count`
//! window. Trained on mean squared error with mini-batch Adam.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::{AdamOptimizer, RulModel};
use crate::config::{ConfigError, ModelConfig};
use crate::processing::Batcher;
use crate::types::WindowTensor;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no training windows")]
    NoTrainingData,

    #[error("{labels} labels for {windows} windows")]
    LabelCount { windows: usize, labels: usize },

    #[error("window shape ({found_sequence}, {found_features}) does not match trained shape ({sequence_length}, {feature_count})")]
    ShapeMismatch {
        sequence_length: usize,
        feature_count: usize,
        found_sequence: usize,
        found_features: usize,
    },

    #[error("training diverged at epoch {epoch} (loss {loss})")]
    Diverged { epoch: usize, loss: f64 },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Trained weights of [`LinearRulModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModelHandle {
    pub sequence_length: usize,
    pub feature_count: usize,
    pub weights: Vec<f64>,
    pub bias: f64,
    /// Mean squared error of the last epoch.
    pub final_loss: f64,
}

impl LinearModelHandle {
    pub fn predict_one(&self, window: &[f64]) -> f64 {
        self.weights.iter().zip(window).map(|(w, x)| w * x).sum::<f64>() + self.bias
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearRulModel {
    config: ModelConfig,
}

impl LinearRulModel {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Small uniform weights, Xavier-scaled by the window size; bias starts at
    /// the mean label.
    #[allow(clippy::cast_precision_loss)]
    fn initial_params(&self, size: usize, labels: &[f64]) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let bound = (2.0 / (size as f64 + 1.0)).sqrt();
        let mut params: Vec<f64> = (0..size)
            .map(|_| rng.gen::<f64>() * 2.0 * bound - bound)
            .collect();
        params.push(labels.iter().sum::<f64>() / labels.len() as f64);
        params
    }
}

impl RulModel for LinearRulModel {
    type Handle = LinearModelHandle;
    type Error = ModelError;

    #[allow(clippy::cast_precision_loss)]
    fn train(&self, windows: &WindowTensor, labels: &[f64]) -> Result<LinearModelHandle, ModelError> {
        if windows.is_empty() {
            return Err(ModelError::NoTrainingData);
        }
        if labels.len() != windows.count() {
            return Err(ModelError::LabelCount {
                windows: windows.count(),
                labels: labels.len(),
            });
        }

        let size = windows.window_size();
        // weights followed by the bias
        let mut params = self.initial_params(size, labels);
        let mut optimizer = AdamOptimizer::from_config(&self.config, size + 1);
        let mut grads = vec![0.0; size + 1];
        let mut loss = f64::NAN;

        for epoch in 0..self.config.epochs {
            let mut sq_err = 0.0;
            let mut offset = 0;
            for batch in Batcher::new(windows, self.config.batch_size)? {
                let k = batch.len();
                let y = &labels[offset..offset + k];
                offset += k;

                grads.iter_mut().for_each(|g| *g = 0.0);
                let (w, b) = params.split_at(size);
                for (x, target) in batch.x.chunks_exact(size).zip(y) {
                    let pred = w.iter().zip(x).map(|(w, x)| w * x).sum::<f64>() + b[0];
                    let err = pred - target;
                    sq_err += err * err;
                    let scale = 2.0 * err / k as f64;
                    for (g, x) in grads[..size].iter_mut().zip(x) {
                        *g += scale * x;
                    }
                    grads[size] += scale;
                }
                optimizer.apply(&mut params, &grads);
            }

            loss = sq_err / windows.count() as f64;
            if !loss.is_finite() {
                return Err(ModelError::Diverged { epoch, loss });
            }
            debug!(epoch, loss, lr = optimizer.current_lr(), "Linear model epoch");
        }

        info!(
            epochs = self.config.epochs,
            windows = windows.count(),
            params = size + 1,
            loss,
            "Linear model trained"
        );

        let bias = params[size];
        params.truncate(size);
        Ok(LinearModelHandle {
            sequence_length: windows.sequence_length,
            feature_count: windows.feature_count,
            weights: params,
            bias,
            final_loss: loss,
        })
    }

    fn predict(&self, handle: &LinearModelHandle, windows: &WindowTensor) -> Result<Vec<f64>, ModelError> {
        if windows.sequence_length != handle.sequence_length || windows.feature_count != handle.feature_count {
            return Err(ModelError::ShapeMismatch {
                sequence_length: handle.sequence_length,
                feature_count: handle.feature_count,
                found_sequence: windows.sequence_length,
                found_features: windows.feature_count,
            });
        }
        let size = windows.window_size();
        if size == 0 {
            return Ok(vec![handle.bias; windows.count()]);
        }
        Ok(windows
            .data
            .chunks_exact(size)
            .map(|x| handle.predict_one(x))
            .collect())
    }
}
