//! Adam optimizer over a flat parameter vector.

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;

/// Adam with a per-step multiplicative learning-rate decay and a floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamOptimizer {
    /// Base learning rate (decays every step).
    pub lr: f64,
    /// LR decay factor per step.
    pub decay: f64,
    /// Minimum learning rate.
    pub lr_floor: f64,
    /// First moment decay.
    pub beta1: f64,
    /// Second moment decay.
    pub beta2: f64,
    pub eps: f64,
    /// Total steps taken.
    pub steps: u64,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl AdamOptimizer {
    pub fn new(num_params: usize, lr: f64) -> Self {
        Self {
            lr,
            decay: 1.0,
            lr_floor: 0.0,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            steps: 0,
            m: vec![0.0; num_params],
            v: vec![0.0; num_params],
        }
    }

    pub fn from_config(config: &ModelConfig, num_params: usize) -> Self {
        Self {
            decay: config.lr_decay,
            lr_floor: config.lr_floor,
            ..Self::new(num_params, config.learning_rate)
        }
    }

    /// Current base learning rate (before bias correction).
    pub fn current_lr(&self) -> f64 {
        self.lr
    }

    pub fn num_params(&self) -> usize {
        self.m.len()
    }

    /// One update step. `params` and `grads` share the moment layout.
    #[allow(clippy::cast_precision_loss)]
    pub fn apply(&mut self, params: &mut [f64], grads: &[f64]) {
        debug_assert_eq!(params.len(), self.m.len());
        debug_assert_eq!(grads.len(), self.m.len());
        self.steps += 1;
        let t = self.steps as f64;

        // Bias-corrected LR
        let lr_t = self.lr * (1.0 - self.beta2.powf(t)).sqrt() / (1.0 - self.beta1.powf(t));

        for (((w, g), m), v) in params
            .iter_mut()
            .zip(grads)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
        {
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
            *w -= lr_t * *m / (v.sqrt() + self.eps);
        }

        self.lr = (self.lr * self.decay).max(self.lr_floor);
    }
}
