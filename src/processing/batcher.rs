//! Fixed-size mini-batches over a materialized window tensor.

use crate::config::ConfigError;
use crate::types::WindowTensor;

/// One mini-batch: `x` holds `len × sequence_length × feature_count` values,
/// `y` the matching labels.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    pub x: &'a [f64],
    pub y: &'a [f64],
}

impl Batch<'_> {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Walks a tensor in `batch_size` steps. The last batch may be short.
///
/// By default one pass is made; with `restart_at_end(true)` the batcher wraps
/// around forever (an empty tensor still yields nothing).
#[derive(Debug, Clone)]
pub struct Batcher<'a> {
    tensor: &'a WindowTensor,
    batch_size: usize,
    restart_at_end: bool,
    position: usize,
}

impl<'a> Batcher<'a> {
    pub fn new(tensor: &'a WindowTensor, batch_size: usize) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "model.batch_size",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(Self {
            tensor,
            batch_size,
            restart_at_end: false,
            position: 0,
        })
    }

    #[must_use]
    pub fn restart_at_end(mut self, restart: bool) -> Self {
        self.restart_at_end = restart;
        self
    }

    /// Batches in one pass: `ceil(count / batch_size)`.
    pub fn len(&self) -> usize {
        self.tensor.count().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.tensor.is_empty()
    }

    pub fn restart(&mut self) {
        self.position = 0;
    }
}

impl<'a> Iterator for Batcher<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let count = self.tensor.count();
        if count == 0 {
            return None;
        }
        if self.position >= count {
            if !self.restart_at_end {
                return None;
            }
            self.position = 0;
        }

        let start = self.position;
        let end = (start + self.batch_size).min(count);
        self.position = end;

        let size = self.tensor.window_size();
        Some(Batch {
            x: &self.tensor.data[start * size..end * size],
            y: &self.tensor.labels[start..end],
        })
    }
}
