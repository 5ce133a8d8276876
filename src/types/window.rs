//! Borrowed fixed-length window over a trajectory.

use super::{FeatureSchema, UnitId};

/// Contiguous `sequence_length × feature_count` view ending at `end_index`.
///
/// Windows borrow the trajectory's row-major buffer and are never persisted on
/// their own; [`WindowTensor`](super::WindowTensor) is the materialized form.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    pub unit_id: &'a UnitId,
    pub schema: &'a FeatureSchema,
    /// 0-based row index of the last sample in the window.
    pub end_index: usize,
    /// Cycle number recorded at `end_index`.
    pub end_cycle: u32,
    pub sequence_length: usize,
    pub values: &'a [f64],
}

impl<'a> Window<'a> {
    pub fn feature_count(&self) -> usize {
        self.schema.len()
    }

    /// 0-based row index of the first sample in the window.
    pub fn start_index(&self) -> usize {
        self.end_index + 1 - self.sequence_length
    }

    pub fn row(&self, i: usize) -> Option<&'a [f64]> {
        let f = self.feature_count();
        if i >= self.sequence_length {
            return None;
        }
        self.values.get(i * f..(i + 1) * f)
    }

    /// Iterate rows oldest first.
    pub fn rows(&self) -> impl Iterator<Item = &'a [f64]> + 'a {
        self.values.chunks_exact(self.schema.len().max(1))
    }
}
