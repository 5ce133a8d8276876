//! Sliding-window generation over a single trajectory.
//!
//! For a trajectory of length `L`, window length `w` and stride `s` the
//! generator yields `floor((L - w) / s) + 1` windows ending at row indices
//! `w - 1, w - 1 + s, ...`. Trajectories shorter than `w` yield nothing; the
//! pipeline records them as exclusions.

use crate::config::{ConfigError, WindowConfig};
use crate::types::{Trajectory, Window};

/// Window geometry, validated once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGenerator {
    sequence_length: usize,
    stride: usize,
}

impl WindowGenerator {
    pub fn new(sequence_length: usize, stride: usize) -> Result<Self, ConfigError> {
        if sequence_length == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "window.sequence_length",
                reason: "must be > 0".to_string(),
            });
        }
        if stride == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "window.stride",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(Self {
            sequence_length,
            stride,
        })
    }

    pub fn from_config(config: &WindowConfig) -> Result<Self, ConfigError> {
        Self::new(config.sequence_length, config.stride)
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Windows produced for a trajectory of `len` samples.
    pub fn window_count(&self, len: usize) -> usize {
        if len < self.sequence_length {
            0
        } else {
            (len - self.sequence_length) / self.stride + 1
        }
    }

    /// Lazy, restartable window sequence over `trajectory`.
    pub fn generate<'a>(&self, trajectory: &'a Trajectory) -> Windows<'a> {
        Windows {
            trajectory,
            sequence_length: self.sequence_length,
            stride: self.stride,
            next: 0,
            count: self.window_count(trajectory.len()),
        }
    }
}

/// Finite window iterator borrowing one trajectory.
///
/// Cloning or [`restart`](Windows::restart) replays from the first window
/// without touching raw data again.
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    trajectory: &'a Trajectory,
    sequence_length: usize,
    stride: usize,
    next: usize,
    count: usize,
}

impl<'a> Windows<'a> {
    pub fn trajectory(&self) -> &'a Trajectory {
        self.trajectory
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn restart(&mut self) {
        self.next = 0;
    }

    /// The `k`-th window, independent of iteration state.
    pub fn nth_window(&self, k: usize) -> Option<Window<'a>> {
        if k >= self.count {
            return None;
        }
        let t = self.trajectory;
        let f = t.feature_count();
        let end_index = self.sequence_length - 1 + k * self.stride;
        let start = end_index + 1 - self.sequence_length;
        Some(Window {
            unit_id: t.unit_id(),
            schema: t.schema(),
            end_index,
            end_cycle: t.cycles()[end_index],
            sequence_length: self.sequence_length,
            values: &t.values()[start * f..(end_index + 1) * f],
        })
    }
}

impl<'a> Iterator for Windows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let w = self.nth_window(self.next)?;
        self.next += 1;
        Some(w)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows<'_> {}

impl std::iter::FusedIterator for Windows<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureSchema, UnitId};
    use std::sync::Arc;

    /// Single-feature trajectory whose reading equals its row index.
    fn ramp(len: usize, first_cycle: u32) -> Trajectory {
        let cycles: Vec<u32> = (0..len as u32).map(|c| c + first_cycle).collect();
        let values: Vec<f64> = (0..len).map(|i| i as f64).collect();
        Trajectory::new(
            UnitId::from("ramp"),
            Arc::new(FeatureSchema::sensors_only(&["s_1"])),
            cycles,
            values,
        )
        .expect("valid trajectory")
    }

    #[test]
    fn test_length_200_window_30_stride_10() {
        let t = ramp(200, 0);
        let gen = WindowGenerator::new(30, 10).expect("valid geometry");
        let windows: Vec<Window<'_>> = gen.generate(&t).collect();

        assert_eq!(windows.len(), 18);
        assert_eq!(windows[0].end_cycle, 29);
        assert_eq!(windows[17].end_cycle, 199);
        assert!(windows.iter().all(|w| w.values.len() == 30));
        assert_eq!(windows[1].values[0], 10.0);
    }

    #[test]
    fn test_exact_size_and_restart() {
        let t = ramp(50, 1);
        let gen = WindowGenerator::new(10, 3).expect("valid geometry");
        let mut it = gen.generate(&t);
        assert_eq!(it.len(), 14);

        let first = it.next().map(|w| w.end_cycle);
        it.by_ref().for_each(drop);
        assert_eq!(it.len(), 0);
        assert!(it.next().is_none());

        it.restart();
        assert_eq!(it.len(), 14);
        assert_eq!(it.next().map(|w| w.end_cycle), first);
    }

    #[test]
    fn test_clone_replays_independently() {
        let t = ramp(12, 0);
        let gen = WindowGenerator::new(4, 4).expect("valid geometry");
        let mut it = gen.generate(&t);
        let replay = it.clone();
        it.next();
        let ends: Vec<usize> = replay.map(|w| w.end_index).collect();
        assert_eq!(ends, vec![3, 7, 11]);
    }

    #[test]
    fn test_short_trajectory_yields_nothing() {
        let t = ramp(5, 0);
        let gen = WindowGenerator::new(6, 1).expect("valid geometry");
        assert_eq!(gen.generate(&t).count(), 0);
        assert_eq!(gen.window_count(6), 1);
    }

    #[test]
    fn test_zero_geometry_rejected() {
        assert!(WindowGenerator::new(0, 1).is_err());
        assert!(WindowGenerator::new(5, 0).is_err());
    }

    #[test]
    fn test_window_rows_are_contiguous() {
        let t = ramp(8, 0);
        let gen = WindowGenerator::new(3, 2).expect("valid geometry");
        let w = gen.generate(&t).nth(1).expect("second window");
        assert_eq!(w.start_index(), 2);
        let rows: Vec<f64> = w.rows().map(|r| r[0]).collect();
        assert_eq!(rows, vec![2.0, 3.0, 4.0]);
    }
}
