//! Piecewise-linear RUL labels.
//!
//! `label = min(max_rul, failure_cycle - end_cycle)`. Early-life windows carry
//! no degradation signal, so they all share the cap.

use super::windowing::Windows;
use crate::config::ConfigError;
use crate::types::{Window, WindowTensor};

/// Remaining cycles at `end_cycle`, capped at `max_rul`. Never negative.
pub fn piecewise_rul(failure_cycle: u32, end_cycle: u32, max_rul: u32) -> f64 {
    f64::from(failure_cycle.saturating_sub(end_cycle).min(max_rul))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RulLabeler {
    max_rul: u32,
}

impl RulLabeler {
    pub fn new(max_rul: u32) -> Result<Self, ConfigError> {
        if max_rul == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "labeling.max_rul",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(Self { max_rul })
    }

    pub fn max_rul(&self) -> u32 {
        self.max_rul
    }

    pub fn label(&self, window: &Window<'_>, failure_cycle: u32) -> f64 {
        piecewise_rul(failure_cycle, window.end_cycle, self.max_rul)
    }

    /// Materialize and label every window of one trajectory.
    pub fn materialize(&self, windows: Windows<'_>) -> WindowTensor {
        let t = windows.trajectory();
        let failure = t.failure_cycle();
        let mut tensor = WindowTensor::new(windows.sequence_length(), t.feature_count());
        tensor.data.reserve(windows.len() * tensor.window_size());
        for w in windows {
            let label = self.label(&w, failure);
            tensor.push(&w, label);
        }
        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::WindowGenerator;
    use crate::types::{FeatureSchema, Trajectory, UnitId};
    use std::sync::Arc;

    #[test]
    fn test_cap_and_linear_region() {
        assert_eq!(piecewise_rul(200, 50, 130), 130.0);
        assert_eq!(piecewise_rul(200, 180, 130), 20.0);
        assert_eq!(piecewise_rul(200, 200, 130), 0.0);
    }

    #[test]
    fn test_materialize_labels_non_increasing() {
        let len = 201u32;
        let t = Trajectory::new(
            UnitId::from(1),
            Arc::new(FeatureSchema::sensors_only(&["s_1"])),
            (0..len).collect(),
            vec![0.5; len as usize],
        )
        .expect("valid trajectory");
        let labeler = RulLabeler::new(130).expect("valid cap");
        let gen = WindowGenerator::new(30, 10).expect("valid geometry");

        let tensor = labeler.materialize(gen.generate(&t));
        assert_eq!(tensor.count(), gen.window_count(t.len()));
        assert_eq!(tensor.shape(), (18, 30, 1));
        assert!(tensor.labels.windows(2).all(|p| p[1] <= p[0]));
        assert!(tensor.labels.iter().all(|&l| (0.0..=130.0).contains(&l)));
        // last window ends at cycle 199, one cycle before failure
        assert_eq!(tensor.labels.last().copied(), Some(1.0));
        assert_eq!(tensor.end_cycles[0], 29);
    }

    #[test]
    fn test_zero_cap_rejected() {
        assert!(RulLabeler::new(0).is_err());
    }
}
