//! Materialized windows of one split.

use serde::{Deserialize, Serialize};

use super::{UnitId, Window};

/// Windows of one split laid out as `(count, sequence_length, feature_count)`.
///
/// `data` is flat row-major. `labels`, `unit_ids` and `end_cycles` are
/// parallel to the window axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowTensor {
    pub sequence_length: usize,
    pub feature_count: usize,
    pub data: Vec<f64>,
    pub labels: Vec<f64>,
    pub unit_ids: Vec<UnitId>,
    pub end_cycles: Vec<u32>,
}

impl WindowTensor {
    pub fn new(sequence_length: usize, feature_count: usize) -> Self {
        Self {
            sequence_length,
            feature_count,
            ..Self::default()
        }
    }

    /// Values per window.
    pub fn window_size(&self) -> usize {
        self.sequence_length * self.feature_count
    }

    /// Number of windows.
    pub fn count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.count(), self.sequence_length, self.feature_count)
    }

    /// Flat values of window `i`.
    pub fn window(&self, i: usize) -> Option<&[f64]> {
        let size = self.window_size();
        self.data.get(i * size..(i + 1) * size)
    }

    pub fn push(&mut self, window: &Window<'_>, label: f64) {
        debug_assert_eq!(window.values.len(), self.window_size());
        self.data.extend_from_slice(window.values);
        self.labels.push(label);
        self.unit_ids.push(window.unit_id.clone());
        self.end_cycles.push(window.end_cycle);
    }

    /// Move every window of `other` onto the end of `self`.
    pub fn append(&mut self, mut other: Self) {
        debug_assert_eq!(self.window_size(), other.window_size());
        self.data.append(&mut other.data);
        self.labels.append(&mut other.labels);
        self.unit_ids.append(&mut other.unit_ids);
        self.end_cycles.append(&mut other.end_cycles);
    }

    /// Distinct unit ids in first-seen order.
    pub fn units(&self) -> Vec<&UnitId> {
        let mut seen: Vec<&UnitId> = Vec::new();
        for id in &self.unit_ids {
            if seen.last() != Some(&id) && !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureSchema;

    #[test]
    fn test_push_and_index() {
        let schema = FeatureSchema::sensors_only(&["s_1", "s_2"]);
        let unit = UnitId::from(3);
        let values = [1.0, 2.0, 3.0, 4.0];
        let w = Window {
            unit_id: &unit,
            schema: &schema,
            end_index: 1,
            end_cycle: 2,
            sequence_length: 2,
            values: &values,
        };

        let mut t = WindowTensor::new(2, 2);
        t.push(&w, 17.0);
        t.push(&w, 16.0);

        assert_eq!(t.shape(), (2, 2, 2));
        assert_eq!(t.window(1), Some(&values[..]));
        assert!(t.window(2).is_none());
        assert_eq!(t.units(), vec![&unit]);
    }
}
