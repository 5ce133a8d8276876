//! Unit-to-split assignment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::UnitId;
use crate::split::LeakageViolation;

/// Dataset partition a unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Validation, Split::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping unit id → split. Each unit appears exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitAssignment {
    assignments: BTreeMap<UnitId, Split>,
}

impl SplitAssignment {
    pub(crate) fn from_map(assignments: BTreeMap<UnitId, Split>) -> Self {
        Self { assignments }
    }

    /// Build from explicit per-split unit lists, rejecting any unit listed
    /// under two different splits.
    pub fn from_lists(
        train: &[UnitId],
        validation: &[UnitId],
        test: &[UnitId],
    ) -> Result<Self, LeakageViolation> {
        let mut assignments = BTreeMap::new();
        for (split, units) in [
            (Split::Train, train),
            (Split::Validation, validation),
            (Split::Test, test),
        ] {
            for unit in units {
                if let Some(&first) = assignments.get(unit) {
                    if first != split {
                        return Err(LeakageViolation {
                            unit_id: unit.clone(),
                            first,
                            second: split,
                        });
                    }
                }
                assignments.insert(unit.clone(), split);
            }
        }
        Ok(Self { assignments })
    }

    pub fn split_of(&self, unit: &UnitId) -> Option<Split> {
        self.assignments.get(unit).copied()
    }

    /// Units of one split in ascending id order.
    pub fn units(&self, split: Split) -> Vec<&UnitId> {
        self.assignments
            .iter()
            .filter(|(_, s)| **s == split)
            .map(|(u, _)| u)
            .collect()
    }

    pub fn count(&self, split: Split) -> usize {
        self.assignments.values().filter(|s| **s == split).count()
    }

    /// Unit counts as (train, validation, test).
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.count(Split::Train),
            self.count(Split::Validation),
            self.count(Split::Test),
        )
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UnitId, Split)> {
        self.assignments.iter().map(|(u, s)| (u, *s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lists_rejects_overlap() {
        let err = SplitAssignment::from_lists(
            &[UnitId::from("a"), UnitId::from("b")],
            &[UnitId::from("b")],
            &[],
        )
        .unwrap_err();
        assert_eq!(err.unit_id, UnitId::from("b"));
        assert_eq!(err.first, Split::Train);
        assert_eq!(err.second, Split::Validation);
    }

    #[test]
    fn test_units_sorted_per_split() {
        let a = SplitAssignment::from_lists(
            &[UnitId::from("c"), UnitId::from("a")],
            &[UnitId::from("b")],
            &[UnitId::from("d")],
        )
        .expect("disjoint lists");
        assert_eq!(a.units(Split::Train), vec![&UnitId::from("a"), &UnitId::from("c")]);
        assert_eq!(a.counts(), (2, 1, 1));
        assert_eq!(a.split_of(&UnitId::from("d")), Some(Split::Test));
        assert_eq!(a.split_of(&UnitId::from("z")), None);
    }
}
