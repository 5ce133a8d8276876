//! Unit-granularity dataset partitioning.
//!
//! Units, never samples, are assigned to train / validation / test, so no
//! window of one unit can ever be seen in two splits.
//!
//! ## Algorithm
//!
//! 1. Sort unit ids (input order never matters)
//! 2. Fisher-Yates shuffle with a `StdRng` seeded from the config
//! 3. Cut `round(n * train)` train units, `round(n * validation)` validation
//!    units, the remainder is test

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{defaults, ConfigError, SplitConfig};
use crate::types::{Split, SplitAssignment, UnitId, WindowTensor};

// ============================================================================
// Ratios
// ============================================================================

/// Validated split proportions summing to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    train: f64,
    validation: f64,
    test: f64,
}

impl SplitRatios {
    pub fn new(train: f64, validation: f64, test: f64) -> Result<Self, ConfigError> {
        let valid = [train, validation, test]
            .iter()
            .all(|r| r.is_finite() && *r >= 0.0)
            && ((train + validation + test) - 1.0).abs() <= defaults::RATIO_SUM_TOLERANCE;
        if !valid {
            return Err(ConfigError::InvalidRatios {
                train,
                validation,
                test,
            });
        }
        Ok(Self {
            train,
            validation,
            test,
        })
    }

    pub fn train(&self) -> f64 {
        self.train
    }

    pub fn validation(&self) -> f64 {
        self.validation
    }

    pub fn test(&self) -> f64 {
        self.test
    }

    /// Units per split for a population of `n`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn counts(&self, n: usize) -> (usize, usize, usize) {
        let n_f = n as f64;
        let train = ((n_f * self.train).round() as usize).min(n);
        let validation = ((n_f * self.validation).round() as usize).min(n - train);
        (train, validation, n - train - validation)
    }
}

// ============================================================================
// Splitter
// ============================================================================

/// Deterministic, seeded unit splitter.
#[derive(Debug, Clone)]
pub struct DatasetSplitter {
    ratios: SplitRatios,
    seed: u64,
}

impl DatasetSplitter {
    pub fn new(ratios: SplitRatios, seed: u64) -> Self {
        Self { ratios, seed }
    }

    pub fn from_config(config: &SplitConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            SplitRatios::new(config.train, config.validation, config.test)?,
            config.seed,
        ))
    }

    /// Assign every unit to exactly one split.
    ///
    /// Fails when any split would receive zero units.
    pub fn split<'a>(
        &self,
        units: impl IntoIterator<Item = &'a UnitId>,
    ) -> Result<SplitAssignment, ConfigError> {
        let mut ids: Vec<UnitId> = units.into_iter().cloned().collect();
        ids.sort();
        ids.dedup();
        let n = ids.len();

        let mut rng = StdRng::seed_from_u64(self.seed);
        ids.shuffle(&mut rng);

        let (n_train, n_val, n_test) = self.ratios.counts(n);
        for (split, count) in [
            (Split::Train, n_train),
            (Split::Validation, n_val),
            (Split::Test, n_test),
        ] {
            if count == 0 {
                return Err(ConfigError::EmptySplit { split, units: n });
            }
        }

        let mut assignments = BTreeMap::new();
        for (i, id) in ids.into_iter().enumerate() {
            let split = if i < n_train {
                Split::Train
            } else if i < n_train + n_val {
                Split::Validation
            } else {
                Split::Test
            };
            debug!(unit = %id, split = %split, "Unit assigned");
            assignments.insert(id, split);
        }

        info!(
            units = n,
            train = n_train,
            validation = n_val,
            test = n_test,
            seed = self.seed,
            "Units split"
        );
        Ok(SplitAssignment::from_map(assignments))
    }
}

// ============================================================================
// Leakage Check
// ============================================================================

/// A unit whose windows were found in two splits. Signals a defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unit {unit_id} has windows in both the {first} and {second} splits")]
pub struct LeakageViolation {
    pub unit_id: UnitId,
    pub first: Split,
    pub second: Split,
}

/// Verify no unit id appears in more than one split's materialized windows.
pub fn check_leakage<'a>(
    groups: impl IntoIterator<Item = (Split, &'a WindowTensor)>,
) -> Result<(), LeakageViolation> {
    let mut owner: HashMap<&UnitId, Split> = HashMap::new();
    for (split, tensor) in groups {
        for unit in &tensor.unit_ids {
            match owner.get(unit) {
                Some(&first) if first != split => {
                    return Err(LeakageViolation {
                        unit_id: unit.clone(),
                        first,
                        second: split,
                    });
                }
                Some(_) => {}
                None => {
                    owner.insert(unit, split);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u32) -> Vec<UnitId> {
        (1..=n).map(UnitId::from).collect()
    }

    #[test]
    fn test_ratios_must_sum_to_one() {
        assert!(SplitRatios::new(0.7, 0.15, 0.15).is_ok());
        assert!(SplitRatios::new(0.7, 0.2, 0.2).is_err());
        assert!(SplitRatios::new(1.2, -0.1, -0.1).is_err());
        assert!(SplitRatios::new(f64::NAN, 0.5, 0.5).is_err());
    }

    #[test]
    fn test_counts_round_and_remainder_to_test() {
        let r = SplitRatios::new(0.7, 0.15, 0.15).expect("valid");
        assert_eq!(r.counts(100), (70, 15, 15));
        assert_eq!(r.counts(20), (14, 3, 3));
        assert_eq!(r.counts(7), (5, 1, 1));
    }

    #[test]
    fn test_every_unit_assigned_once() {
        let splitter = DatasetSplitter::new(SplitRatios::new(0.6, 0.2, 0.2).expect("valid"), 1);
        let units = ids(20);
        let a = splitter.split(&units).expect("split");
        assert_eq!(a.len(), 20);
        assert_eq!(a.counts(), (12, 4, 4));
        for u in &units {
            assert!(a.split_of(u).is_some());
        }
    }

    #[test]
    fn test_same_seed_same_assignment_regardless_of_input_order() {
        let splitter = DatasetSplitter::new(SplitRatios::new(0.5, 0.25, 0.25).expect("valid"), 99);
        let forward = ids(12);
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(
            splitter.split(&forward).expect("split"),
            splitter.split(&reversed).expect("split")
        );
    }

    #[test]
    fn test_zero_unit_split_rejected() {
        let splitter = DatasetSplitter::new(SplitRatios::new(0.8, 0.1, 0.1).expect("valid"), 0);
        let err = splitter.split(&ids(3)).unwrap_err();
        assert!(matches!(err, ConfigError::EmptySplit { split: Split::Validation, units: 3 }));
    }

    #[test]
    fn test_check_leakage_detects_shared_unit() {
        let mut train = WindowTensor::new(1, 1);
        train.unit_ids = vec![UnitId::from(1), UnitId::from(2)];
        let mut test = WindowTensor::new(1, 1);
        test.unit_ids = vec![UnitId::from(3), UnitId::from(2)];

        let err = check_leakage([(Split::Train, &train), (Split::Test, &test)]).unwrap_err();
        assert_eq!(err.unit_id, UnitId::from(2));
        assert_eq!((err.first, err.second), (Split::Train, Split::Test));

        let clean = WindowTensor::new(1, 1);
        assert!(check_leakage([(Split::Train, &train), (Split::Validation, &clean)]).is_ok());
    }
}
