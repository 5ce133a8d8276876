//! Maintenance-point outcomes per unit.
//!
//! A unit's end of life is read off its prediction curve: the end cycle of
//! the first window predicted at or below zero, otherwise the last end cycle
//! plus the last prediction. Scheduling maintenance `m` cycles before the
//! predicted end of life either wastes lifetime or lets the unit break.
//!
//! Susto et al. (2015), "Machine Learning for Predictive Maintenance: A
//! Multiple Classifiers Approach".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::PredictionRecord;
use crate::types::UnitId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeOutcome {
    pub unit_id: UnitId,
    pub predicted_end_of_life: f64,
    pub true_end_of_life: f64,
}

/// End of life implied by a RUL curve sampled at `cycles`.
fn end_of_life(cycles: &[u32], rul: &[f64]) -> f64 {
    match rul.iter().position(|r| *r <= 0.0) {
        Some(i) => f64::from(cycles[i]),
        None => match (cycles.last(), rul.last()) {
            (Some(c), Some(r)) => f64::from(*c) + r,
            _ => 0.0,
        },
    }
}

impl LifeOutcome {
    /// Outcome of one unit's records, ordered by end cycle. `None` if empty.
    pub fn from_records(unit_id: UnitId, records: &[&PredictionRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let mut sorted: Vec<&PredictionRecord> = records.to_vec();
        sorted.sort_by_key(|r| r.end_cycle);
        let cycles: Vec<u32> = sorted.iter().map(|r| r.end_cycle).collect();
        let predicted: Vec<f64> = sorted.iter().map(|r| r.predicted).collect();
        let actual: Vec<f64> = sorted.iter().map(|r| r.actual).collect();
        Some(Self {
            unit_id,
            predicted_end_of_life: end_of_life(&cycles, &predicted),
            true_end_of_life: end_of_life(&cycles, &actual),
        })
    }

    /// Cycle at which maintenance is scheduled for fault horizon `m`.
    pub fn maintenance_point(&self, m: f64) -> f64 {
        self.predicted_end_of_life - m
    }

    /// Cycles of useful life thrown away by maintaining at the maintenance point.
    pub fn unexploited_lifetime(&self, m: f64) -> f64 {
        let point = self.maintenance_point(m);
        if point < self.true_end_of_life {
            self.true_end_of_life - point
        } else {
            0.0
        }
    }

    /// True when the unit fails before scheduled maintenance.
    pub fn unexpected_break(&self, m: f64) -> bool {
        self.maintenance_point(m) >= self.true_end_of_life
    }
}

/// Group records by unit and compute each unit's outcome.
pub fn life_outcomes(records: &[PredictionRecord]) -> Vec<LifeOutcome> {
    let mut by_unit: BTreeMap<&UnitId, Vec<&PredictionRecord>> = BTreeMap::new();
    for r in records {
        by_unit.entry(&r.unit_id).or_default().push(r);
    }
    by_unit
        .into_iter()
        .filter_map(|(unit, recs)| LifeOutcome::from_records(unit.clone(), &recs))
        .collect()
}

/// Weights of the two terms of the combined maintenance cost J.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceCostWeights {
    /// q1, applied to the normalized unexpected-break indicator.
    pub unexpected_break: f64,
    /// q2, applied to the normalized unexploited lifetime.
    pub unexploited_lifetime: f64,
}

impl Default for MaintenanceCostWeights {
    fn default() -> Self {
        Self {
            unexpected_break: 1.0,
            unexploited_lifetime: 1.0,
        }
    }
}

/// Keeps the normalization finite when every unit scores zero on a term.
const NORMALIZATION_EPS: f64 = 1e-10;

/// Fleet averages at one fault horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonPoint {
    pub horizon: f64,
    pub mean_unexploited_lifetime: f64,
    /// Fraction of units that break before maintenance.
    pub unexpected_break_rate: f64,
    /// Combined cost: mean over units of `q1 * break / max(break)` plus
    /// `q2 * unexploited / max(unexploited)`. Lower is better.
    pub metric_j: f64,
}

/// Evaluate `steps` horizons evenly spaced over `[0, max_horizon]`.
#[allow(clippy::cast_precision_loss)]
pub fn horizon_sweep(
    outcomes: &[LifeOutcome],
    max_horizon: f64,
    steps: usize,
    weights: MaintenanceCostWeights,
) -> Vec<HorizonPoint> {
    if outcomes.is_empty() || steps == 0 {
        return Vec::new();
    }
    let n = outcomes.len() as f64;
    (0..steps)
        .map(|i| {
            let m = if steps == 1 {
                0.0
            } else {
                max_horizon * i as f64 / (steps - 1) as f64
            };
            let unexploited: Vec<f64> = outcomes.iter().map(|o| o.unexploited_lifetime(m)).collect();
            let breaks: Vec<f64> = outcomes
                .iter()
                .map(|o| if o.unexpected_break(m) { 1.0 } else { 0.0 })
                .collect();

            let max_ul = unexploited.iter().copied().fold(0.0, f64::max) + NORMALIZATION_EPS;
            let max_ub = breaks.iter().copied().fold(0.0, f64::max) + NORMALIZATION_EPS;
            let j: f64 = breaks
                .iter()
                .zip(&unexploited)
                .map(|(ub, ul)| {
                    weights.unexpected_break * ub / max_ub
                        + weights.unexploited_lifetime * ul / max_ul
                })
                .sum();

            HorizonPoint {
                horizon: m,
                mean_unexploited_lifetime: unexploited.iter().sum::<f64>() / n,
                unexpected_break_rate: breaks.iter().sum::<f64>() / n,
                metric_j: j / n,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(unit: &str, cycles: &[u32], predicted: &[f64], actual: &[f64]) -> Vec<PredictionRecord> {
        cycles
            .iter()
            .zip(predicted.iter().zip(actual))
            .map(|(c, (p, a))| PredictionRecord {
                unit_id: UnitId::from(unit),
                end_cycle: *c,
                predicted: *p,
                actual: *a,
            })
            .collect()
    }

    #[test]
    fn test_end_of_life_extrapolates_last_prediction() {
        let recs = records("u", &[10, 20, 30], &[40.0, 30.0, 25.0], &[30.0, 20.0, 10.0]);
        let outcomes = life_outcomes(&recs);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].predicted_end_of_life, 55.0);
        assert_eq!(outcomes[0].true_end_of_life, 40.0);
    }

    #[test]
    fn test_end_of_life_first_zero_prediction() {
        let recs = records("u", &[5, 6, 7], &[1.0, 0.0, -1.0], &[3.0, 2.0, 1.0]);
        let o = &life_outcomes(&recs)[0];
        assert_eq!(o.predicted_end_of_life, 6.0);
        assert_eq!(o.true_end_of_life, 8.0);
    }

    #[test]
    fn test_unexploited_and_break() {
        let o = LifeOutcome {
            unit_id: UnitId::from("u"),
            predicted_end_of_life: 100.0,
            true_end_of_life: 110.0,
        };
        assert_eq!(o.maintenance_point(20.0), 80.0);
        assert_eq!(o.unexploited_lifetime(20.0), 30.0);
        assert!(!o.unexpected_break(20.0));

        let late = LifeOutcome {
            predicted_end_of_life: 120.0,
            ..o
        };
        assert_eq!(late.unexploited_lifetime(0.0), 0.0);
        assert!(late.unexpected_break(0.0));
        assert!(!late.unexpected_break(15.0));
    }

    #[test]
    fn test_horizon_sweep_grid() {
        let outcomes = vec![
            LifeOutcome {
                unit_id: UnitId::from("a"),
                predicted_end_of_life: 100.0,
                true_end_of_life: 100.0,
            },
            LifeOutcome {
                unit_id: UnitId::from("b"),
                predicted_end_of_life: 90.0,
                true_end_of_life: 100.0,
            },
        ];
        let sweep = horizon_sweep(&outcomes, 10.0, 3, MaintenanceCostWeights::default());
        let horizons: Vec<f64> = sweep.iter().map(|p| p.horizon).collect();
        assert_eq!(horizons, vec![0.0, 5.0, 10.0]);
        assert_eq!(sweep[0].unexpected_break_rate, 0.5);
        assert_eq!(sweep[0].mean_unexploited_lifetime, 5.0);
        assert_eq!(sweep[2].unexpected_break_rate, 0.0);
        assert_eq!(sweep[2].mean_unexploited_lifetime, 15.0);
    }

    #[test]
    fn test_metric_j_normalizes_each_term() {
        // at m=0: breaks [0, 1], unexploited [10, 0]
        let outcomes = vec![
            LifeOutcome {
                unit_id: UnitId::from("a"),
                predicted_end_of_life: 90.0,
                true_end_of_life: 100.0,
            },
            LifeOutcome {
                unit_id: UnitId::from("b"),
                predicted_end_of_life: 105.0,
                true_end_of_life: 100.0,
            },
        ];
        let weights = MaintenanceCostWeights {
            unexpected_break: 2.0,
            unexploited_lifetime: 0.5,
        };
        let sweep = horizon_sweep(&outcomes, 10.0, 2, weights);
        assert!((sweep[0].metric_j - (2.0 + 0.5) / 2.0).abs() < 1e-6);

        // at m=10: no breaks, unexploited [20, 5]
        let expected = 0.5 * (20.0 / 20.0 + 5.0 / 20.0) / 2.0;
        assert!((sweep[1].metric_j - expected).abs() < 1e-6);
    }

    #[test]
    fn test_metric_j_counts_break_at_end_of_life() {
        let outcomes = vec![LifeOutcome {
            unit_id: UnitId::from("a"),
            predicted_end_of_life: 50.0,
            true_end_of_life: 50.0,
        }];
        // maintenance exactly at end of life counts as a break
        let sweep = horizon_sweep(&outcomes, 0.0, 1, MaintenanceCostWeights::default());
        assert!((sweep[0].metric_j - 1.0).abs() < 1e-6);
        assert_eq!(sweep[0].mean_unexploited_lifetime, 0.0);
    }
}
