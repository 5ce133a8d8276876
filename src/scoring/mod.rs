//! Prediction scoring
//!
//! RMSE, MAE and the asymmetric RUL score over (predicted, true) pairs.
//!
//! ## Asymmetric Score
//!
//! For error `e = predicted - true`:
//! - `e < 0` (early, failure predicted too soon): `exp(-e / early_divisor) - 1`
//! - `e >= 0` (late, failure predicted too late): `exp(e / late_divisor) - 1`
//!
//! The aggregate is the sum over all samples. With the default divisors
//! (13 early, 10 late) a late prediction costs more than an equally wrong
//! early one.
//!
//! Supplementary metrics live in submodules: `lifetime` (maintenance-point
//! outcomes per unit) and `histogram` (errors binned by true RUL).

mod histogram;
mod lifetime;

pub use histogram::{ErrorHistogram, HistogramBin};
pub use lifetime::{horizon_sweep, life_outcomes, HorizonPoint, LifeOutcome, MaintenanceCostWeights};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::{defaults, ConfigError, ScoringConfig};
use crate::types::UnitId;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("{predictions} predictions for {labels} labels")]
    LengthMismatch { predictions: usize, labels: usize },

    #[error("nothing to score")]
    Empty,

    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },

    #[error("true label {label} at index {index} exceeds max_rul {max_rul}")]
    LabelAboveCap { index: usize, label: f64, max_rul: u32 },
}

// ============================================================================
// Metric Functions
// ============================================================================

/// Penalty for one prediction error `e = predicted - true`.
pub fn asymmetric_penalty(error: f64, early_divisor: f64, late_divisor: f64) -> f64 {
    if error < 0.0 {
        (-error / early_divisor).exp() - 1.0
    } else {
        (error / late_divisor).exp() - 1.0
    }
}

/// Root mean squared error. Zero for empty input.
#[allow(clippy::cast_precision_loss)]
pub fn rmse(predictions: &[f64], true_labels: &[f64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let sse: f64 = predictions
        .iter()
        .zip(true_labels)
        .map(|(p, t)| (p - t).powi(2))
        .sum();
    (sse / predictions.len() as f64).sqrt()
}

/// Mean absolute error. Zero for empty input.
#[allow(clippy::cast_precision_loss)]
pub fn mae(predictions: &[f64], true_labels: &[f64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let sae: f64 = predictions
        .iter()
        .zip(true_labels)
        .map(|(p, t)| (p - t).abs())
        .sum();
    sae / predictions.len() as f64
}

/// Relative sample weights `|true - pred| / max(true, 0.9)`.
pub fn relative_weights(predictions: &[f64], true_labels: &[f64]) -> Vec<f64> {
    predictions
        .iter()
        .zip(true_labels)
        .map(|(p, t)| (t - p).abs() / t.max(defaults::RELATIVE_WEIGHT_FLOOR))
        .collect()
}

/// Weighted mean of `|error|`: `sum(w * |e|) / sum(w)`.
///
/// Zero when every weight is zero (all errors zero under relative weights).
pub fn weighted_mae(predictions: &[f64], true_labels: &[f64], weights: &[f64]) -> f64 {
    weighted_mean(predictions, true_labels, weights, f64::abs)
}

/// Weighted mean of `error²`: `sum(w * e²) / sum(w)`.
pub fn weighted_mse(predictions: &[f64], true_labels: &[f64], weights: &[f64]) -> f64 {
    weighted_mean(predictions, true_labels, weights, |e| e * e)
}

fn weighted_mean(
    predictions: &[f64],
    true_labels: &[f64],
    weights: &[f64],
    loss: impl Fn(f64) -> f64,
) -> f64 {
    let (weighted, total) = predictions
        .iter()
        .zip(true_labels)
        .zip(weights)
        .fold((0.0, 0.0), |(acc, sum_w), ((p, t), w)| {
            (acc + w * loss(t - p), sum_w + w)
        });
    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

// ============================================================================
// Results
// ============================================================================

/// One scored window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub unit_id: UnitId,
    pub end_cycle: u32,
    pub predicted: f64,
    pub actual: f64,
}

/// Metrics of a single unit's windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitScore {
    pub unit_id: UnitId,
    pub count: usize,
    pub rmse: f64,
    pub mae: f64,
    pub score: f64,
    /// Mean of `predicted - true`; positive means the unit is predicted late.
    pub mean_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub rmse: f64,
    pub mae: f64,
    /// Sum of asymmetric penalties.
    pub score: f64,
    pub count: usize,
    pub relative_mae: f64,
    pub relative_mse: f64,
    /// Empty when scored without unit ids.
    #[serde(default)]
    pub per_unit: Vec<UnitScore>,
}

// ============================================================================
// Engine
// ============================================================================

/// Scores predictions with configured divisors and an optional label cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringEngine {
    early_divisor: f64,
    late_divisor: f64,
    max_rul: Option<u32>,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self {
            early_divisor: defaults::EARLY_DIVISOR,
            late_divisor: defaults::LATE_DIVISOR,
            max_rul: None,
        }
    }
}

impl ScoringEngine {
    pub fn new(early_divisor: f64, late_divisor: f64) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("scoring.early_divisor", early_divisor),
            ("scoring.late_divisor", late_divisor),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("must be a finite number > 0 (got {value})"),
                });
            }
        }
        Ok(Self {
            early_divisor,
            late_divisor,
            max_rul: None,
        })
    }

    /// Engine sharing the labeler's cap, so labels above it are rejected.
    pub fn from_config(config: &ScoringConfig, max_rul: u32) -> Result<Self, ConfigError> {
        Ok(Self::new(config.early_divisor, config.late_divisor)?.with_max_rul(max_rul))
    }

    #[must_use]
    pub fn with_max_rul(mut self, max_rul: u32) -> Self {
        self.max_rul = Some(max_rul);
        self
    }

    pub fn penalty(&self, predicted: f64, actual: f64) -> f64 {
        asymmetric_penalty(predicted - actual, self.early_divisor, self.late_divisor)
    }

    pub fn score(&self, predictions: &[f64], true_labels: &[f64]) -> Result<ScoreResult, ScoringError> {
        self.check(predictions, true_labels)?;
        Ok(self.aggregate(predictions, true_labels, Vec::new()))
    }

    /// Score with a per-unit breakdown (units in ascending id order).
    pub fn score_records(&self, records: &[PredictionRecord]) -> Result<ScoreResult, ScoringError> {
        let predictions: Vec<f64> = records.iter().map(|r| r.predicted).collect();
        let labels: Vec<f64> = records.iter().map(|r| r.actual).collect();
        self.check(&predictions, &labels)?;

        let mut by_unit: BTreeMap<&UnitId, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for r in records {
            let entry = by_unit.entry(&r.unit_id).or_default();
            entry.0.push(r.predicted);
            entry.1.push(r.actual);
        }
        let per_unit = by_unit
            .into_iter()
            .map(|(unit, (p, t))| self.unit_score(unit, &p, &t))
            .collect();

        Ok(self.aggregate(&predictions, &labels, per_unit))
    }

    fn check(&self, predictions: &[f64], true_labels: &[f64]) -> Result<(), ScoringError> {
        if predictions.len() != true_labels.len() {
            return Err(ScoringError::LengthMismatch {
                predictions: predictions.len(),
                labels: true_labels.len(),
            });
        }
        if predictions.is_empty() {
            return Err(ScoringError::Empty);
        }
        for (index, (p, t)) in predictions.iter().zip(true_labels).enumerate() {
            if !p.is_finite() || !t.is_finite() {
                return Err(ScoringError::NonFinite { index });
            }
            if let Some(max_rul) = self.max_rul {
                if *t > f64::from(max_rul) {
                    return Err(ScoringError::LabelAboveCap {
                        index,
                        label: *t,
                        max_rul,
                    });
                }
            }
        }
        Ok(())
    }

    fn total_penalty(&self, predictions: &[f64], true_labels: &[f64]) -> f64 {
        predictions
            .iter()
            .zip(true_labels)
            .map(|(p, t)| self.penalty(*p, *t))
            .sum()
    }

    fn aggregate(&self, predictions: &[f64], true_labels: &[f64], per_unit: Vec<UnitScore>) -> ScoreResult {
        let weights = relative_weights(predictions, true_labels);
        ScoreResult {
            rmse: rmse(predictions, true_labels),
            mae: mae(predictions, true_labels),
            score: self.total_penalty(predictions, true_labels),
            count: predictions.len(),
            relative_mae: weighted_mae(predictions, true_labels, &weights),
            relative_mse: weighted_mse(predictions, true_labels, &weights),
            per_unit,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn unit_score(&self, unit: &UnitId, predictions: &[f64], true_labels: &[f64]) -> UnitScore {
        let signed: f64 = predictions.iter().zip(true_labels).map(|(p, t)| p - t).sum();
        UnitScore {
            unit_id: unit.clone(),
            count: predictions.len(),
            rmse: rmse(predictions, true_labels),
            mae: mae(predictions, true_labels),
            score: self.total_penalty(predictions, true_labels),
            mean_error: signed / predictions.len() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_late_and_early_penalties() {
        let engine = ScoringEngine::default();
        let late = engine.penalty(110.0, 100.0);
        let early = engine.penalty(90.0, 100.0);
        assert!((late - (1.0_f64.exp() - 1.0)).abs() < 1e-12);
        assert!((late - 1.718).abs() < 1e-3);
        assert!((early - ((10.0_f64 / 13.0).exp() - 1.0)).abs() < 1e-12);
        assert!((early - 1.158).abs() < 1e-3);
        assert!(late > early);
    }

    #[test]
    fn test_perfect_predictions_score_zero() {
        let y = vec![0.0, 12.5, 80.0, 125.0];
        let result = ScoringEngine::default().score(&y, &y).expect("valid input");
        assert_eq!(result.rmse, 0.0);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.mae, 0.0);
        assert_eq!(result.count, 4);
    }

    #[test]
    fn test_aggregate_is_sum_of_penalties() {
        let engine = ScoringEngine::default();
        let result = engine.score(&[110.0, 90.0], &[100.0, 100.0]).expect("valid input");
        let expected = (1.0_f64.exp() - 1.0) + ((10.0_f64 / 13.0).exp() - 1.0);
        assert!((result.score - expected).abs() < 1e-12);
        assert!((result.rmse - 10.0).abs() < 1e-12);
        assert!((result.mae - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_custom_divisors() {
        let engine = ScoringEngine::new(20.0, 5.0).expect("valid divisors");
        assert!((engine.penalty(105.0, 100.0) - (1.0_f64.exp() - 1.0)).abs() < 1e-12);
        assert!((engine.penalty(80.0, 100.0) - (1.0_f64.exp() - 1.0)).abs() < 1e-12);
        assert!(ScoringEngine::new(0.0, 10.0).is_err());
    }

    #[test]
    fn test_input_errors() {
        let engine = ScoringEngine::default().with_max_rul(125);
        assert_eq!(
            engine.score(&[1.0], &[1.0, 2.0]),
            Err(ScoringError::LengthMismatch { predictions: 1, labels: 2 })
        );
        assert_eq!(engine.score(&[], &[]), Err(ScoringError::Empty));
        assert_eq!(
            engine.score(&[1.0, f64::NAN], &[1.0, 2.0]),
            Err(ScoringError::NonFinite { index: 1 })
        );
        assert!(matches!(
            engine.score(&[1.0], &[130.0]),
            Err(ScoringError::LabelAboveCap { index: 0, max_rul: 125, .. })
        ));
    }

    #[test]
    fn test_relative_metrics_normalize_by_weight_sum() {
        let engine = ScoringEngine::default();
        let result = engine.score(&[110.0, 90.0], &[100.0, 100.0]).expect("scorable");
        assert!((result.relative_mae - 10.0).abs() < 1e-9);
        assert!((result.relative_mse - 100.0).abs() < 1e-9);

        // weights 0.1 and 0.01
        let result = engine.score(&[110.0, 101.0], &[100.0, 100.0]).expect("scorable");
        assert!((result.relative_mae - 1.01 / 0.11).abs() < 1e-9);
        assert!((result.relative_mse - 10.01 / 0.11).abs() < 1e-9);
    }

    #[test]
    fn test_relative_metrics_zero_when_all_weights_zero() {
        let result = ScoringEngine::default()
            .score(&[40.0, 7.0], &[40.0, 7.0])
            .expect("scorable");
        assert_eq!(result.relative_mae, 0.0);
        assert_eq!(result.relative_mse, 0.0);
    }

    #[test]
    fn test_relative_weights_floor() {
        let w = relative_weights(&[1.0, 60.0], &[0.0, 50.0]);
        assert!((w[0] - 1.0 / 0.9).abs() < 1e-12);
        assert!((w[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_per_unit_breakdown() {
        let rec = |u: &str, p: f64, t: f64| PredictionRecord {
            unit_id: UnitId::from(u),
            end_cycle: 0,
            predicted: p,
            actual: t,
        };
        let records = vec![
            rec("b", 12.0, 10.0),
            rec("a", 5.0, 5.0),
            rec("b", 8.0, 10.0),
        ];
        let result = ScoringEngine::default().score_records(&records).expect("valid");
        assert_eq!(result.per_unit.len(), 2);
        assert_eq!(result.per_unit[0].unit_id, UnitId::from("a"));
        assert_eq!(result.per_unit[0].score, 0.0);
        let b = &result.per_unit[1];
        assert_eq!(b.count, 2);
        assert!((b.rmse - 2.0).abs() < 1e-12);
        assert!(b.mean_error.abs() < 1e-12);
        let total: f64 = result.per_unit.iter().map(|u| u.score).sum();
        assert!((total - result.score).abs() < 1e-12);
    }
}
