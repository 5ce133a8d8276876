//! Repair of missing and infinite readings.
//!
//! Statistics are fitted on training trajectories only. Every strategy falls
//! back to the feature's training mean when it has nothing better, and a
//! feature with no finite training reading falls back to 0.0.
//!
//! ## Strategies
//!
//! | Strategy         | Non-finite reading becomes                                   |
//! |------------------|--------------------------------------------------------------|
//! | `median`         | `+inf` → train max, `-inf` → train min, NaN → train median   |
//! | `mean`           | train mean                                                   |
//! | `forward_fill`   | last finite reading of the same unit                         |
//! | `rolling_median` | median of the finite readings within `rolling_window` rows   |
//! | `rolling_mean`   | mean of the finite readings within `rolling_window` rows     |

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use tracing::debug;

use super::IngestionError;
use crate::config::{defaults, ConfigError, PreprocessingConfig};
use crate::types::Trajectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputerStrategy {
    #[default]
    Median,
    Mean,
    ForwardFill,
    RollingMedian,
    RollingMean,
}

impl ImputerStrategy {
    pub fn is_rolling(self) -> bool {
        matches!(self, Self::RollingMedian | Self::RollingMean)
    }
}

// ============================================================================
// Fitting
// ============================================================================

/// Fits [`ImputerState`] from training trajectories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Imputer {
    strategy: ImputerStrategy,
    rolling_window: usize,
}

impl Default for Imputer {
    fn default() -> Self {
        Self {
            strategy: ImputerStrategy::default(),
            rolling_window: defaults::ROLLING_IMPUTER_WINDOW,
        }
    }
}

impl Imputer {
    /// `rolling_window` is the neighbourhood half-width, in rows, of the
    /// rolling strategies.
    pub fn new(strategy: ImputerStrategy, rolling_window: usize) -> Result<Self, ConfigError> {
        if strategy.is_rolling() && rolling_window == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "preprocessing.rolling_window",
                reason: "must be > 0 for rolling imputers".to_string(),
            });
        }
        Ok(Self {
            strategy,
            rolling_window,
        })
    }

    pub fn from_config(config: &PreprocessingConfig) -> Result<Self, ConfigError> {
        Self::new(config.imputer, config.rolling_window)
    }

    pub fn strategy(&self) -> ImputerStrategy {
        self.strategy
    }

    pub fn fit<'a>(
        &self,
        trajectories: impl IntoIterator<Item = &'a Trajectory>,
    ) -> Result<ImputerState, ConfigError> {
        let mut iter = trajectories.into_iter().peekable();
        let first = iter.peek().ok_or(ConfigError::EmptyFittingSet)?;
        let features: Vec<String> = first.schema().names().map(str::to_string).collect();
        let n = features.len();

        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); n];
        for t in iter {
            for row in t.values().chunks_exact(n.max(1)) {
                for (col, &v) in columns.iter_mut().zip(row) {
                    if v.is_finite() {
                        col.push(v);
                    }
                }
            }
        }

        let mut state = ImputerState {
            strategy: self.strategy,
            rolling_window: self.rolling_window,
            features,
            min: Vec::with_capacity(n),
            max: Vec::with_capacity(n),
            median: Vec::with_capacity(n),
            mean: Vec::with_capacity(n),
        };
        for col in columns {
            if col.is_empty() {
                state.min.push(0.0);
                state.max.push(0.0);
                state.median.push(0.0);
                state.mean.push(0.0);
                continue;
            }
            state.min.push(col.iter().copied().fold(f64::INFINITY, f64::min));
            state.max.push(col.iter().copied().fold(f64::NEG_INFINITY, f64::max));
            state.mean.push(col.iter().mean());
            state.median.push(Data::new(col).median());
        }
        debug!(strategy = ?self.strategy, features = n, "Imputer fitted");
        Ok(state)
    }
}

// ============================================================================
// Frozen State
// ============================================================================

/// Frozen repair statistics, one entry per schema column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputerState {
    pub strategy: ImputerStrategy,
    pub rolling_window: usize,
    pub features: Vec<String>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub median: Vec<f64>,
    pub mean: Vec<f64>,
}

impl ImputerState {
    /// Per-column replacement under the `median` rule.
    fn per_column(&self, col: usize, value: f64) -> f64 {
        if value.is_nan() {
            self.median[col]
        } else if value == f64::INFINITY {
            self.max[col]
        } else {
            self.min[col]
        }
    }

    /// Aggregate of the finite readings of column `col` in rows
    /// `[row - w, row + w]`, or `None` if there are none.
    fn rolling(&self, values: &[f64], n: usize, row: usize, col: usize) -> Option<f64> {
        let rows = values.len() / n;
        let lo = row.saturating_sub(self.rolling_window);
        let hi = (row + self.rolling_window + 1).min(rows);
        let neighbours: Vec<f64> = (lo..hi)
            .map(|r| values[r * n + col])
            .filter(|v| v.is_finite())
            .collect();
        if neighbours.is_empty() {
            return None;
        }
        Some(match self.strategy {
            ImputerStrategy::RollingMedian => Data::new(neighbours).median(),
            _ => neighbours.iter().mean(),
        })
    }

    /// New trajectory with every non-finite reading repaired.
    pub fn transform(&self, trajectory: &Trajectory) -> Result<Trajectory, IngestionError> {
        let n = self.features.len();
        if trajectory.feature_count() != n
            || !trajectory.schema().names().eq(self.features.iter().map(String::as_str))
        {
            return Err(IngestionError::SchemaMismatch {
                unit_id: trajectory.unit_id().clone(),
            });
        }

        let original = trajectory.values();
        let mut values = original.to_vec();
        let mut last_finite: Vec<Option<f64>> = vec![None; n];
        let mut repaired = 0usize;
        for (i, v) in values.iter_mut().enumerate() {
            let col = i % n;
            if v.is_finite() {
                last_finite[col] = Some(*v);
                continue;
            }
            repaired += 1;
            *v = match self.strategy {
                ImputerStrategy::Median => self.per_column(col, *v),
                ImputerStrategy::Mean => self.mean[col],
                ImputerStrategy::ForwardFill => last_finite[col].unwrap_or(self.mean[col]),
                ImputerStrategy::RollingMedian | ImputerStrategy::RollingMean => self
                    .rolling(original, n, i / n, col)
                    .unwrap_or(self.mean[col]),
            };
        }

        if repaired > 0 {
            debug!(unit = %trajectory.unit_id(), strategy = ?self.strategy, repaired, "Imputed non-finite readings");
        }
        Ok(trajectory.with_values(values))
    }
}
