//! Run-to-failure trajectories and the fixed feature schema they share.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::ingest::IngestionError;

// ============================================================================
// Unit Identifier
// ============================================================================

/// Identifier of one monitored unit (engine, bearing, pump, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u32> for UnitId {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

// ============================================================================
// Feature Schema
// ============================================================================

/// Whether a column is an operating-condition setting or a sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    OperatingCondition,
    Sensor,
}

/// One positional feature column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub kind: FeatureKind,
}

/// Fixed, ordered feature layout established at ingestion.
///
/// Operating-condition columns come first, then sensors. Every trajectory of a
/// store shares one schema, so windows are plain positional tensors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    pub fn new<S: AsRef<str>>(operating_conditions: &[S], sensors: &[S]) -> Self {
        let columns = operating_conditions
            .iter()
            .map(|n| FeatureColumn {
                name: n.as_ref().to_string(),
                kind: FeatureKind::OperatingCondition,
            })
            .chain(sensors.iter().map(|n| FeatureColumn {
                name: n.as_ref().to_string(),
                kind: FeatureKind::Sensor,
            }))
            .collect();
        Self { columns }
    }

    /// Schema made only of sensor columns.
    pub fn sensors_only<S: AsRef<str>>(sensors: &[S]) -> Self {
        Self::new::<S>(&[], sensors)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn sensor_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.kind == FeatureKind::Sensor)
            .count()
    }
}

// ============================================================================
// Trajectory
// ============================================================================

/// Full run-to-failure recording of one unit.
///
/// Values are stored row-major (`len × feature_count`) so that any window is a
/// contiguous slice. The last cycle is the failure cycle. There is no mutating
/// API: once built, a trajectory never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    unit_id: UnitId,
    schema: Arc<FeatureSchema>,
    cycles: Vec<u32>,
    values: Vec<f64>,
}

impl Trajectory {
    /// Build a trajectory, checking shape and strict cycle monotonicity.
    pub fn new(
        unit_id: UnitId,
        schema: Arc<FeatureSchema>,
        cycles: Vec<u32>,
        values: Vec<f64>,
    ) -> Result<Self, IngestionError> {
        if cycles.is_empty() {
            return Err(IngestionError::TooShort {
                unit_id,
                samples: 0,
                minimum: 1,
            });
        }
        if values.len() != cycles.len() * schema.len() {
            return Err(IngestionError::ShapeMismatch {
                unit_id,
                rows: cycles.len(),
                features: schema.len(),
                values: values.len(),
            });
        }
        if let Some(row) = cycles.windows(2).position(|w| w[1] <= w[0]) {
            return Err(IngestionError::NonMonotonicCycles {
                unit_id,
                row: row + 1,
                previous: cycles[row],
                current: cycles[row + 1],
            });
        }
        Ok(Self {
            unit_id,
            schema,
            cycles,
            values,
        })
    }

    pub fn unit_id(&self) -> &UnitId {
        &self.unit_id
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub(crate) fn shared_schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    /// Number of samples (cycles) recorded.
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.schema.len()
    }

    pub fn cycles(&self) -> &[u32] {
        &self.cycles
    }

    /// Row-major readings, `len() * feature_count()` values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Cycle at which the unit failed (the last recorded cycle).
    pub fn failure_cycle(&self) -> u32 {
        self.cycles.last().copied().unwrap_or_default()
    }

    /// Readings of one sample, in schema order.
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        let f = self.feature_count();
        self.values.get(index * f..(index + 1) * f)
    }

    /// Single reading addressed by sample index and column name.
    pub fn reading(&self, index: usize, column: &str) -> Option<f64> {
        let col = self.schema.index_of(column)?;
        self.row(index).map(|r| r[col])
    }

    /// True when any reading is NaN or infinite.
    pub fn has_non_finite(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    /// Same unit and cycles with replacement readings (used by the imputer).
    pub(crate) fn with_values(&self, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), self.values.len());
        Self {
            unit_id: self.unit_id.clone(),
            schema: Arc::clone(&self.schema),
            cycles: self.cycles.clone(),
            values,
        }
    }
}
