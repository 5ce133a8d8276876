//! Trajectory ingestion
//!
//! Loads run-to-failure recordings into an immutable [`TrajectoryStore`].
//!
//! ## Sources
//!
//! - `Table`: one CSV file with a header and a unit-id column
//! - `Directory`: one CSV file per unit, unit id taken from the file stem
//! - `Cmapss`: NASA C-MAPSS whitespace-separated text (`unit cycle setting_1..3 s_1..s_21`)
//!
//! Empty cells and `nan` parse as NaN, `inf` / `-inf` as infinities. Both are
//! left for the [`Imputer`] to repair. Anything else non-numeric fails the load.

mod cmapss;
mod imputer;
mod store;

pub use imputer::{Imputer, ImputerState, ImputerStrategy};
pub use store::TrajectoryStore;

use std::path::PathBuf;
use thiserror::Error;

use crate::types::UnitId;

/// Where raw trajectories come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Table(PathBuf),
    Directory(PathBuf),
    Cmapss(PathBuf),
}

impl DataSource {
    pub fn path(&self) -> &std::path::Path {
        match self {
            DataSource::Table(p) | DataSource::Directory(p) | DataSource::Cmapss(p) => p,
        }
    }
}

/// Malformed, missing or non-monotonic trajectory data. Always fatal.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("required column '{column}' missing from {}", path.display())]
    MissingColumn { column: String, path: PathBuf },

    #[error("{}:{line}: column '{column}' has invalid value '{value}'", path.display())]
    InvalidValue {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },

    #[error("{}:{line}: expected {expected} fields, found {found}", path.display())]
    RaggedRow {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("unit {unit_id} has {samples} samples, minimum is {minimum}")]
    TooShort {
        unit_id: UnitId,
        samples: usize,
        minimum: usize,
    },

    #[error("unit {unit_id}: cycle {current} at row {row} does not increase on previous cycle {previous}")]
    NonMonotonicCycles {
        unit_id: UnitId,
        row: usize,
        previous: u32,
        current: u32,
    },

    #[error("unit {unit_id} appears in more than one source file")]
    DuplicateUnit { unit_id: UnitId },

    #[error("unit {unit_id}: {values} values do not fill {rows} rows of {features} features")]
    ShapeMismatch {
        unit_id: UnitId,
        rows: usize,
        features: usize,
        values: usize,
    },

    #[error("unit {unit_id} does not share the store's feature schema")]
    SchemaMismatch { unit_id: UnitId },

    #[error("no trajectories found in {}", path.display())]
    Empty { path: PathBuf },
}
