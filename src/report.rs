//! Evaluation report and tensor persistence.
//!
//! Everything is written as JSON with an atomic temp-file-then-rename, so a
//! crash mid-write never leaves a truncated report behind.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::{defaults, PipelineConfig};
use crate::ingest::ImputerState;
use crate::pipeline::{PartialExclusion, PreparedDataset, SplitSizes};
use crate::processing::ScalerState;
use crate::scoring::{ErrorHistogram, HorizonPoint, ScoreResult};
use crate::types::{Split, WindowTensor};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O error ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report JSON error ({}): {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Scores of one held-out split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitEvaluation {
    pub score: ScoreResult,
    pub histogram: ErrorHistogram,
    /// Maintenance outcomes over the configured fault horizons.
    pub horizons: Vec<HorizonPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub generated_at: DateTime<Utc>,
    pub config: PipelineConfig,
    pub split_sizes: SplitSizes,
    pub exclusions: Vec<PartialExclusion>,
    pub imputer: Option<ImputerState>,
    pub scaler: ScalerState,
    /// `None` when the split had no windows.
    pub validation: Option<SplitEvaluation>,
    pub test: Option<SplitEvaluation>,
}

impl EvaluationReport {
    pub fn new(
        config: PipelineConfig,
        prepared: &PreparedDataset,
        validation: Option<SplitEvaluation>,
        test: Option<SplitEvaluation>,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            config,
            split_sizes: prepared.sizes(),
            exclusions: prepared.exclusions.clone(),
            imputer: prepared.imputer.clone(),
            scaler: prepared.scaler.clone(),
            validation,
            test,
        }
    }

    pub fn evaluation(&self, split: Split) -> Option<&SplitEvaluation> {
        match split {
            Split::Train => None,
            Split::Validation => self.validation.as_ref(),
            Split::Test => self.test.as_ref(),
        }
    }

    /// Write the report into `dir` and return its path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        let path = dir.join(defaults::REPORT_FILE);
        save_json(self, &path)?;
        info!(path = %path.display(), "Evaluation report saved");
        Ok(path)
    }
}

pub fn load_report(path: &Path) -> Result<EvaluationReport, ReportError> {
    load_json(path)
}

/// Write one split's scaled windows to `dir/<split>_windows.json`.
pub fn save_tensor(tensor: &WindowTensor, split: Split, dir: &Path) -> Result<PathBuf, ReportError> {
    let path = dir.join(format!("{split}_windows.json"));
    save_json(tensor, &path)?;
    info!(path = %path.display(), split = %split, windows = tensor.count(), "Window tensor saved");
    Ok(path)
}

pub fn load_tensor(path: &Path) -> Result<WindowTensor, ReportError> {
    load_json(path)
}

/// Pretty JSON written to `<path>.json.tmp` then renamed over `path`.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_vec_pretty(value).map_err(|source| ReportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp_path = path.with_extension("json.tmp");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(&tmp_path, &json).map_err(io_err)?;
    std::fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ReportError> {
    let data = std::fs::read(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| ReportError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnitId;

    #[test]
    fn test_tensor_disk_persistence() {
        let mut tensor = WindowTensor::new(2, 1);
        tensor.data.extend([0.5, -0.5]);
        tensor.labels.push(12.0);
        tensor.unit_ids.push(UnitId::from(4));
        tensor.end_cycles.push(9);

        let dir = tempfile::tempdir().expect("tmpdir");
        let path = save_tensor(&tensor, Split::Test, &dir.path().join("nested")).expect("save");
        assert!(path.ends_with("test_windows.json"));
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = load_tensor(&path).expect("load");
        assert_eq!(loaded, tensor);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let err = load_report(&dir.path().join("absent.json")).expect_err("missing");
        assert!(matches!(err, ReportError::Io { .. }));
    }

    #[test]
    fn test_garbage_is_json_error() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{not json").expect("write");
        assert!(matches!(load_report(&path), Err(ReportError::Json { .. })));
    }
}
