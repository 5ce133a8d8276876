//! Pipeline state types: prepared splits, exclusions and errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::ingest::{ImputerState, IngestionError};
use crate::processing::ScalerState;
use crate::report::ReportError;
use crate::scoring::ScoringError;
use crate::split::LeakageViolation;
use crate::types::{Split, SplitAssignment, UnitId, WindowTensor};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error("leakage detected: {0}")]
    Leakage(#[from] LeakageViolation),

    #[error("scoring failed: {0}")]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Report(#[from] ReportError),

    /// Failure inside the model, passed through untouched.
    #[error("model failed: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{split} split has no windows after excluding short trajectories")]
    EmptySplit { split: Split },

    #[error("model returned {found} predictions for {expected} {split} windows")]
    PredictionCount {
        split: Split,
        expected: usize,
        found: usize,
    },
}

impl PipelineError {
    pub fn model(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Model(Box::new(err))
    }
}

// ============================================================================
// Exclusions
// ============================================================================

/// A unit too short to yield a single window. It stays in its split's
/// assignment but contributes no windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialExclusion {
    pub unit_id: UnitId,
    pub split: Split,
    pub length: usize,
    pub sequence_length: usize,
}

// ============================================================================
// Prepared Dataset
// ============================================================================

/// Units and windows of one split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSize {
    pub units: usize,
    pub windows: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSizes {
    pub train: SplitSize,
    pub validation: SplitSize,
    pub test: SplitSize,
}

/// Everything the model needs, scaled and ready. Produced by
/// [`super::RulPipeline::prepare`].
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub assignment: SplitAssignment,
    pub imputer: Option<ImputerState>,
    pub scaler: ScalerState,
    pub train: WindowTensor,
    pub validation: WindowTensor,
    pub test: WindowTensor,
    pub exclusions: Vec<PartialExclusion>,
}

impl PreparedDataset {
    pub fn tensor(&self, split: Split) -> &WindowTensor {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.validation,
            Split::Test => &self.test,
        }
    }

    pub fn sizes(&self) -> SplitSizes {
        let size = |split| SplitSize {
            units: self.assignment.count(split),
            windows: self.tensor(split).count(),
        };
        SplitSizes {
            train: size(Split::Train),
            validation: size(Split::Validation),
            test: size(Split::Test),
        }
    }

    pub fn exclusions_in(&self, split: Split) -> impl Iterator<Item = &PartialExclusion> {
        self.exclusions.iter().filter(move |e| e.split == split)
    }
}
