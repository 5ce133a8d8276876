//! rul-pipeline: Remaining Useful Life estimation data pipeline
//!
//! Turns run-to-failure sensor recordings into model-ready windows and scores
//! RUL predictions.
//!
//! ## Architecture
//!
//! - **Ingestion**: trajectories per unit from CSV or C-MAPSS text, with
//!   train-fitted imputation of missing readings
//! - **Splitting**: seeded unit-level train/validation/test partition, never
//!   splitting a unit
//! - **Processing**: sliding windows, piecewise RUL labels, train-fitted
//!   scaling, mini-batching
//! - **Scoring**: RMSE, MAE, the asymmetric RUL score, maintenance-horizon
//!   outcomes and an error histogram
//! - **Model boundary**: [`model::RulModel`] plus a linear baseline

pub mod config;
pub mod ingest;
pub mod model;
pub mod pipeline;
pub mod processing;
pub mod report;
pub mod scoring;
pub mod split;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, PipelineConfig};

// Re-export core types
pub use types::{FeatureSchema, Split, SplitAssignment, Trajectory, UnitId, Window, WindowTensor};

// Re-export pipeline stages
pub use ingest::{DataSource, Imputer, ImputerState, ImputerStrategy, IngestionError, TrajectoryStore};
pub use processing::{Batcher, FeatureScaler, RulLabeler, ScalerKind, ScalerState, WindowGenerator};
pub use split::{check_leakage, DatasetSplitter, LeakageViolation, SplitRatios};

// Re-export scoring and models
pub use model::{LinearRulModel, RulModel};
pub use pipeline::{PartialExclusion, PipelineError, PreparedDataset, RulPipeline};
pub use report::{EvaluationReport, ReportError};
pub use scoring::{ScoreResult, ScoringEngine, ScoringError};
