//! Pipeline orchestration
//!
//! ```text
//! TrajectoryStore → DatasetSplitter → Imputer → WindowGenerator → RulLabeler
//!     → FeatureScaler → RulModel → ScoringEngine → EvaluationReport
//! ```
//!
//! [`RulPipeline::prepare`] turns a store into scaled, labeled, leakage-free
//! window tensors; [`RulPipeline::evaluate`] hands them to a model and scores
//! the result. Every fitted statistic (imputer, scaler) sees train units only.

mod coordinator;
mod state;

pub use coordinator::RulPipeline;
pub use state::{PartialExclusion, PipelineError, PreparedDataset, SplitSize, SplitSizes};
