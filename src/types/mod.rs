//! Shared data structures for the RUL pipeline
//!
//! This module defines the core types that flow between pipeline stages:
//! - Ingestion: UnitId, FeatureSchema, Trajectory
//! - Partitioning: Split, SplitAssignment
//! - Windowing: Window (borrowed view), WindowTensor (materialized split)

mod split;
mod tensor;
mod trajectory;
mod window;

pub use split::*;
pub use tensor::*;
pub use trajectory::*;
pub use window::*;
