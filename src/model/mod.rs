//! Model boundary
//!
//! The pipeline hands a model fully prepared window tensors and expects one
//! scalar RUL prediction per window back. What happens in between is the
//! model's business: [`RulModel`] is the whole contract.
//!
//! ## Contract
//!
//! - `train(windows, labels)` consumes a `(count, sequence_length,
//!   feature_count)` tensor and `count` labels and returns an opaque handle.
//! - `predict(handle, windows)` returns exactly `windows.count()` values.
//!   The pipeline checks the length and reports a mismatch as an error.
//! - Errors are returned unchanged; the pipeline boxes them without
//!   inspecting them.
//!
//! [`LinearRulModel`] is a baseline regressor over the flattened window,
//! enough to run the pipeline end to end without an external framework.

mod adam;
mod linear;

pub use adam::AdamOptimizer;
pub use linear::{LinearModelHandle, LinearRulModel, ModelError};

use crate::types::WindowTensor;

/// A regressor that maps windows to RUL.
pub trait RulModel {
    /// Trained state returned by [`RulModel::train`].
    type Handle;
    type Error: std::error::Error + Send + Sync + 'static;

    fn train(&self, windows: &WindowTensor, labels: &[f64]) -> Result<Self::Handle, Self::Error>;

    fn predict(&self, handle: &Self::Handle, windows: &WindowTensor) -> Result<Vec<f64>, Self::Error>;
}
