//! Window processing
//!
//! Turns trajectories into model-ready tensors:
//! - `windowing`: lazy sliding windows per trajectory
//! - `labeling`: piecewise RUL targets and tensor materialization
//! - `scaler`: train-fitted per-feature normalization
//! - `batcher`: fixed-size mini-batches over a tensor

mod batcher;
mod labeling;
mod scaler;
mod windowing;

pub use batcher::{Batch, Batcher};
pub use labeling::{piecewise_rul, RulLabeler};
pub use scaler::{FeatureScaler, ScalerKind, ScalerState};
pub use windowing::{WindowGenerator, Windows};
