//! Pipeline Configuration Module
//!
//! Window geometry, labeling cap, split ratios, scaler kind, score divisors,
//! ingestion columns and baseline model hyperparameters, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `RUL_CONFIG` environment variable (path to TOML file)
//! 2. `rul_config.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! The loaded config is handed to
//! [`RulPipeline::new`](crate::pipeline::RulPipeline::new), which validates it
//! before any data is touched.

mod pipeline_config;
pub mod defaults;
pub mod validation;

pub use pipeline_config::*;
