//! Pipeline configuration structs with TOML deserialization.
//!
//! All fields use `#[serde(default)]` so partial TOML files work: any field
//! not specified in the file falls back to the value in [`super::defaults`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::ingest::ImputerStrategy;
use crate::processing::ScalerKind;
use crate::scoring::MaintenanceCostWeights;
use crate::types::Split;

/// Environment variable naming the config file to load.
pub const CONFIG_ENV_VAR: &str = "RUL_CONFIG";

/// Config file searched for in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "rul_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete pipeline configuration.
///
/// Loaded from TOML at startup. Every section can be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub labeling: LabelingConfig,

    #[serde(default)]
    pub split: SplitConfig,

    #[serde(default)]
    pub scaler: ScalerConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub preprocessing: PreprocessingConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$RUL_CONFIG` env var
    /// 2. `./rul_config.toml`
    /// 3. Built-in defaults
    ///
    /// Defaults are used only when no file is found. A file that exists but
    /// fails to parse or validate is an error, as is a `$RUL_CONFIG` that
    /// names a missing file.
    pub fn load() -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        Self::load_from_search_path(env_path.as_deref(), Path::new(LOCAL_CONFIG_FILE))
    }

    fn load_from_search_path(env_path: Option<&Path>, local: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = env_path {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded pipeline config from RUL_CONFIG");
            return Ok(config);
        }

        if local.exists() {
            let config = Self::load_from_file(local)?;
            info!(path = %local.display(), "Loaded pipeline config");
            return Ok(config);
        }

        info!("No rul_config.toml found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document, warning on unknown keys. Does not validate.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        // Two-pass: unknown keys are warnings, never failures
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        toml::from_str(contents)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Pipeline config saved");
        Ok(())
    }

    /// Validate every section, collecting all violations.
    ///
    /// Rules:
    /// - Window length, stride and RUL cap must be > 0
    /// - Split ratios must be finite, non-negative and sum to 1
    /// - Score divisors and learning rate must be finite and positive
    /// - Column names must be non-empty and unique
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.window.sequence_length == 0 {
            errors.push("window.sequence_length must be > 0".to_string());
        }
        if self.window.stride == 0 {
            errors.push("window.stride must be > 0".to_string());
        }
        if self.labeling.max_rul == 0 {
            errors.push("labeling.max_rul must be > 0".to_string());
        }

        if let Err(e) = crate::split::SplitRatios::new(
            self.split.train,
            self.split.validation,
            self.split.test,
        ) {
            errors.push(format!("split: {e}"));
        }

        check_positive(self.scoring.early_divisor, "scoring.early_divisor", &mut errors);
        check_positive(self.scoring.late_divisor, "scoring.late_divisor", &mut errors);
        if self.scoring.histogram_bins == 0 {
            errors.push("scoring.histogram_bins must be > 0".to_string());
        }
        if self.scoring.fault_horizon_steps == 0 {
            errors.push("scoring.fault_horizon_steps must be > 0".to_string());
        }
        for (value, name) in [
            (self.scoring.unexpected_break_weight, "scoring.unexpected_break_weight"),
            (self.scoring.unexploited_lifetime_weight, "scoring.unexploited_lifetime_weight"),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!("{name} must be a finite number >= 0 (got {value})"));
            }
        }

        let ing = &self.ingestion;
        if ing.min_samples == 0 {
            errors.push("ingestion.min_samples must be >= 1".to_string());
        }
        if ing.sensor_columns.is_empty() {
            errors.push("ingestion.sensor_columns must name at least one sensor".to_string());
        }
        let mut seen = HashSet::new();
        for name in std::iter::once(&ing.unit_column)
            .chain(std::iter::once(&ing.cycle_column))
            .chain(ing.operating_columns.iter())
            .chain(ing.sensor_columns.iter())
        {
            if name.trim().is_empty() {
                errors.push("ingestion: column names must be non-empty".to_string());
            } else if !seen.insert(name.as_str()) {
                errors.push(format!("ingestion: column '{name}' listed more than once"));
            }
        }

        if self.preprocessing.imputer.is_rolling() && self.preprocessing.rolling_window == 0 {
            errors.push("preprocessing.rolling_window must be > 0 for rolling imputers".to_string());
        }

        check_positive(self.model.learning_rate, "model.learning_rate", &mut errors);
        if !(self.model.lr_decay > 0.0 && self.model.lr_decay <= 1.0) {
            errors.push(format!(
                "model.lr_decay must be in (0, 1] (got {})",
                self.model.lr_decay
            ));
        }
        if !self.model.lr_floor.is_finite() || self.model.lr_floor < 0.0 {
            errors.push(format!("model.lr_floor must be >= 0 (got {})", self.model.lr_floor));
        }
        if self.model.batch_size == 0 {
            errors.push("model.batch_size must be > 0".to_string());
        }
        if self.model.epochs == 0 {
            errors.push("model.epochs must be > 0".to_string());
        }

        for w in super::validation::suspicious_settings(self) {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
    // NaN comparisons silently pass, so test finiteness explicitly
    if !value.is_finite() || value <= 0.0 {
        errors.push(format!("{name} must be a finite number > 0 (got {value})"));
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("config serialization error: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("split ratios must be finite, non-negative and sum to 1 (got train={train}, validation={validation}, test={test})")]
    InvalidRatios {
        train: f64,
        validation: f64,
        test: f64,
    },

    #[error("{split} split would receive zero of {units} units")]
    EmptySplit { split: Split, units: usize },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("scaler fitting set is empty")]
    EmptyFittingSet,

    #[error("feature '{feature}' has zero variance in the fitting set")]
    ZeroVariance { feature: String },

    #[error("feature '{feature}' has non-finite values in the fitting set")]
    NonFiniteFeature { feature: String },
}

// ============================================================================
// Sections
// ============================================================================

/// Sliding-window geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,

    #[serde(default = "default_stride")]
    pub stride: usize,
}

fn default_sequence_length() -> usize {
    defaults::SEQUENCE_LENGTH
}
fn default_stride() -> usize {
    defaults::STRIDE
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            sequence_length: default_sequence_length(),
            stride: default_stride(),
        }
    }
}

/// Piecewise RUL labeling. `max_rul` also bounds the scorer's true labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelingConfig {
    #[serde(default = "default_max_rul")]
    pub max_rul: u32,
}

fn default_max_rul() -> u32 {
    defaults::MAX_RUL
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            max_rul: default_max_rul(),
        }
    }
}

/// Unit-level train/validation/test partitioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default = "default_train_ratio")]
    pub train: f64,

    #[serde(default = "default_validation_ratio")]
    pub validation: f64,

    #[serde(default = "default_test_ratio")]
    pub test: f64,

    #[serde(default = "default_split_seed")]
    pub seed: u64,
}

fn default_train_ratio() -> f64 {
    defaults::TRAIN_RATIO
}
fn default_validation_ratio() -> f64 {
    defaults::VALIDATION_RATIO
}
fn default_test_ratio() -> f64 {
    defaults::TEST_RATIO
}
fn default_split_seed() -> u64 {
    defaults::SPLIT_SEED
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train: default_train_ratio(),
            validation: default_validation_ratio(),
            test: default_test_ratio(),
            seed: default_split_seed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScalerConfig {
    #[serde(default)]
    pub kind: ScalerKind,
}

/// Asymmetric score divisors and supplementary metric settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Divisor for early predictions (predicted < true).
    #[serde(default = "default_early_divisor")]
    pub early_divisor: f64,

    /// Divisor for late predictions (predicted >= true).
    #[serde(default = "default_late_divisor")]
    pub late_divisor: f64,

    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,

    #[serde(default = "default_fault_horizon_max")]
    pub fault_horizon_max: u32,

    #[serde(default = "default_fault_horizon_steps")]
    pub fault_horizon_steps: usize,

    /// q1 of the combined maintenance cost J.
    #[serde(default = "default_cost_weight")]
    pub unexpected_break_weight: f64,

    /// q2 of the combined maintenance cost J.
    #[serde(default = "default_cost_weight")]
    pub unexploited_lifetime_weight: f64,
}

impl ScoringConfig {
    pub fn cost_weights(&self) -> MaintenanceCostWeights {
        MaintenanceCostWeights {
            unexpected_break: self.unexpected_break_weight,
            unexploited_lifetime: self.unexploited_lifetime_weight,
        }
    }
}

fn default_early_divisor() -> f64 {
    defaults::EARLY_DIVISOR
}
fn default_late_divisor() -> f64 {
    defaults::LATE_DIVISOR
}
fn default_histogram_bins() -> usize {
    defaults::HISTOGRAM_BINS
}
fn default_fault_horizon_max() -> u32 {
    defaults::FAULT_HORIZON_MAX
}
fn default_fault_horizon_steps() -> usize {
    defaults::FAULT_HORIZON_STEPS
}
fn default_cost_weight() -> f64 {
    defaults::MAINTENANCE_COST_WEIGHT
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            early_divisor: default_early_divisor(),
            late_divisor: default_late_divisor(),
            histogram_bins: default_histogram_bins(),
            fault_horizon_max: default_fault_horizon_max(),
            fault_horizon_steps: default_fault_horizon_steps(),
            unexpected_break_weight: default_cost_weight(),
            unexploited_lifetime_weight: default_cost_weight(),
        }
    }
}

/// Column layout of tabular input.
///
/// Operating-condition columns become the leading features, sensors follow.
/// The C-MAPSS reader names its positional columns `setting_1..3` and
/// `s_1..s_21`, so the defaults select every column of that layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_unit_column")]
    pub unit_column: String,

    #[serde(default = "default_cycle_column")]
    pub cycle_column: String,

    #[serde(default = "default_operating_columns")]
    pub operating_columns: Vec<String>,

    #[serde(default = "default_sensor_columns")]
    pub sensor_columns: Vec<String>,

    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

fn default_unit_column() -> String {
    defaults::UNIT_COLUMN.to_string()
}
fn default_cycle_column() -> String {
    defaults::CYCLE_COLUMN.to_string()
}
pub(crate) fn default_operating_columns() -> Vec<String> {
    (1..=defaults::CMAPSS_OPERATING_COLUMNS)
        .map(|i| format!("setting_{i}"))
        .collect()
}
pub(crate) fn default_sensor_columns() -> Vec<String> {
    (1..=defaults::CMAPSS_SENSOR_COLUMNS)
        .map(|i| format!("s_{i}"))
        .collect()
}
fn default_min_samples() -> usize {
    defaults::MIN_SAMPLES
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            unit_column: default_unit_column(),
            cycle_column: default_cycle_column(),
            operating_columns: default_operating_columns(),
            sensor_columns: default_sensor_columns(),
            min_samples: default_min_samples(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Repair NaN / ±inf readings with train-fitted statistics.
    #[serde(default = "default_true")]
    pub impute: bool,

    #[serde(default)]
    pub imputer: ImputerStrategy,

    /// Neighbourhood half-width (rows) of the rolling imputers.
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
}

fn default_true() -> bool {
    true
}
fn default_rolling_window() -> usize {
    defaults::ROLLING_IMPUTER_WINDOW
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            impute: true,
            imputer: ImputerStrategy::default(),
            rolling_window: default_rolling_window(),
        }
    }
}

/// Hyperparameters of the linear baseline model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Multiplicative learning-rate decay applied after every step.
    #[serde(default = "default_lr_decay")]
    pub lr_decay: f64,

    #[serde(default = "default_lr_floor")]
    pub lr_floor: f64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_model_seed")]
    pub seed: u64,
}

fn default_epochs() -> usize {
    defaults::EPOCHS
}
fn default_learning_rate() -> f64 {
    defaults::LEARNING_RATE
}
fn default_lr_decay() -> f64 {
    defaults::LR_DECAY
}
fn default_lr_floor() -> f64 {
    defaults::LR_FLOOR
}
fn default_batch_size() -> usize {
    defaults::BATCH_SIZE
}
fn default_model_seed() -> u64 {
    defaults::MODEL_SEED
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            lr_decay: default_lr_decay(),
            lr_floor: default_lr_floor(),
            batch_size: default_batch_size(),
            seed: default_model_seed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Also persist the scaled window tensors of every split.
    #[serde(default)]
    pub save_tensors: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(defaults::OUTPUT_DIR)
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            save_tensors: false,
        }
    }
}
