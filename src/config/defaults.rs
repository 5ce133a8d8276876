//! Pipeline-wide default constants.
//!
//! Centralises the numbers that configuration sections fall back to.
//! Grouped by pipeline stage for easy discovery.

// ============================================================================
// Windowing & Labeling
// ============================================================================

/// Samples per window.
pub const SEQUENCE_LENGTH: usize = 30;

/// Rows between the end of consecutive windows.
pub const STRIDE: usize = 1;

/// Piecewise RUL cap shared by the labeler and the scorer (cycles).
///
/// 125 is the customary C-MAPSS knee point.
pub const MAX_RUL: u32 = 125;

// ============================================================================
// Splitting
// ============================================================================

pub const TRAIN_RATIO: f64 = 0.7;
pub const VALIDATION_RATIO: f64 = 0.15;
pub const TEST_RATIO: f64 = 0.15;
pub const SPLIT_SEED: u64 = 42;

/// Allowed deviation of the ratio sum from 1.0.
pub const RATIO_SUM_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Scoring
// ============================================================================

/// Divisor applied to early predictions (predicted < true).
pub const EARLY_DIVISOR: f64 = 13.0;

/// Divisor applied to late predictions (predicted >= true).
pub const LATE_DIVISOR: f64 = 10.0;

/// Equal-width true-RUL bins in the error histogram.
pub const HISTOGRAM_BINS: usize = 5;

/// Largest fault horizon (cycles) in the maintenance-point sweep.
pub const FAULT_HORIZON_MAX: u32 = 40;

/// Horizons evaluated between 0 and `FAULT_HORIZON_MAX` inclusive.
pub const FAULT_HORIZON_STEPS: usize = 5;

/// Default q1 and q2 of the combined maintenance cost J.
pub const MAINTENANCE_COST_WEIGHT: f64 = 1.0;

/// Floor on the true RUL when computing relative sample weights.
pub const RELATIVE_WEIGHT_FLOOR: f64 = 0.9;

// ============================================================================
// Ingestion
// ============================================================================

pub const UNIT_COLUMN: &str = "unit";
pub const CYCLE_COLUMN: &str = "cycle";

/// Operating-condition columns of the C-MAPSS layout.
pub const CMAPSS_OPERATING_COLUMNS: usize = 3;

/// Sensor columns of the C-MAPSS layout.
pub const CMAPSS_SENSOR_COLUMNS: usize = 21;

/// Minimum samples a trajectory must have to be ingested.
pub const MIN_SAMPLES: usize = 1;

// ============================================================================
// Preprocessing
// ============================================================================

/// Half-width (rows) of the neighbourhood used by rolling imputers.
pub const ROLLING_IMPUTER_WINDOW: usize = 5;

// ============================================================================
// Baseline Model
// ============================================================================

pub const EPOCHS: usize = 30;
pub const LEARNING_RATE: f64 = 0.005;
pub const LR_DECAY: f64 = 0.999;
pub const LR_FLOOR: f64 = 1e-4;
pub const BATCH_SIZE: usize = 256;
pub const MODEL_SEED: u64 = 7;

// ============================================================================
// Output
// ============================================================================

pub const OUTPUT_DIR: &str = "results";
pub const REPORT_FILE: &str = "evaluation_report.json";
