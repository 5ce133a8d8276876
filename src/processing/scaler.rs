//! Per-feature normalization fitted on training windows only.
//!
//! Statistics are accumulated with Welford's algorithm for numerically stable
//! mean and variance. Every row of every training window contributes, so
//! rows shared by overlapping windows are counted once per window.
//!
//! [`ScalerState`] has no mutating API. The only way to obtain one is
//! [`FeatureScaler::fit`], which is what keeps scaling fitted on train before
//! any validation or test window is transformed.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::types::{FeatureSchema, Window, WindowTensor};

/// Standard deviations (or ranges) below this are treated as zero.
const MIN_SCALE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// `(x - mean) / std`, population std.
    #[default]
    Standard,
    /// `(x - min) / (max - min)`.
    MinMax,
}

// ============================================================================
// Running Statistics
// ============================================================================

/// Welford accumulator for a dynamic number of features, plus min/max.
#[derive(Debug, Clone)]
struct RunningStats {
    count: u64,
    mean: Vec<f64>,
    m2: Vec<f64>,
    min: Vec<f64>,
    max: Vec<f64>,
}

impl RunningStats {
    fn new(features: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; features],
            m2: vec![0.0; features],
            min: vec![f64::INFINITY; features],
            max: vec![f64::NEG_INFINITY; features],
        }
    }

    /// Returns the index of the first non-finite value, if any.
    fn update(&mut self, row: &[f64]) -> Result<(), usize> {
        if let Some(i) = row.iter().position(|v| !v.is_finite()) {
            return Err(i);
        }
        self.count += 1;
        #[allow(clippy::cast_precision_loss)]
        let n = self.count as f64;
        for (i, &x) in row.iter().enumerate() {
            let delta = x - self.mean[i];
            self.mean[i] += delta / n;
            let delta2 = x - self.mean[i];
            self.m2[i] += delta * delta2;
            self.min[i] = self.min[i].min(x);
            self.max[i] = self.max[i].max(x);
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn population_std(&self, i: usize) -> f64 {
        (self.m2[i] / self.count as f64).sqrt()
    }
}

// ============================================================================
// Scaler
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureScaler {
    kind: ScalerKind,
}

impl FeatureScaler {
    pub fn new(kind: ScalerKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    /// Fit per-feature statistics from training windows.
    pub fn fit<'a>(
        &self,
        windows: impl IntoIterator<Item = Window<'a>>,
    ) -> Result<ScalerState, ConfigError> {
        let mut windows = windows.into_iter().peekable();
        let schema = windows.peek().ok_or(ConfigError::EmptyFittingSet)?.schema;
        let mut stats = RunningStats::new(schema.len());
        for w in windows {
            if w.schema != schema {
                return Err(ConfigError::InvalidParameter {
                    name: "scaler",
                    reason: format!(
                        "window of unit {} has {} features, fitting started on {}",
                        w.unit_id,
                        w.schema.len(),
                        schema.len()
                    ),
                });
            }
            for row in w.rows() {
                stats
                    .update(row)
                    .map_err(|i| non_finite(schema, i))?;
            }
        }
        self.freeze(schema, &stats)
    }

    /// Fit from an already materialized training tensor.
    pub fn fit_tensor(
        &self,
        tensor: &WindowTensor,
        schema: &FeatureSchema,
    ) -> Result<ScalerState, ConfigError> {
        if tensor.is_empty() || tensor.feature_count == 0 {
            return Err(ConfigError::EmptyFittingSet);
        }
        check_width(tensor, schema.len())?;
        let mut stats = RunningStats::new(schema.len());
        for row in tensor.data.chunks_exact(tensor.feature_count) {
            stats.update(row).map_err(|i| non_finite(schema, i))?;
        }
        self.freeze(schema, &stats)
    }

    /// Scale a tensor with an already fitted state.
    pub fn transform(tensor: &WindowTensor, state: &ScalerState) -> Result<WindowTensor, ConfigError> {
        state.transform(tensor)
    }

    fn freeze(&self, schema: &FeatureSchema, stats: &RunningStats) -> Result<ScalerState, ConfigError> {
        if stats.count == 0 {
            return Err(ConfigError::EmptyFittingSet);
        }
        let n = schema.len();
        let mut offset = Vec::with_capacity(n);
        let mut scale = Vec::with_capacity(n);
        for (i, name) in schema.names().enumerate() {
            let (o, s) = match self.kind {
                ScalerKind::Standard => (stats.mean[i], stats.population_std(i)),
                ScalerKind::MinMax => (stats.min[i], stats.max[i] - stats.min[i]),
            };
            if s < MIN_SCALE {
                return Err(ConfigError::ZeroVariance {
                    feature: name.to_string(),
                });
            }
            offset.push(o);
            scale.push(s);
        }
        debug!(kind = ?self.kind, rows = stats.count, features = n, "Scaler fitted");
        Ok(ScalerState {
            kind: self.kind,
            features: schema.names().map(str::to_string).collect(),
            offset,
            scale,
            fitted_rows: stats.count,
        })
    }
}

fn non_finite(schema: &FeatureSchema, i: usize) -> ConfigError {
    ConfigError::NonFiniteFeature {
        feature: schema
            .columns()
            .get(i)
            .map_or_else(|| format!("#{i}"), |c| c.name.clone()),
    }
}

fn check_width(tensor: &WindowTensor, expected: usize) -> Result<(), ConfigError> {
    if tensor.feature_count == expected {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name: "scaler",
            reason: format!(
                "tensor has {} features, scaler was fitted on {expected}",
                tensor.feature_count
            ),
        })
    }
}

// ============================================================================
// Frozen State
// ============================================================================

/// Fitted scaling parameters. `x' = (x - offset) / scale` per feature.
///
/// For `standard`, offset is the mean and scale the population std. For
/// `min_max`, offset is the minimum and scale the range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    kind: ScalerKind,
    features: Vec<String>,
    offset: Vec<f64>,
    scale: Vec<f64>,
    fitted_rows: u64,
}

impl ScalerState {
    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn offset(&self) -> &[f64] {
        &self.offset
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Rows that contributed to the fit.
    pub fn fitted_rows(&self) -> u64 {
        self.fitted_rows
    }

    pub fn transform_row(&self, row: &mut [f64]) {
        for ((x, o), s) in row.iter_mut().zip(&self.offset).zip(&self.scale) {
            *x = (*x - o) / s;
        }
    }

    /// Scaled copy of one window's values.
    pub fn transform_window(&self, window: &Window<'_>) -> Vec<f64> {
        let mut out = window.values.to_vec();
        for row in out.chunks_exact_mut(self.features.len().max(1)) {
            self.transform_row(row);
        }
        out
    }

    /// Scale every window in place, windows processed in parallel.
    pub fn transform_in_place(&self, tensor: &mut WindowTensor) -> Result<(), ConfigError> {
        check_width(tensor, self.features.len())?;
        let window = tensor.window_size().max(1);
        let f = tensor.feature_count.max(1);
        tensor.data.par_chunks_mut(window).for_each(|w| {
            for row in w.chunks_exact_mut(f) {
                self.transform_row(row);
            }
        });
        Ok(())
    }

    /// Scaled copy of a tensor; labels and ids are carried over unchanged.
    pub fn transform(&self, tensor: &WindowTensor) -> Result<WindowTensor, ConfigError> {
        let mut out = tensor.clone();
        self.transform_in_place(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{RulLabeler, WindowGenerator};
    use crate::types::{Trajectory, UnitId};
    use std::sync::Arc;

    fn traj(id: u32, s1: &[f64], s2: &[f64]) -> Trajectory {
        let values: Vec<f64> = s1.iter().zip(s2).flat_map(|(a, b)| [*a, *b]).collect();
        Trajectory::new(
            UnitId::from(id),
            Arc::new(FeatureSchema::sensors_only(&["s_1", "s_2"])),
            (1..=s1.len() as u32).collect(),
            values,
        )
        .expect("valid trajectory")
    }

    #[test]
    fn test_fit_rejects_mixed_schemas() {
        let narrow = traj(1, &[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        let wide = Trajectory::new(
            UnitId::from(2),
            Arc::new(FeatureSchema::sensors_only(&["s_1", "s_2", "s_3"])),
            vec![1, 2, 3],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
        )
        .expect("valid trajectory");
        let gen = WindowGenerator::new(2, 1).expect("geometry");
        let scaler = FeatureScaler::new(ScalerKind::Standard);

        let err = scaler
            .fit(gen.generate(&narrow).chain(gen.generate(&wide)))
            .expect_err("wider window after narrow ones");
        assert!(matches!(err, ConfigError::InvalidParameter { name: "scaler", .. }));

        let err = scaler
            .fit(gen.generate(&wide).chain(gen.generate(&narrow)))
            .expect_err("narrower window after wide ones");
        assert!(matches!(err, ConfigError::InvalidParameter { name: "scaler", .. }));
    }

    #[test]
    fn test_standard_uses_population_std() {
        let t = traj(1, &[1.0, 2.0, 3.0, 4.0], &[10.0, 10.0, 30.0, 30.0]);
        let gen = WindowGenerator::new(4, 1).expect("geometry");
        let state = FeatureScaler::new(ScalerKind::Standard)
            .fit(gen.generate(&t))
            .expect("fit");
        assert!((state.offset()[0] - 2.5).abs() < 1e-12);
        assert!((state.scale()[0] - 1.25_f64.sqrt()).abs() < 1e-12);
        assert!((state.offset()[1] - 20.0).abs() < 1e-12);
        assert!((state.scale()[1] - 10.0).abs() < 1e-12);
        assert_eq!(state.fitted_rows(), 4);
    }

    #[test]
    fn test_overlapping_rows_counted_per_window() {
        let t = traj(1, &[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]);
        let gen = WindowGenerator::new(2, 1).expect("geometry");
        let state = FeatureScaler::default().fit(gen.generate(&t)).expect("fit");
        // rows 0,1 and 1,2: the middle row contributes twice
        assert_eq!(state.fitted_rows(), 4);
        assert!((state.offset()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_max_maps_train_to_unit_interval() {
        let t = traj(1, &[2.0, 4.0, 6.0], &[-1.0, 0.0, 1.0]);
        let gen = WindowGenerator::new(3, 1).expect("geometry");
        let state = FeatureScaler::new(ScalerKind::MinMax)
            .fit(gen.generate(&t))
            .expect("fit");
        let w = gen.generate(&t).next().expect("one window");
        assert_eq!(state.transform_window(&w), vec![0.0, 0.0, 0.5, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_zero_variance_feature_rejected() {
        let t = traj(1, &[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]);
        let gen = WindowGenerator::new(2, 1).expect("geometry");
        let err = FeatureScaler::default().fit(gen.generate(&t)).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroVariance { ref feature } if feature == "s_2"));
    }

    #[test]
    fn test_empty_and_non_finite_rejected() {
        let t = traj(1, &[1.0, f64::NAN], &[1.0, 2.0]);
        let gen = WindowGenerator::new(3, 1).expect("geometry");
        assert!(matches!(
            FeatureScaler::default().fit(gen.generate(&t)),
            Err(ConfigError::EmptyFittingSet)
        ));

        let gen = WindowGenerator::new(2, 1).expect("geometry");
        assert!(matches!(
            FeatureScaler::default().fit(gen.generate(&t)),
            Err(ConfigError::NonFiniteFeature { .. })
        ));
    }

    #[test]
    fn test_tensor_transform_independent_of_other_splits() {
        let train = traj(1, &[0.0, 2.0, 4.0, 6.0], &[1.0, 3.0, 5.0, 7.0]);
        let test = traj(2, &[100.0, 200.0, 300.0, 400.0], &[0.0, 0.0, 0.0, 1.0]);
        let gen = WindowGenerator::new(2, 1).expect("geometry");
        let labeler = RulLabeler::new(125).expect("cap");

        let train_t = labeler.materialize(gen.generate(&train));
        let state = FeatureScaler::default()
            .fit_tensor(&train_t, train.schema())
            .expect("fit");
        let same_state = FeatureScaler::default().fit(gen.generate(&train)).expect("fit");
        assert_eq!(state, same_state);

        let test_t = labeler.materialize(gen.generate(&test));
        let a = FeatureScaler::transform(&test_t, &state).expect("width matches");
        let b = state.transform(&test_t).expect("width matches");
        assert_eq!(a, b);
        assert_eq!(a.labels, test_t.labels);
        let w = gen.generate(&test).next().expect("window");
        assert_eq!(a.window(0), Some(&state.transform_window(&w)[..]));
    }
}
