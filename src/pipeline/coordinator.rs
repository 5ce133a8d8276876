//! Pipeline coordinator: runs the preparation and evaluation phases in order.
//!
//! ```text
//! PHASE 1: Split units (train / validation / test)
//! PHASE 2: Impute non-finite readings (fit on train units)
//! PHASE 3: Window + label every unit (parallel across units)
//! PHASE 4: Fit scaler on train windows
//! PHASE 5: Scale every split (parallel across rows)
//! PHASE 6: Leakage check
//! PHASE 7: Train on train, predict validation and test
//! PHASE 8: Score, histogram, maintenance horizons
//! ```
//!
//! No split's data influences a fitted statistic unless it is the train split.

use rayon::prelude::*;
use std::borrow::Cow;
use tracing::{debug, info, warn};

use super::state::{PartialExclusion, PipelineError, PreparedDataset};
use crate::config::PipelineConfig;
use crate::ingest::{Imputer, ImputerState, TrajectoryStore};
use crate::model::RulModel;
use crate::processing::{FeatureScaler, RulLabeler, WindowGenerator};
use crate::report::{EvaluationReport, SplitEvaluation};
use crate::scoring::{horizon_sweep, life_outcomes, ErrorHistogram, PredictionRecord, ScoringEngine};
use crate::split::{check_leakage, DatasetSplitter};
use crate::types::{Split, Trajectory, UnitId, WindowTensor};

/// Outcome of windowing one unit.
enum UnitWindows {
    Windows(WindowTensor),
    Excluded(PartialExclusion),
}

/// Validated pipeline with every stage constructed up front.
#[derive(Debug, Clone)]
pub struct RulPipeline {
    config: PipelineConfig,
    splitter: DatasetSplitter,
    generator: WindowGenerator,
    labeler: RulLabeler,
    scaler: FeatureScaler,
    scoring: ScoringEngine,
}

impl RulPipeline {
    /// Validate `config` and build the stages. Fails before any data is read.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            splitter: DatasetSplitter::from_config(&config.split)?,
            generator: WindowGenerator::from_config(&config.window)?,
            labeler: RulLabeler::new(config.labeling.max_rul)?,
            scaler: FeatureScaler::new(config.scaler.kind),
            scoring: ScoringEngine::from_config(&config.scoring, config.labeling.max_rul)?,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn generator(&self) -> &WindowGenerator {
        &self.generator
    }

    // ========================================================================
    // Preparation
    // ========================================================================

    /// Split, impute, window, label and scale `store`.
    pub fn prepare(&self, store: &TrajectoryStore) -> Result<PreparedDataset, PipelineError> {
        // PHASE 1
        let assignment = self.splitter.split(store.unit_ids())?;
        let units_of = |split| -> Vec<&Trajectory> {
            assignment
                .units(split)
                .into_iter()
                .filter_map(|u| store.get(u))
                .collect()
        };
        let train_units = units_of(Split::Train);

        // PHASE 2
        let imputer = if self.config.preprocessing.impute {
            Some(Imputer::from_config(&self.config.preprocessing)?.fit(train_units.iter().copied())?)
        } else {
            None
        };

        // PHASE 3
        let features = store.schema().len();
        let imputer_ref = imputer.as_ref();
        let (mut train, mut exclusions) =
            self.window_units(Split::Train, &train_units, features, imputer_ref)?;
        let (mut validation, excluded) =
            self.window_units(Split::Validation, &units_of(Split::Validation), features, imputer_ref)?;
        exclusions.extend(excluded);
        let (mut test, excluded) =
            self.window_units(Split::Test, &units_of(Split::Test), features, imputer_ref)?;
        exclusions.extend(excluded);

        for e in &exclusions {
            warn!(
                unit = %e.unit_id,
                split = %e.split,
                length = e.length,
                sequence_length = e.sequence_length,
                "Trajectory shorter than window, unit excluded"
            );
        }
        if train.is_empty() {
            return Err(PipelineError::EmptySplit { split: Split::Train });
        }

        // PHASE 4
        let scaler = self.scaler.fit_tensor(&train, store.schema())?;
        debug!(kind = ?scaler.kind(), rows = scaler.fitted_rows(), "Scaler fitted on train windows");

        // PHASE 5
        for tensor in [&mut train, &mut validation, &mut test] {
            scaler.transform_in_place(tensor)?;
        }

        // PHASE 6
        check_leakage([
            (Split::Train, &train),
            (Split::Validation, &validation),
            (Split::Test, &test),
        ])?;

        let prepared = PreparedDataset {
            assignment,
            imputer,
            scaler,
            train,
            validation,
            test,
            exclusions,
        };
        let sizes = prepared.sizes();
        info!(
            train_units = sizes.train.units,
            train_windows = sizes.train.windows,
            validation_units = sizes.validation.units,
            validation_windows = sizes.validation.windows,
            test_units = sizes.test.units,
            test_windows = sizes.test.windows,
            excluded = prepared.exclusions.len(),
            "Dataset prepared"
        );
        Ok(prepared)
    }

    /// Window and label one split's units in parallel, concatenated in unit order.
    fn window_units(
        &self,
        split: Split,
        units: &[&Trajectory],
        feature_count: usize,
        imputer: Option<&ImputerState>,
    ) -> Result<(WindowTensor, Vec<PartialExclusion>), PipelineError> {
        let seq_len = self.generator.sequence_length();
        let results: Vec<UnitWindows> = units
            .par_iter()
            .map(|&t| -> Result<UnitWindows, PipelineError> {
                if t.len() < seq_len {
                    return Ok(UnitWindows::Excluded(PartialExclusion {
                        unit_id: t.unit_id().clone(),
                        split,
                        length: t.len(),
                        sequence_length: seq_len,
                    }));
                }
                let t = match imputer {
                    Some(state) if t.has_non_finite() => Cow::Owned(state.transform(t)?),
                    _ => Cow::Borrowed(t),
                };
                Ok(UnitWindows::Windows(
                    self.labeler.materialize(self.generator.generate(&t)),
                ))
            })
            .collect::<Result<_, _>>()?;

        let mut tensor = WindowTensor::new(seq_len, feature_count);
        let mut excluded = Vec::new();
        for r in results {
            match r {
                UnitWindows::Windows(w) => tensor.append(w),
                UnitWindows::Excluded(e) => excluded.push(e),
            }
        }
        Ok((tensor, excluded))
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Train `model` on the train windows and score validation and test.
    pub fn evaluate<M: RulModel>(
        &self,
        model: &M,
        prepared: &PreparedDataset,
    ) -> Result<EvaluationReport, PipelineError> {
        // PHASE 7
        let handle = model
            .train(&prepared.train, &prepared.train.labels)
            .map_err(PipelineError::model)?;
        info!(windows = prepared.train.count(), "Model trained");

        // PHASE 8
        let validation = self.evaluate_split(model, &handle, prepared, Split::Validation)?;
        let test = self.evaluate_split(model, &handle, prepared, Split::Test)?;

        Ok(EvaluationReport::new(
            self.config.clone(),
            prepared,
            validation,
            test,
        ))
    }

    fn evaluate_split<M: RulModel>(
        &self,
        model: &M,
        handle: &M::Handle,
        prepared: &PreparedDataset,
        split: Split,
    ) -> Result<Option<SplitEvaluation>, PipelineError> {
        let tensor = prepared.tensor(split);
        if tensor.is_empty() {
            warn!(split = %split, "No windows to score");
            return Ok(None);
        }

        let predictions = model.predict(handle, tensor).map_err(PipelineError::model)?;
        if predictions.len() != tensor.count() {
            return Err(PipelineError::PredictionCount {
                split,
                expected: tensor.count(),
                found: predictions.len(),
            });
        }

        let records = prediction_records(tensor, &predictions);
        let score = self.scoring.score_records(&records)?;
        let scoring = &self.config.scoring;
        let histogram = ErrorHistogram::equal_width(&predictions, &tensor.labels, scoring.histogram_bins)?;
        let outcomes = life_outcomes(&records);
        let horizons = horizon_sweep(
            &outcomes,
            f64::from(scoring.fault_horizon_max),
            scoring.fault_horizon_steps,
            scoring.cost_weights(),
        );

        info!(
            split = %split,
            windows = score.count,
            rmse = score.rmse,
            mae = score.mae,
            score = score.score,
            "Split scored"
        );
        Ok(Some(SplitEvaluation {
            score,
            histogram,
            horizons,
        }))
    }

    /// Prepare `store` and evaluate `model` on it.
    pub fn run<M: RulModel>(
        &self,
        store: &TrajectoryStore,
        model: &M,
    ) -> Result<(PreparedDataset, EvaluationReport), PipelineError> {
        let prepared = self.prepare(store)?;
        let report = self.evaluate(model, &prepared)?;
        Ok((prepared, report))
    }
}

fn prediction_records(tensor: &WindowTensor, predictions: &[f64]) -> Vec<PredictionRecord> {
    tensor
        .unit_ids
        .iter()
        .zip(&tensor.end_cycles)
        .zip(tensor.labels.iter().zip(predictions))
        .map(|((unit_id, &end_cycle), (&actual, &predicted))| PredictionRecord {
            unit_id: unit_id.clone(),
            end_cycle,
            predicted,
            actual,
        })
        .collect()
}
