//! Property-based tests for the RUL pipeline
//!
//! Invariants of windowing, labeling, splitting, scaling, batching and
//! scoring over generated trajectories.
//! Run with ProptestConfig::with_cases(64).

use proptest::prelude::*;
use rul_pipeline::processing::{Batcher, FeatureScaler, RulLabeler, ScalerKind, WindowGenerator};
use rul_pipeline::scoring::ScoringEngine;
use rul_pipeline::split::{DatasetSplitter, SplitRatios};
use rul_pipeline::types::{FeatureSchema, Split, Trajectory, UnitId, WindowTensor};
use rul_pipeline::ingest::Imputer;
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Strategies
// ============================================================================

/// Trajectory with strictly increasing cycles (gaps allowed) and two sensors.
fn arb_trajectory(id: u32, max_len: usize) -> impl Strategy<Value = Trajectory> {
    (1..=max_len)
        .prop_flat_map(|len| {
            (
                proptest::collection::vec(1u32..4, len),
                proptest::collection::vec(-100.0f64..100.0, len * 2),
            )
        })
        .prop_map(move |(gaps, values)| {
            let cycles: Vec<u32> = gaps
                .iter()
                .scan(0u32, |c, g| {
                    *c += g;
                    Some(*c)
                })
                .collect();
            Trajectory::new(
                UnitId::from(id),
                Arc::new(FeatureSchema::sensors_only(&["s_1", "s_2"])),
                cycles,
                values,
            )
            .expect("generated trajectory is valid")
        })
}

fn tensor_of(trajectories: &[Trajectory], gen: &WindowGenerator, labeler: &RulLabeler) -> WindowTensor {
    let mut tensor = WindowTensor::new(gen.sequence_length(), 2);
    for t in trajectories {
        tensor.append(labeler.materialize(gen.generate(t)));
    }
    tensor
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: every window has exactly sequence_length rows and ends inside the trajectory
    #[test]
    fn prop_windows_have_fixed_length(
        t in arb_trajectory(1, 120),
        seq_len in 1usize..40,
        stride in 1usize..12,
    ) {
        let gen = WindowGenerator::new(seq_len, stride).expect("positive geometry");
        let windows: Vec<_> = gen.generate(&t).collect();
        prop_assert_eq!(windows.len(), gen.window_count(t.len()));
        for w in &windows {
            prop_assert_eq!(w.values.len(), seq_len * t.feature_count());
            prop_assert_eq!(w.rows().count(), seq_len);
            prop_assert!(w.end_index < t.len());
            prop_assert_eq!(w.end_cycle, t.cycles()[w.end_index]);
        }
        if t.len() < seq_len {
            prop_assert!(windows.is_empty());
        }
    }

    /// Property: labels are non-increasing, non-negative and capped
    #[test]
    fn prop_labels_monotone_and_bounded(
        t in arb_trajectory(1, 150),
        seq_len in 1usize..20,
        stride in 1usize..6,
        max_rul in 1u32..200,
    ) {
        let gen = WindowGenerator::new(seq_len, stride).expect("positive geometry");
        let labeler = RulLabeler::new(max_rul).expect("positive cap");
        let tensor = labeler.materialize(gen.generate(&t));
        for pair in tensor.labels.windows(2) {
            prop_assert!(pair[1] <= pair[0]);
        }
        for &l in &tensor.labels {
            prop_assert!(l >= 0.0);
            prop_assert!(l <= f64::from(max_rul));
        }
    }

    /// Property: the split is a partition of the units and reproducible from the seed
    #[test]
    fn prop_split_is_partition(n in 10u32..60, seed in any::<u64>()) {
        let ids: Vec<UnitId> = (0..n).map(UnitId::from).collect();
        let splitter = DatasetSplitter::new(
            SplitRatios::new(0.7, 0.15, 0.15).expect("valid ratios"),
            seed,
        );
        let assignment = splitter.split(&ids).expect("enough units");

        let mut seen = HashSet::new();
        for split in Split::ALL {
            for unit in assignment.units(split) {
                prop_assert!(seen.insert(unit.clone()), "unit {} in two splits", unit);
            }
        }
        prop_assert_eq!(seen.len(), ids.len());
        prop_assert!(ids.iter().all(|u| seen.contains(u)));

        let again = splitter.split(ids.iter().rev()).expect("enough units");
        prop_assert_eq!(assignment, again);
    }

    /// Property: scaled test windows depend only on the train fit and the window itself
    #[test]
    fn prop_scaler_independent_of_test_content(
        train in proptest::collection::vec(arb_trajectory(1, 60), 1..4),
        probe in arb_trajectory(100, 60),
        other in arb_trajectory(101, 60),
        min_max in any::<bool>(),
    ) {
        let gen = WindowGenerator::new(1, 1).expect("positive geometry");
        let labeler = RulLabeler::new(125).expect("positive cap");
        let kind = if min_max { ScalerKind::MinMax } else { ScalerKind::Standard };
        let train_tensor = tensor_of(&train, &gen, &labeler);
        let Ok(state) = FeatureScaler::new(kind).fit_tensor(&train_tensor, train[0].schema()) else {
            // degenerate (constant) train features are rejected, nothing to compare
            return Ok(());
        };

        let alone = state.transform(&tensor_of(&[probe.clone()], &gen, &labeler)).expect("width");
        let mixed = state
            .transform(&tensor_of(&[probe, other], &gen, &labeler))
            .expect("width");
        prop_assert_eq!(&alone.data[..], &mixed.data[..alone.data.len()]);

        let again = FeatureScaler::new(kind).fit_tensor(&train_tensor, train[0].schema()).expect("same fit");
        prop_assert_eq!(state, again);
    }

    /// Property: batches cover every window exactly once per pass
    #[test]
    fn prop_batches_cover_tensor(
        t in arb_trajectory(1, 200),
        batch_size in 1usize..64,
    ) {
        let gen = WindowGenerator::new(5, 1).expect("positive geometry");
        let tensor = RulLabeler::new(125).expect("positive cap").materialize(gen.generate(&t));
        let batcher = Batcher::new(&tensor, batch_size).expect("positive batch");
        prop_assert_eq!(batcher.len(), tensor.count().div_ceil(batch_size));

        let batches: Vec<_> = batcher.collect();
        prop_assert_eq!(batches.len(), tensor.count().div_ceil(batch_size));
        let labels: Vec<f64> = batches.iter().flat_map(|b| b.y.iter().copied()).collect();
        let data: Vec<f64> = batches.iter().flat_map(|b| b.x.iter().copied()).collect();
        prop_assert_eq!(labels, tensor.labels.clone());
        prop_assert_eq!(data, tensor.data.clone());
    }

    /// Property: a perfect prediction scores zero
    #[test]
    fn prop_perfect_prediction_scores_zero(labels in proptest::collection::vec(0.0f64..125.0, 1..200)) {
        let result = ScoringEngine::default().score(&labels, &labels).expect("scorable");
        prop_assert_eq!(result.rmse, 0.0);
        prop_assert_eq!(result.score, 0.0);
        prop_assert_eq!(result.mae, 0.0);
        prop_assert_eq!(result.count, labels.len());
    }

    /// Property: the asymmetric penalty is non-negative and late errors cost more
    #[test]
    fn prop_late_costs_more_than_early(e in 0.01f64..100.0, truth in 0.0f64..125.0) {
        let engine = ScoringEngine::default();
        let late = engine.penalty(truth + e, truth);
        let early = engine.penalty(truth - e, truth);
        prop_assert!(early > 0.0);
        prop_assert!(late > early);
    }

    /// Property: imputation leaves only finite values and never reads the repaired unit
    #[test]
    fn prop_imputer_repairs_everything(
        train in arb_trajectory(1, 40),
        mut values in proptest::collection::vec(-50.0f64..50.0, 20),
        holes in proptest::collection::vec((0usize..20, 0u8..3), 0..10),
    ) {
        for (i, kind) in holes {
            values[i] = match kind {
                0 => f64::NAN,
                1 => f64::INFINITY,
                _ => f64::NEG_INFINITY,
            };
        }
        let test = Trajectory::new(
            UnitId::from(9),
            Arc::new(FeatureSchema::sensors_only(&["s_1", "s_2"])),
            (1..=10).collect(),
            values,
        ).expect("valid trajectory");

        let state = Imputer::default().fit([&train]).expect("non-empty fit");
        let repaired = state.transform(&test).expect("same schema");
        prop_assert!(!repaired.has_non_finite());
        for (col, (&lo, &hi)) in state.min.iter().zip(&state.max).enumerate() {
            for row in 0..repaired.len() {
                let before = test.row(row).expect("row")[col];
                let after = repaired.row(row).expect("row")[col];
                if before.is_finite() {
                    prop_assert_eq!(before, after);
                } else {
                    prop_assert!(after >= lo && after <= hi);
                }
            }
        }
    }
}
