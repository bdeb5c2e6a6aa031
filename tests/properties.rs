/// Property tests for the regularization core
///
/// These tests verify, over generated series:
/// 1. After regularizing a regular series every delta equals the inferred step
/// 2. Regularizing twice changes nothing
/// 3. Wide → long → wide reproduces every observed value
/// 4. A single observation has no step and survives regularization as is

use chrono::{Duration, NaiveDate, NaiveDateTime};
use hydroreg_service::{
    Column, StepResult, TemporalKind, TimeSeries, infer_step, melt, pivot, regularize,
};
use proptest::prelude::*;

const MIN_STEP: u64 = 60;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 12, 30)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn value() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        1 => Just(None::<f64>),
        4 => (-1.0e6f64..1.0e6).prop_map(Some),
    ]
}

/// Builds a series from per-row offsets (seconds from `base`) and rows of
/// column values.
fn build(offsets: &[i64], rows: &[Vec<Option<f64>>], width: usize) -> TimeSeries {
    let index = offsets.iter().map(|&s| base() + Duration::seconds(s)).collect();
    let columns = (0..width)
        .map(|c| Column::new(format!("S{}", c), rows.iter().map(|r| r[c]).collect()))
        .collect();
    TimeSeries::new("Time", TemporalKind::DateTime, index, columns).unwrap()
}

/// Timestamps on a fixed grid, skipping up to three grid points at a time.
fn gridded_series() -> impl Strategy<Value = TimeSeries> {
    (
        prop::sample::select(vec![60u64, 300, 900, 3_600, 86_400]),
        prop::collection::vec((1i64..4, value(), value()), 1..40),
    )
        .prop_map(|(step, rows)| {
            let mut offsets = Vec::with_capacity(rows.len());
            let mut t = 0i64;
            for (gap, _, _) in &rows {
                offsets.push(t);
                t += gap * step as i64;
            }
            let values: Vec<Vec<Option<f64>>> = rows.iter().map(|(_, a, b)| vec![*a, *b]).collect();
            build(&offsets, &values, 2)
        })
}

/// Arbitrary ascending timestamps with gaps of 1 s to ~2 h.
fn arbitrary_series() -> impl Strategy<Value = TimeSeries> {
    prop::collection::vec((1i64..7_200, value()), 1..40).prop_map(|rows| {
        let mut offsets = Vec::with_capacity(rows.len());
        let mut t = 0i64;
        for (gap, _) in &rows {
            offsets.push(t);
            t += gap;
        }
        let values: Vec<Vec<Option<f64>>> = rows.iter().map(|(_, v)| vec![*v]).collect();
        build(&offsets, &values, 1)
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn regularized_deltas_equal_inferred_step(series in gridded_series()) {
        if let StepResult::RegularSeconds(step) = infer_step(&series, MIN_STEP) {
            let filled = regularize(&series, MIN_STEP);
            for w in filled.timestamps().windows(2) {
                prop_assert_eq!((w[1] - w[0]).num_seconds(), step as i64);
            }
        }
    }

    #[test]
    fn regularize_is_idempotent_on_grids(series in gridded_series()) {
        let once = regularize(&series, MIN_STEP);
        let twice = regularize(&once, MIN_STEP);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn regularize_is_idempotent_on_arbitrary_spacing(series in arbitrary_series()) {
        let once = regularize(&series, MIN_STEP);
        let twice = regularize(&once, MIN_STEP);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn regularize_keeps_every_observation(series in arbitrary_series()) {
        let filled = regularize(&series, MIN_STEP);
        let before = melt(&series);
        let after = melt(&filled);
        prop_assert_eq!(before, after);
    }

    #[test]
    fn melt_then_pivot_restores_observed_values(series in gridded_series()) {
        let records = melt(&series);
        prop_assume!(!records.is_empty());

        let rebuilt = pivot(&records, series.time_column(), series.kind()).unwrap();
        let expected = series.drop_empty_rows();
        prop_assert_eq!(rebuilt.timestamps(), expected.timestamps());

        let observed: Vec<&Column> = expected.columns().iter().filter(|c| c.count() > 0).collect();
        prop_assert_eq!(rebuilt.columns().len(), observed.len());
        for column in observed {
            let got = rebuilt.column(&column.name);
            prop_assert!(got.is_some(), "column {} lost in round trip", column.name);
            prop_assert_eq!(&got.unwrap().values, &column.values);
        }
    }

    #[test]
    fn single_observation_has_no_step(offset in 0i64..1_000_000, v in -1.0e6f64..1.0e6) {
        let series = build(&[offset], &[vec![Some(v)]], 1);
        prop_assert_eq!(infer_step(&series, MIN_STEP), StepResult::Empty);
        prop_assert_eq!(regularize(&series, MIN_STEP), series);
    }
}
