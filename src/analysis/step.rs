//! Sampling-interval inference.
//!
//! Fully empty rows are dropped first; they say nothing about the sampling
//! resolution. The remaining consecutive deltas form two working sets:
//! `candidates` (deltas at or above the minimum step, from which the smallest
//! becomes the step) and `all deltas` (each of which must be a whole multiple
//! of that step). A sub-threshold delta can therefore never become the step,
//! but it still makes the series irregular.

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::logging::{self, Stage};
use crate::model::{SECONDS_PER_DAY, StepResult, TemporalKind, TimeSeries};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Infers the dominant regular step of `series`, in whole seconds.
///
/// When every delta falls below `min_step_seconds` the candidate set is
/// empty and no step can be identified at that resolution; the series is
/// reported as `Irregular`.
pub fn infer_step(series: &TimeSeries, min_step_seconds: u64) -> StepResult {
    let observed: Vec<NaiveDateTime> = (0..series.len())
        .filter(|&i| !series.is_empty_row(i))
        .map(|i| series.timestamps()[i])
        .collect();
    infer_step_from_timestamps(&observed, min_step_seconds)
}

/// Step inference over an ascending list of observation timestamps.
pub fn infer_step_from_timestamps(timestamps: &[NaiveDateTime], min_step_seconds: u64) -> StepResult {
    if timestamps.len() <= 1 {
        return StepResult::Empty;
    }

    let deltas: Vec<i128> = timestamps.windows(2).map(|w| delta_nanos(w[0], w[1])).collect();

    let threshold = i128::from(min_step_seconds) * NANOS_PER_SECOND;
    let candidate = match deltas.iter().copied().filter(|&d| d >= threshold).min() {
        Some(c) => c,
        None => {
            logging::debug(
                Stage::Step,
                None,
                &format!("all {} deltas are below {}s; no step candidate", deltas.len(), min_step_seconds),
            );
            return StepResult::Irregular;
        }
    };

    // A fractional-second step cannot be expressed on the grid.
    if candidate <= 0 || candidate % NANOS_PER_SECOND != 0 {
        return StepResult::Irregular;
    }

    if deltas.iter().all(|d| d % candidate == 0) {
        StepResult::RegularSeconds((candidate / NANOS_PER_SECOND) as u64)
    } else {
        logging::debug(
            Stage::Step,
            None,
            &format!("candidate step {}s does not divide every delta", candidate / NANOS_PER_SECOND),
        );
        StepResult::Irregular
    }
}

/// Exact gap between two timestamps in nanoseconds.
fn delta_nanos(from: NaiveDateTime, to: NaiveDateTime) -> i128 {
    let delta = to - from;
    let secs = delta.num_seconds();
    // The sub-second remainder always fits
    let rest = (delta - Duration::seconds(secs)).num_nanoseconds().unwrap_or(0);
    i128::from(secs) * NANOS_PER_SECOND + i128::from(rest)
}

/// `true` for a calendar-day series: keyed by dates, or stepping by exactly
/// one day with every timestamp on midnight.
pub fn is_daily(series: &TimeSeries, min_step_seconds: u64) -> bool {
    if series.kind() == TemporalKind::Date {
        return true;
    }
    all_on_midnight(series.timestamps())
        && infer_step(series, min_step_seconds) == StepResult::RegularSeconds(SECONDS_PER_DAY)
}

/// `is_daily` over a bare ascending timestamp list.
pub fn is_daily_timestamps(timestamps: &[NaiveDateTime], min_step_seconds: u64) -> bool {
    all_on_midnight(timestamps)
        && infer_step_from_timestamps(timestamps, min_step_seconds)
            == StepResult::RegularSeconds(SECONDS_PER_DAY)
}

fn all_on_midnight(timestamps: &[NaiveDateTime]) -> bool {
    timestamps
        .iter()
        .all(|t| t.hour() == 0 && t.minute() == 0 && t.second() == 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
