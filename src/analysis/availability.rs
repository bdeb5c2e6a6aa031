//! Per-column data availability: first and last observation, span in years
//! and, for regular series, percent completeness.
//!
//! Completeness treats every sample as covering one full step, half a step
//! either side of its timestamp. Span and expected count are both widened by
//! one step before `observed * step / expected` is taken, so a gap-free
//! series scores exactly 100%.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::analysis::reshape::melt;
use crate::analysis::step::infer_step;
use crate::logging::{self, Stage};
use crate::model::{
    AvailabilityRecord, AvailabilityReport, DAYS_PER_YEAR, SECONDS_PER_DAY, StepResult, TimeSeries,
};

struct Coverage {
    start: NaiveDateTime,
    end: NaiveDateTime,
    count: usize,
}

/// Availability of every column of `series`.
///
/// Returns `None` when the series holds fewer than two observed rows.
/// Columns that were never observed still get a record, with no start, end
/// or length.
pub fn availability(series: &TimeSeries, min_step_seconds: u64) -> Option<AvailabilityReport> {
    let step = infer_step(series, min_step_seconds);
    if step == StepResult::Empty {
        return None;
    }

    let mut coverage: HashMap<String, Coverage> = HashMap::new();
    for rec in melt(series) {
        coverage
            .entry(rec.site)
            .and_modify(|c| {
                c.start = c.start.min(rec.time);
                c.end = c.end.max(rec.time);
                c.count += 1;
            })
            .or_insert(Coverage {
                start: rec.time,
                end: rec.time,
                count: 1,
            });
    }

    let step_days = step.seconds().map(|s| s as f64 / SECONDS_PER_DAY as f64);
    let records = series
        .columns()
        .iter()
        .map(|column| record_for(&column.name, coverage.get(&column.name), step_days))
        .collect();

    logging::debug(
        Stage::Availability,
        None,
        &format!("availability for {} column(s), step {}", series.columns().len(), step),
    );
    Some(AvailabilityReport { step, records })
}

fn record_for(site: &str, coverage: Option<&Coverage>, step_days: Option<f64>) -> AvailabilityRecord {
    let Some(cov) = coverage else {
        return AvailabilityRecord {
            site: site.to_string(),
            start: None,
            end: None,
            length_years: None,
            completeness_pct: step_days.map(|_| 0.0),
        };
    };

    let span_days = (cov.end - cov.start).num_milliseconds() as f64 / 1_000.0 / SECONDS_PER_DAY as f64;
    let (length_years, completeness_pct) = match step_days {
        Some(step) => {
            let expected_days = span_days + step;
            let pct = cov.count as f64 * step / expected_days * 100.0;
            (expected_days / DAYS_PER_YEAR, Some(pct))
        }
        None => (span_days / DAYS_PER_YEAR, None),
    };

    AvailabilityRecord {
        site: site.to_string(),
        start: Some(cov.start),
        end: Some(cov.end),
        length_years: Some(length_years),
        completeness_pct,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
