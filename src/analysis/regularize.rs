//! Gap filling onto a regular temporal grid.

use chrono::Duration;

use crate::analysis::step::infer_step;
use crate::logging::{self, Stage};
use crate::model::{Column, StepResult, TimeSeries};

/// Regularizes `series` onto its own inferred step.
///
/// Fully empty rows are always dropped. For an `Irregular` or `Empty`
/// series that de-emptied copy is returned as is; for a regular one every
/// grid timestamp between the first and last observation is present, with
/// missing values where the source had no row.
pub fn regularize(series: &TimeSeries, min_step_seconds: u64) -> TimeSeries {
    match infer_step(series, min_step_seconds) {
        StepResult::RegularSeconds(step) => regularize_to_step(series, step),
        _ => series.drop_empty_rows(),
    }
}

/// Fills `series` onto a grid of `step_seconds`, anchored at its first
/// non-empty timestamp.
///
/// Source rows that do not fall on the grid are kept at their own
/// timestamp, so nothing observed is lost when the step is imposed rather
/// than inferred.
pub fn regularize_to_step(series: &TimeSeries, step_seconds: u64) -> TimeSeries {
    let observed = series.drop_empty_rows();
    if observed.len() <= 1 || step_seconds == 0 {
        return observed;
    }

    let step = Duration::seconds(step_seconds as i64);
    let src = observed.timestamps();
    let (first, last) = (src[0], src[src.len() - 1]);

    let mut index = Vec::new();
    let mut rows: Vec<Option<usize>> = Vec::new();
    let mut next_src = 0;
    let mut grid = first;
    while grid <= last || next_src < src.len() {
        // Off-grid source rows sort in between grid points.
        while next_src < src.len() && src[next_src] < grid {
            index.push(src[next_src]);
            rows.push(Some(next_src));
            next_src += 1;
        }
        if grid > last {
            continue;
        }
        if next_src < src.len() && src[next_src] == grid {
            rows.push(Some(next_src));
            next_src += 1;
        } else {
            rows.push(None);
        }
        index.push(grid);
        grid += step;
    }

    let columns = observed
        .columns()
        .iter()
        .map(|c| Column {
            name: c.name.clone(),
            values: rows.iter().map(|r| r.and_then(|i| c.values[i])).collect(),
        })
        .collect();

    let inserted = index.len() - src.len();
    if inserted > 0 {
        logging::debug(
            Stage::Regularize,
            observed.label(crate::model::LABEL_SITE),
            &format!("inserted {} missing row(s) at {}s spacing", inserted, step_seconds),
        );
    }

    TimeSeries::from_parts(
        observed.time_column().to_string(),
        observed.kind(),
        index,
        columns,
        observed.labels().clone(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
