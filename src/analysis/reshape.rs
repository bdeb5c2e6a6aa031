//! Wide ⇄ long conversion of multi-site tables.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;

use crate::model::{Column, LongRecord, TemporalKind, TimeSeries, ValidationError};

/// One record per non-missing cell, row by row, columns left to right.
pub fn melt(series: &TimeSeries) -> Vec<LongRecord> {
    let mut out = Vec::new();
    for (row, ts) in series.timestamps().iter().enumerate() {
        for column in series.columns() {
            if let Some(value) = column.values[row] {
                out.push(LongRecord {
                    time: *ts,
                    site: column.name.clone(),
                    value,
                });
            }
        }
    }
    out
}

/// Rebuilds a wide table from long records.
///
/// Columns appear in first-seen order and rows ascend by time. A site that
/// reports the same timestamp twice cannot be pivoted and is reported as a
/// duplicate timestamp.
pub fn pivot(
    records: &[LongRecord],
    time_column: &str,
    kind: TemporalKind,
) -> Result<TimeSeries, ValidationError> {
    if records.is_empty() {
        return Err(ValidationError::NoDataColumn);
    }

    let mut sites: Vec<&str> = Vec::new();
    let mut cells: HashMap<(&str, NaiveDateTime), f64> = HashMap::with_capacity(records.len());
    let mut rows: BTreeMap<NaiveDateTime, usize> = BTreeMap::new();

    for rec in records {
        if !sites.contains(&rec.site.as_str()) {
            sites.push(&rec.site);
        }
        if cells.insert((rec.site.as_str(), rec.time), rec.value).is_some() {
            return Err(ValidationError::DuplicateTimestamp {
                column: time_column.to_string(),
                timestamp: rec.time,
            });
        }
        rows.insert(rec.time, 0);
    }

    let index: Vec<NaiveDateTime> = rows.keys().copied().collect();
    let columns = sites
        .iter()
        .map(|site| {
            let values = index.iter().map(|t| cells.get(&(*site, *t)).copied()).collect();
            Column::new(*site, values)
        })
        .collect();

    TimeSeries::new(time_column, kind, index, columns)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
