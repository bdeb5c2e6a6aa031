//! Structural validation of time-indexed tables.
//!
//! Checks run in a fixed order and stop at the first failure:
//!   1. shape (named temporal column, distinct column names, equal lengths)
//!   2. every temporal entry is a date or date-time
//!   3. temporal entries are unique
//!   4. temporal entries are sorted ascending
//!   5. at least one data column exists and every data cell is numeric
//!
//! Nothing is repaired here. Reordering or deduplicating silently would hide
//! upstream integrity problems, so the caller always gets the error.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::logging::{self, Stage};
use crate::model::{Cell, Column, RawTable, ValidationError};

/// Validates a raw table against the time-series shape contract.
pub fn validate(raw: &RawTable) -> Result<(), ValidationError> {
    let names = raw.data.iter().map(|c| (c.name.as_str(), c.cells.len()));
    check_shape(&raw.time.name, raw.time.cells.len(), names)?;

    let mut index = Vec::with_capacity(raw.time.cells.len());
    for (row, cell) in raw.time.cells.iter().enumerate() {
        match cell {
            Cell::DateTime(dt) => index.push(*dt),
            Cell::Date(d) => match d.and_hms_opt(0, 0, 0) {
                Some(dt) => index.push(dt),
                None => return Err(invalid_timestamp(&raw.time.name, row, cell)),
            },
            other => return Err(invalid_timestamp(&raw.time.name, row, other)),
        }
    }

    check_unique(&raw.time.name, &index)?;
    check_sorted(&raw.time.name, &index)?;

    if raw.data.is_empty() {
        return Err(ValidationError::NoDataColumn);
    }
    for column in &raw.data {
        let bad = column
            .cells
            .iter()
            .enumerate()
            .find(|(_, c)| !matches!(c, Cell::Number(_) | Cell::Null));
        if let Some((row, cell)) = bad {
            return Err(ValidationError::NonNumeric {
                column: column.name.clone(),
                row,
                found: cell.to_string(),
            });
        }
    }

    logging::debug(
        Stage::Validate,
        None,
        &format!("{} rows x {} column(s) passed validation", index.len(), raw.data.len()),
    );
    Ok(())
}

/// Same checks as `validate`, for input that is already typed. Steps 2 and
/// the numeric half of 5 hold by construction.
pub(crate) fn check_typed(
    time_column: &str,
    index: &[NaiveDateTime],
    columns: &[Column],
) -> Result<(), ValidationError> {
    let names = columns.iter().map(|c| (c.name.as_str(), c.values.len()));
    check_shape(time_column, index.len(), names)?;
    check_unique(time_column, index)?;
    check_sorted(time_column, index)?;
    if columns.is_empty() {
        return Err(ValidationError::NoDataColumn);
    }
    Ok(())
}

/// Requires exactly `expected` data columns (the single-site operations).
pub fn require_columns(found: usize, expected: usize) -> Result<(), ValidationError> {
    if found != expected {
        return Err(ValidationError::ColumnCount { expected, found });
    }
    Ok(())
}

fn check_shape<'a>(
    time_column: &str,
    rows: usize,
    columns: impl Iterator<Item = (&'a str, usize)>,
) -> Result<(), ValidationError> {
    if time_column.trim().is_empty() {
        return Err(ValidationError::Shape("the temporal column has no name".to_string()));
    }
    let mut seen = HashSet::new();
    for (name, len) in columns {
        if name == time_column {
            return Err(ValidationError::Shape(format!(
                "data column `{}` shares its name with the temporal column",
                name
            )));
        }
        if !seen.insert(name) {
            return Err(ValidationError::Shape(format!("duplicate column name `{}`", name)));
        }
        if len != rows {
            return Err(ValidationError::Shape(format!(
                "column `{}` has {} rows but temporal column `{}` has {}",
                name, len, time_column, rows
            )));
        }
    }
    Ok(())
}

fn check_unique(time_column: &str, index: &[NaiveDateTime]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(index.len());
    for ts in index {
        if !seen.insert(*ts) {
            return Err(ValidationError::DuplicateTimestamp {
                column: time_column.to_string(),
                timestamp: *ts,
            });
        }
    }
    Ok(())
}

fn check_sorted(time_column: &str, index: &[NaiveDateTime]) -> Result<(), ValidationError> {
    match index.windows(2).position(|w| w[1] < w[0]) {
        Some(pos) => Err(ValidationError::Unsorted {
            column: time_column.to_string(),
            row: pos + 1,
            timestamp: index[pos + 1],
        }),
        None => Ok(()),
    }
}

fn invalid_timestamp(column: &str, row: usize, cell: &Cell) -> ValidationError {
    ValidationError::InvalidTimestamp {
        column: column.to_string(),
        row,
        found: cell.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
