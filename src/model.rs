//! Core data types for the hydrological series regularization service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the unvalidated `RawTable` handed over by ingestion, the validated
//! `TimeSeries`, step classification, availability records and the error
//! taxonomy. It contains no I/O.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Smallest timestamp delta (seconds) that may become a step candidate.
pub const DEFAULT_MIN_STEP_SECONDS: u64 = 60;

pub const SECONDS_PER_HOUR: i64 = 3_600;
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Expected number of samples in a day bucket. Assumes hourly input.
pub const HOURS_PER_DAY: usize = 24;

/// Mean tropical year, used for every length-in-years figure.
pub const DAYS_PER_YEAR: f64 = 365.2422;

/// Prefix of the value column produced by daily aggregation (`Agg_mean`, ...).
pub const AGG_COLUMN_PREFIX: &str = "Agg_";

/// Label holding the site/column identifier a derived series came from.
pub const LABEL_SITE: &str = "site";

/// Label holding the aggregation function name of a daily series.
pub const LABEL_AGGREGATION: &str = "aggregation";

// ---------------------------------------------------------------------------
// Raw (unvalidated) input
// ---------------------------------------------------------------------------

/// A loosely typed table cell as produced by an ingestion collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "null"),
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Date(d) => write!(f, "{}", d),
            Cell::DateTime(dt) => write!(f, "{}", dt),
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map(Cell::Number).unwrap_or(Cell::Null)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(dt: NaiveDateTime) -> Self {
        Cell::DateTime(dt)
    }
}

impl From<NaiveDate> for Cell {
    fn from(d: NaiveDate) -> Self {
        Cell::Date(d)
    }
}

/// A named column of raw cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
}

/// A time-indexed table exactly as received from a source, with no ordering,
/// uniqueness or typing guarantee. Only `analysis::validate` may turn it into
/// a `TimeSeries`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub time: RawColumn,
    pub data: Vec<RawColumn>,
}

impl RawTable {
    pub fn new(time: RawColumn, data: Vec<RawColumn>) -> Self {
        Self { time, data }
    }
}

// ---------------------------------------------------------------------------
// Validated series
// ---------------------------------------------------------------------------

/// Whether the temporal key holds calendar dates or full date-times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalKind {
    Date,
    DateTime,
}

/// One numeric data column. `None` is the single missing-value marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Column {
    /// Builds a column, folding NaN into `None`.
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(normalize_missing).collect(),
        }
    }

    /// Number of non-missing values.
    pub fn count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Maps NaN to the missing marker so counts, comparisons and fills see one
/// representation.
pub fn normalize_missing(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// A validated time series: unique ascending temporal key plus at least one
/// numeric column of equal length.
///
/// Every operation in `analysis` takes a `&TimeSeries` and returns a new
/// value; nothing mutates its input. Labels (`site`, `aggregation`, ...)
/// travel with the series through derived operations.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    time_column: String,
    kind: TemporalKind,
    index: Vec<NaiveDateTime>,
    columns: Vec<Column>,
    labels: BTreeMap<String, String>,
}

impl TimeSeries {
    /// Builds a series from typed parts, running the same ordered checks as
    /// the validator (shape, uniqueness, ordering, at least one column).
    pub fn new(
        time_column: impl Into<String>,
        kind: TemporalKind,
        index: Vec<NaiveDateTime>,
        columns: Vec<Column>,
    ) -> Result<Self, ValidationError> {
        let time_column = time_column.into();
        crate::analysis::validate::check_typed(&time_column, &index, &columns)?;
        Ok(Self::from_parts(time_column, kind, index, columns, BTreeMap::new()))
    }

    /// Validates a raw table and converts it into a series.
    pub fn from_raw(raw: RawTable) -> Result<Self, ValidationError> {
        crate::analysis::validate::validate(&raw)?;
        let kind = if raw.time.cells.iter().all(|c| matches!(c, Cell::Date(_))) {
            TemporalKind::Date
        } else {
            TemporalKind::DateTime
        };
        let index = raw
            .time
            .cells
            .iter()
            .filter_map(cell_to_datetime)
            .collect();
        let columns = raw
            .data
            .into_iter()
            .map(|col| {
                let values = col.cells.iter().map(cell_to_value).collect();
                Column::new(col.name, values)
            })
            .collect();
        Ok(Self::from_parts(raw.time.name, kind, index, columns, BTreeMap::new()))
    }

    /// Convenience constructor for the single-site case.
    pub fn single_site(
        time_column: impl Into<String>,
        site: impl Into<String>,
        readings: Vec<(NaiveDateTime, Option<f64>)>,
    ) -> Result<Self, ValidationError> {
        let (index, values): (Vec<_>, Vec<_>) = readings.into_iter().unzip();
        Self::new(
            time_column,
            TemporalKind::DateTime,
            index,
            vec![Column::new(site, values)],
        )
    }

    /// Assembles a series whose invariants the caller already guarantees.
    pub(crate) fn from_parts(
        time_column: String,
        kind: TemporalKind,
        index: Vec<NaiveDateTime>,
        columns: Vec<Column>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        let columns = columns
            .into_iter()
            .map(|c| Column::new(c.name, c.values))
            .collect();
        Self {
            time_column,
            kind,
            index,
            columns,
            labels,
        }
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    pub fn kind(&self) -> TemporalKind {
        self.kind
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.last().copied()
    }

    /// Values of every column at `row`, in column order.
    pub fn row(&self, row: usize) -> Option<(NaiveDateTime, Vec<Option<f64>>)> {
        let ts = *self.index.get(row)?;
        Some((ts, self.columns.iter().map(|c| c.values[row]).collect()))
    }

    /// `true` when every data column is missing at `row`.
    pub fn is_empty_row(&self, row: usize) -> bool {
        self.columns.iter().all(|c| c.values[row].is_none())
    }

    /// Returns a copy without rows where every data column is missing.
    pub fn drop_empty_rows(&self) -> TimeSeries {
        let keep: Vec<usize> = (0..self.len()).filter(|&i| !self.is_empty_row(i)).collect();
        self.take_rows(&keep)
    }

    /// Returns a copy restricted to the given row positions (ascending).
    pub(crate) fn take_rows(&self, rows: &[usize]) -> TimeSeries {
        let index = rows.iter().map(|&i| self.index[i]).collect();
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: rows.iter().map(|&i| c.values[i]).collect(),
            })
            .collect();
        TimeSeries {
            time_column: self.time_column.clone(),
            kind: self.kind,
            index,
            columns,
            labels: self.labels.clone(),
        }
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Re-keys the series under a different temporal kind (e.g. a daily
    /// series whose timestamps all sit on midnight).
    pub fn with_kind(mut self, kind: TemporalKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_time_column(mut self, name: impl Into<String>) -> Self {
        self.time_column = name.into();
        self
    }
}

fn cell_to_datetime(cell: &Cell) -> Option<NaiveDateTime> {
    match cell {
        Cell::DateTime(dt) => Some(*dt),
        Cell::Date(d) => d.and_hms_opt(0, 0, 0),
        _ => None,
    }
}

fn cell_to_value(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(v) => normalize_missing(Some(*v)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Derived results
// ---------------------------------------------------------------------------

/// Sampling-interval classification of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepResult {
    /// Zero or one non-empty row; the step is undefined.
    Empty,
    /// Deltas are not all whole multiples of the candidate step.
    Irregular,
    /// Every delta is a whole multiple of this many seconds.
    RegularSeconds(u64),
}

impl StepResult {
    pub fn seconds(&self) -> Option<u64> {
        match self {
            StepResult::RegularSeconds(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_regular(&self) -> bool {
        matches!(self, StepResult::RegularSeconds(_))
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Empty => write!(f, "empty"),
            StepResult::Irregular => write!(f, "irregular"),
            StepResult::RegularSeconds(n) => write!(f, "regular ({}s)", n),
        }
    }
}

/// Coverage statistics for one data column.
///
/// `start`, `end` and `length_years` are `None` when the column holds no
/// observation. `completeness_pct` is absent for irregular series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub site: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub length_years: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completeness_pct: Option<f64>,
}

/// Availability of every column of a table, together with the step the
/// completeness figures were computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub step: StepResult,
    pub records: Vec<AvailabilityRecord>,
}

impl AvailabilityReport {
    /// `false` for irregular series: the report carries no completeness column.
    pub fn has_completeness(&self) -> bool {
        self.step.is_regular()
    }

    pub fn record(&self, site: &str) -> Option<&AvailabilityRecord> {
        self.records.iter().find(|r| r.site == site)
    }
}

/// One non-missing observation in long (tidy) form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub time: NaiveDateTime,
    pub site: String,
    pub value: f64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Structural contract violations. The message text is part of the contract:
/// callers branch on it to decide between skipping a series and aborting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("series must have one temporal column and the rest numeric column(s): {0}")]
    Shape(String),
    #[error("wrong value in temporal column `{column}` at row {row}: `{found}` is not a date/time")]
    InvalidTimestamp {
        column: String,
        row: usize,
        found: String,
    },
    #[error("values in temporal column `{column}` must be unique: {timestamp} appears more than once")]
    DuplicateTimestamp {
        column: String,
        timestamp: NaiveDateTime,
    },
    #[error("temporal column `{column}` must be sorted in chronological order: {timestamp} at row {row} comes after a later value")]
    Unsorted {
        column: String,
        row: usize,
        timestamp: NaiveDateTime,
    },
    #[error("no data column exists in the series")]
    NoDataColumn,
    #[error("apart from the temporal column, all columns must be numeric: `{column}` holds `{found}` at row {row}")]
    NonNumeric {
        column: String,
        row: usize,
        found: String,
    },
    #[error("expected exactly {expected} data column(s), found {found}")]
    ColumnCount { expected: usize, found: usize },
}

/// Out-of-range or unreadable configuration, raised before any computation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`day_starts_at` must be an integer in [0, 23], got {0}")]
    DayStartOutOfRange(i64),
    #[error("`min_completeness` must be in [0, 1], got {0}")]
    CompletenessOutOfRange(f64),
    #[error("unknown aggregation function `{0}`")]
    UnknownAggregation(String),
    #[error("unknown log level `{0}`")]
    UnknownLogLevel(String),
    #[error("cannot read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse configuration {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Crate-level error for drivers that mix configuration, ingestion and
/// validation failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ingest(#[from] crate::ingest::IngestError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
