//! Field export CSV parsing
//!
//! Export files from the hydrological time-series server start with a block
//! of `#` metadata lines, then a two-column table:
//!
//! ```text
//! # 1043-837 Flow.Master@GS1234: Flow at Kaituna River
//! TimeStamp,Flow@GS1234
//! 2024-05-01 00:00:00,1.5
//! 2024-05-01 01:00:00,
//! ```
//!
//! The header's last column names `<Parameter>@<Plate>`; the metadata line
//! carrying the same plate names the unique id, label and description.
//! Empty or `null` cells are missing values and their rows are kept.

use chrono::NaiveDateTime;

use crate::ingest::IngestError;
use crate::model::{Column, TemporalKind, TimeSeries};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Parsed export
// ============================================================================

/// One export file: a single parameter at a single site.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedSeries {
    pub file: String,
    pub parameter: String,
    pub label: String,
    pub plate: String,
    /// Unique id with hyphens removed
    pub uid: String,
    pub description: String,
    pub readings: Vec<(NaiveDateTime, Option<f64>)>,
}

impl ExportedSeries {
    /// `<Parameter>.<Label>@<Plate>`
    pub fn ts_id(&self) -> String {
        format!("{}.{}@{}", self.parameter, self.label, self.plate)
    }

    /// Observed readings only.
    pub fn observed(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.readings.iter().filter_map(|(t, v)| v.map(|v| (*t, v)))
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse one export file. `file` is only used for error messages and
/// provenance.
pub fn parse_export(text: &str, file: &str) -> Result<ExportedSeries, IngestError> {
    let mut metadata = Vec::new();
    let mut header: Option<&str> = None;
    let mut data_start = 0;

    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('#') {
            metadata.push(trimmed);
            continue;
        }
        header = Some(trimmed);
        data_start = i + 1;
        break;
    }

    let header = header.ok_or_else(|| IngestError::MissingHeader {
        file: file.to_string(),
    })?;
    let value_column = header.rsplit(',').next().unwrap_or(header).trim();
    let (parameter, plate) = match value_column.rsplit_once('@') {
        Some((param, plate)) => (param.to_string(), plate.to_string()),
        None => (value_column.to_string(), String::new()),
    };

    let (uid, label, description) = parse_description(&metadata, &parameter, &plate);

    let mut readings = Vec::new();
    for (i, line) in text.lines().enumerate().skip(data_start) {
        if line.trim().is_empty() {
            continue; // Skip blank lines
        }
        let line_no = i + 1;
        let fields: Vec<&str> = line.split(',').collect();
        let timestamp_str = fields[0].trim();
        let timestamp = NaiveDateTime::parse_from_str(timestamp_str, TIMESTAMP_FORMAT)
            .map_err(|_| IngestError::BadTimestamp {
                file: file.to_string(),
                line: line_no,
                value: timestamp_str.to_string(),
            })?;
        let raw_value = fields.get(1).map(|s| s.trim()).unwrap_or("");
        let value = if raw_value.is_empty() || raw_value.eq_ignore_ascii_case("null") {
            None
        } else {
            Some(raw_value.parse::<f64>().map_err(|_| IngestError::BadValue {
                file: file.to_string(),
                line: line_no,
                value: raw_value.to_string(),
            })?)
        };
        readings.push((timestamp, value));
    }

    Ok(ExportedSeries {
        file: file.to_string(),
        parameter,
        label,
        plate,
        uid,
        description,
        readings,
    })
}

/// Extract (uid, label, description) from the metadata line
/// `# <uid> <Parameter>.<Label>@<Plate>: <Description>`.
fn parse_description(metadata: &[&str], parameter: &str, plate: &str) -> (String, String, String) {
    let plate_tag = format!("@{}", plate);
    let Some(line) = metadata
        .iter()
        .find(|l| !plate.is_empty() && l.contains(&plate_tag) && l.contains(": "))
    else {
        return (String::new(), String::new(), String::new());
    };

    let (head, description) = match line.rsplit_once(": ") {
        Some((h, d)) => (h, d.trim().to_string()),
        None => (*line, String::new()),
    };
    let head = head
        .trim_start_matches('#')
        .trim()
        .replace(&plate_tag, "")
        .replace(&format!("{}.", parameter), "");
    let (uid, label) = match head.split_once(' ') {
        Some((u, l)) => (u.replace('-', ""), l.trim().to_string()),
        None => (head.replace('-', ""), String::new()),
    };
    (uid, label, description)
}

// ============================================================================
// Output
// ============================================================================

/// Render a series as CSV: temporal column first, empty cells for missing.
/// Date-keyed series are written without a time of day.
pub fn render_wide_csv(series: &TimeSeries) -> String {
    let format = match series.kind() {
        TemporalKind::Date => DATE_FORMAT,
        TemporalKind::DateTime => TIMESTAMP_FORMAT,
    };

    let mut out = String::new();
    out.push_str(series.time_column());
    for name in series.column_names() {
        out.push(',');
        out.push_str(name);
    }
    out.push('\n');

    for (row, ts) in series.timestamps().iter().enumerate() {
        out.push_str(&ts.format(format).to_string());
        for column in series.columns() {
            out.push(',');
            if let Some(v) = column.values[row] {
                out.push_str(&v.to_string());
            }
        }
        out.push('\n');
    }
    out
}

/// Convert parsed exports that share one time grid into a wide table keyed
/// by `name_of(series)`.
pub fn exports_to_long(
    exports: &[ExportedSeries],
    name_of: impl Fn(&ExportedSeries) -> String,
) -> Vec<crate::model::LongRecord> {
    exports
        .iter()
        .flat_map(|e| {
            let site = name_of(e);
            e.observed().map(move |(time, value)| crate::model::LongRecord {
                time,
                site: site.clone(),
                value,
            })
        })
        .collect()
}

/// A single export as a one-column series named after its plate.
pub fn export_to_series(export: &ExportedSeries, time_column: &str) -> Result<TimeSeries, IngestError> {
    let (index, values): (Vec<_>, Vec<_>) = export.readings.iter().copied().unzip();
    let series = TimeSeries::new(
        time_column,
        TemporalKind::DateTime,
        index,
        vec![Column::new(export.plate.clone(), values)],
    )?;
    Ok(series.with_label(crate::model::LABEL_SITE, export.plate.clone()))
}

// ============================================================================
// Tests
// ============================================================================
