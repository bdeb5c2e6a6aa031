//! Ingestion collaborators.
//!
//! These sit outside the regularization core: they read whatever a source
//! provides and hand the core an unvalidated `RawTable`. Nothing here orders,
//! deduplicates or range-checks values.

pub mod export_csv;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::model::{Cell, RawColumn, RawTable, ValidationError};

pub use export_csv::{ExportedSeries, parse_export, render_wide_csv};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No CSV files in folder {folder}")]
    NoFiles { folder: String },
    #[error("{file}: no header row found")]
    MissingHeader { file: String },
    #[error("{file} line {line}: cannot parse timestamp `{value}`")]
    BadTimestamp {
        file: String,
        line: usize,
        value: String,
    },
    #[error("{file} line {line}: cannot parse value `{value}`")]
    BadValue {
        file: String,
        line: usize,
        value: String,
    },
    #[error("cannot parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl IngestError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Source abstraction
// ---------------------------------------------------------------------------

/// Anything that can return the observations of one site and measurement
/// over a date range. An empty vector means "nothing available".
pub trait SeriesSource {
    fn fetch(
        &self,
        site: &str,
        measurement: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<(NaiveDateTime, Option<f64>)>, IngestError>;
}

/// A directory of field export CSV files.
#[derive(Debug, Clone)]
pub struct ExportFolder {
    root: PathBuf,
}

impl ExportFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder name, used as the unit-of-work identifier in batch runs.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    /// CSV files directly inside the folder, sorted by name.
    pub fn csv_files(&self) -> Result<Vec<PathBuf>, IngestError> {
        let entries = fs::read_dir(&self.root).map_err(|e| IngestError::io(&self.root, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| IngestError::io(&self.root, e))?.path();
            let is_csv = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false);
            if path.is_file() && is_csv {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Parses every CSV file in the folder.
    pub fn read_all(&self) -> Result<Vec<ExportedSeries>, IngestError> {
        self.csv_files()?
            .iter()
            .map(|path| {
                let text = fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
                let file = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                parse_export(&text, &file)
            })
            .collect()
    }
}

impl SeriesSource for ExportFolder {
    fn fetch(
        &self,
        site: &str,
        measurement: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<(NaiveDateTime, Option<f64>)>, IngestError> {
        let mut out: Vec<(NaiveDateTime, Option<f64>)> = self
            .read_all()?
            .into_iter()
            .filter(|s| s.plate == site && s.parameter == measurement)
            .flat_map(|s| s.readings)
            .filter(|(t, _)| *t >= start && *t <= end)
            .collect();
        out.sort_by_key(|(t, _)| *t);
        Ok(out)
    }
}

/// Wraps fetched readings as a single-site raw table for validation.
pub fn readings_to_raw(
    time_column: &str,
    site: &str,
    readings: &[(NaiveDateTime, Option<f64>)],
) -> RawTable {
    let time = readings.iter().map(|(t, _)| Cell::DateTime(*t)).collect();
    let values = readings.iter().map(|(_, v)| Cell::from(*v)).collect();
    RawTable::new(
        RawColumn::new(time_column, time),
        vec![RawColumn::new(site, values)],
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
