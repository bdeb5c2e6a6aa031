//! Batch regularization of export folders.
//!
//! Every sub-folder of the input directory is one unit of work: its export
//! CSVs are parsed, summarised and, when they describe one parameter at
//! distinct sites on a common regular grid, pivoted into a single wide table
//! and gap-filled. Folders share nothing mutable and run concurrently.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::analysis::aggregate::DAILY_TIME_COLUMN;
use crate::analysis::step::{infer_step_from_timestamps, is_daily_timestamps};
use crate::analysis::{DailyOptions, aggregate_daily, availability, pivot, regularize};
use crate::config::Settings;
use crate::ingest::export_csv::exports_to_long;
use crate::ingest::{ExportFolder, ExportedSeries, IngestError, render_wide_csv};
use crate::logging::{self, Stage};
use crate::model::{
    AvailabilityReport, Column, Error, LABEL_SITE, Result, SECONDS_PER_DAY, StepResult, TemporalKind,
    TimeSeries,
};
use crate::sites::SiteCatalog;

/// Temporal column of sub-daily wide tables.
pub const WIDE_TIME_COLUMN: &str = "Time";
pub const REPORT_FILE: &str = "batch_report.json";

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub enum FolderStatus {
    /// Every file read, wide table built, every daily aggregate produced.
    Success,
    /// Files read, but the wide table or some daily aggregate was not built.
    PartialSuccess,
    /// Nothing usable could be read.
    Failed,
}

/// Why a folder was not turned into a wide table.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum WideRefusal {
    /// Several files share a plate.
    DuplicatePlates { files: Vec<String> },
    /// Files mix parameters or units.
    NonUniformParameter,
    /// The union of timestamps is irregular or steps by more than a day.
    UnsuitableStep { step: StepResult },
}

impl std::fmt::Display for WideRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WideRefusal::DuplicatePlates { files } => {
                write!(f, "duplicated site names from files: {}", files.join(", "))
            }
            WideRefusal::NonUniformParameter => write!(f, "unit and parameter are not uniform"),
            WideRefusal::UnsuitableStep { step } => {
                write!(f, "time step is {}; need a regular step of at most one day", step)
            }
        }
    }
}

/// Data range of one export file, over observed values only.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RangeSummary {
    pub file: String,
    pub ts_id: String,
    pub plate: String,
    pub name: String,
    pub unit: Option<String>,
    pub description: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub min: Option<f64>,
    pub time_min: Option<NaiveDateTime>,
    pub max: Option<f64>,
    pub time_max: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderReport {
    pub folder: String,
    pub status: FolderStatus,
    pub files_read: Vec<String>,
    pub wide_refused: Option<WideRefusal>,
    pub step: Option<StepResult>,
    pub availability: Option<AvailabilityReport>,
    pub ranges: Vec<RangeSummary>,
    pub daily_sites: Vec<String>,
    pub error_message: Option<String>,
    #[serde(skip)]
    pub wide: Option<TimeSeries>,
    #[serde(skip)]
    pub daily: Vec<TimeSeries>,
}

impl FolderReport {
    fn failed(folder: String, message: String) -> Self {
        FolderReport {
            folder,
            status: FolderStatus::Failed,
            files_read: Vec::new(),
            wide_refused: None,
            step: None,
            availability: None,
            ranges: Vec::new(),
            daily_sites: Vec::new(),
            error_message: Some(message),
            wide: None,
            daily: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub partial: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: String,
    pub input_dir: String,
    pub folders: Vec<FolderReport>,
    pub summary: BatchSummary,
}

// ============================================================================
// Options
// ============================================================================

/// Checked, copyable view of the settings each worker needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchOptions {
    pub min_step_seconds: u64,
    /// `None` when daily aggregation is disabled.
    pub daily: Option<DailyOptions>,
}

impl BatchOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let daily = if settings.daily.enabled {
            Some(settings.daily.options()?)
        } else {
            None
        };
        Ok(Self {
            min_step_seconds: settings.analysis.minimum_time_step_in_second,
            daily,
        })
    }
}

// ============================================================================
// Per-folder processing
// ============================================================================

/// Range summary of one export, rounded to three decimals like the data
/// range sheets it replaces.
pub fn range_summary(export: &ExportedSeries, catalog: &SiteCatalog) -> RangeSummary {
    let mut start = None;
    let mut end = None;
    let mut min: Option<(f64, NaiveDateTime)> = None;
    let mut max: Option<(f64, NaiveDateTime)> = None;

    for (t, v) in export.observed() {
        start = Some(start.map_or(t, |s: NaiveDateTime| s.min(t)));
        end = Some(end.map_or(t, |e: NaiveDateTime| e.max(t)));
        // First occurrence wins on ties
        if min.is_none_or(|(m, _)| v < m) {
            min = Some((v, t));
        }
        if max.is_none_or(|(m, _)| v > m) {
            max = Some((v, t));
        }
    }

    RangeSummary {
        file: export.file.clone(),
        ts_id: export.ts_id(),
        plate: export.plate.clone(),
        name: catalog.display_name(&export.plate),
        unit: catalog.unit(&export.parameter).map(String::from),
        description: export.description.clone(),
        start,
        end,
        min: min.map(|(v, _)| round3(v)),
        time_min: min.map(|(_, t)| t),
        max: max.map(|(v, _)| round3(v)),
        time_max: max.map(|(_, t)| t),
    }
}

fn round3(v: f64) -> f64 {
    (v * 1_000.0).round() / 1_000.0
}

/// Checks the three conditions for a wide table and returns the step of the
/// union of timestamps when they hold.
pub fn check_wide_form(
    exports: &[ExportedSeries],
    catalog: &SiteCatalog,
    min_step_seconds: u64,
) -> std::result::Result<(StepResult, Vec<NaiveDateTime>), WideRefusal> {
    let mut files_by_plate: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for e in exports {
        files_by_plate.entry(&e.plate).or_default().push(&e.file);
    }
    let mut duplicated: Vec<String> = files_by_plate
        .values()
        .filter(|files| files.len() > 1)
        .flatten()
        .map(|f| f.to_string())
        .collect();
    if !duplicated.is_empty() {
        duplicated.sort();
        return Err(WideRefusal::DuplicatePlates { files: duplicated });
    }

    let kinds: HashSet<(Option<&str>, &str)> = exports
        .iter()
        .map(|e| (catalog.unit(&e.parameter), e.parameter.as_str()))
        .collect();
    if kinds.len() > 1 {
        return Err(WideRefusal::NonUniformParameter);
    }

    let union: Vec<NaiveDateTime> = exports
        .iter()
        .flat_map(|e| e.readings.iter().map(|(t, _)| *t))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let step = infer_step_from_timestamps(&union, min_step_seconds);
    match step {
        StepResult::Irregular => Err(WideRefusal::UnsuitableStep { step }),
        StepResult::RegularSeconds(s) if s > SECONDS_PER_DAY => {
            Err(WideRefusal::UnsuitableStep { step })
        }
        _ => Ok((step, union)),
    }
}

/// Pivots the folder's exports by site name and fills the gaps. Sites that
/// never report a value keep an all-missing column, in file order.
fn build_wide(
    exports: &[ExportedSeries],
    catalog: &SiteCatalog,
    union: &[NaiveDateTime],
    min_step_seconds: u64,
) -> Result<TimeSeries> {
    let (time_column, kind) = if is_daily_timestamps(union, min_step_seconds) {
        (DAILY_TIME_COLUMN, TemporalKind::Date)
    } else {
        (WIDE_TIME_COLUMN, TemporalKind::DateTime)
    };
    let mut sites: Vec<String> = Vec::with_capacity(exports.len());
    for e in exports {
        let site = catalog.display_name(&e.plate);
        if !sites.contains(&site) {
            sites.push(site);
        }
    }

    let long = exports_to_long(exports, |e| catalog.display_name(&e.plate));
    let (index, mut columns) = if long.is_empty() {
        (union.to_vec(), Vec::new())
    } else {
        let pivoted = pivot(&long, time_column, kind)?;
        (pivoted.timestamps().to_vec(), pivoted.columns().to_vec())
    };
    for site in sites {
        if !columns.iter().any(|c| c.name == site) {
            columns.push(Column::new(site, vec![None; index.len()]));
        }
    }

    let wide = TimeSeries::new(time_column, kind, index, columns)?;
    Ok(regularize(&wide, min_step_seconds))
}

/// Processes one folder. Never panics and never returns an error: every
/// failure ends up in the report.
pub fn process_folder(
    folder: &ExportFolder,
    catalog: &SiteCatalog,
    options: &BatchOptions,
) -> FolderReport {
    let name = folder.name();

    let exports = match folder.read_all() {
        Ok(exports) if exports.is_empty() => {
            let err = IngestError::NoFiles {
                folder: folder.root().display().to_string(),
            };
            logging::log_series_failure(&name, "read", &err);
            return FolderReport::failed(name, err.to_string());
        }
        Ok(exports) => exports,
        Err(e) => {
            logging::log_series_failure(&name, "read", &e);
            return FolderReport::failed(name, e.to_string());
        }
    };
    logging::info(
        Stage::Ingest,
        Some(&name),
        &format!("read {} export file(s)", exports.len()),
    );

    let mut report = FolderReport {
        folder: name.clone(),
        status: FolderStatus::Success,
        files_read: exports.iter().map(|e| e.file.clone()).collect(),
        wide_refused: None,
        step: None,
        availability: None,
        ranges: exports.iter().map(|e| range_summary(e, catalog)).collect(),
        daily_sites: Vec::new(),
        error_message: None,
        wide: None,
        daily: Vec::new(),
    };

    match check_wide_form(&exports, catalog, options.min_step_seconds) {
        Ok((step, union)) => {
            report.step = Some(step);
            match build_wide(&exports, catalog, &union, options.min_step_seconds) {
                Ok(wide) => {
                    report.availability = availability(&wide, options.min_step_seconds);
                    report.wide = Some(wide);
                }
                Err(e) => {
                    logging::log_series_failure(&name, "wide table", &e);
                    report.error_message = Some(e.to_string());
                    report.status = FolderStatus::PartialSuccess;
                }
            }
        }
        Err(refusal) => {
            logging::info(
                Stage::Batch,
                Some(&name),
                &format!("wide format skipped: {}", refusal),
            );
            report.wide_refused = Some(refusal);
            report.status = FolderStatus::PartialSuccess;
        }
    }

    if let Some(daily) = options.daily {
        for export in &exports {
            let site = catalog.display_name(&export.plate);
            let result = TimeSeries::single_site(WIDE_TIME_COLUMN, site.clone(), export.readings.clone())
                .map_err(Error::from)
                .and_then(|series| aggregate_daily(&series, &daily));
            match result {
                Ok(series) => {
                    report.daily_sites.push(site);
                    report.daily.push(series.with_label("plate", export.plate.clone()));
                }
                Err(e) => {
                    logging::log_series_failure(&site, "daily aggregation", &e);
                    report.status = FolderStatus::PartialSuccess;
                }
            }
        }
    }

    report
}

// ============================================================================
// Batch driver
// ============================================================================

/// Sub-folders of `input_dir`, sorted by name.
pub fn discover_folders(input_dir: &Path) -> std::result::Result<Vec<ExportFolder>, IngestError> {
    if !input_dir.is_dir() {
        return Err(IngestError::io(
            input_dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "folder doesn't exist"),
        ));
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(input_dir).map_err(|e| IngestError::io(input_dir, e))? {
        let path = entry.map_err(|e| IngestError::io(input_dir, e))?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs.into_iter().map(ExportFolder::new).collect())
}

/// Runs every folder of the configured input directory.
///
/// Configuration problems and an unreadable input directory abort the run;
/// anything wrong inside a folder only marks that folder.
pub fn run_batch(settings: &Settings) -> Result<BatchReport> {
    let options = BatchOptions::from_settings(settings)?;
    let catalog = SiteCatalog::load(&settings.batch.info_dir)?;
    let folders = discover_folders(&settings.batch.input_dir)?;

    logging::info(
        Stage::Batch,
        None,
        &format!(
            "processing {} folder(s) from {}",
            folders.len(),
            settings.batch.input_dir.display()
        ),
    );

    let reports: Vec<FolderReport> = folders
        .par_iter()
        .map(|folder| process_folder(folder, &catalog, &options))
        .collect();

    let mut summary = BatchSummary {
        total: reports.len(),
        ..BatchSummary::default()
    };
    for r in &reports {
        match r.status {
            FolderStatus::Success => summary.successful += 1,
            FolderStatus::PartialSuccess => summary.partial += 1,
            FolderStatus::Failed => summary.failed += 1,
        }
    }
    logging::log_batch_summary(
        summary.total,
        summary.successful + summary.partial,
        summary.failed,
    );

    Ok(BatchReport {
        generated_at: Utc::now().to_rfc3339(),
        input_dir: settings.batch.input_dir.display().to_string(),
        folders: reports,
        summary,
    })
}

/// Writes `<folder>_wide.csv`, `<folder>_<plate>_daily.csv` and
/// `batch_report.json` into `output_dir`. Returns the files written.
pub fn write_outputs(report: &BatchReport, output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    for folder in &report.folders {
        if let Some(wide) = &folder.wide {
            let path = output_dir.join(format!("{}_wide.csv", folder.folder));
            fs::write(&path, render_wide_csv(wide))?;
            written.push(path);
        }
        for daily in &folder.daily {
            let tag = daily
                .label("plate")
                .or_else(|| daily.label(LABEL_SITE))
                .unwrap_or("site");
            let path = output_dir.join(format!("{}_{}_daily.csv", folder.folder, file_safe(tag)));
            fs::write(&path, render_wide_csv(daily))?;
            written.push(path);
        }
    }

    let path = output_dir.join(REPORT_FILE);
    fs::write(&path, serde_json::to_string_pretty(report)?)?;
    written.push(path);
    Ok(written)
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

pub fn print_summary(report: &BatchReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 REGULARIZATION SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    for folder in &report.folders {
        match folder.status {
            FolderStatus::Success => println!(
                "  ✓ {:<24} {} file(s), step {}",
                folder.folder,
                folder.files_read.len(),
                folder.step.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
            ),
            FolderStatus::PartialSuccess => println!(
                "  ⚠ {:<24} {} file(s), {}",
                folder.folder,
                folder.files_read.len(),
                folder
                    .wide_refused
                    .as_ref()
                    .map(|r| format!("wide skipped: {}", r))
                    .or_else(|| folder.error_message.clone())
                    .unwrap_or_else(|| "some daily aggregates failed".to_string())
            ),
            FolderStatus::Failed => println!(
                "  ✗ {:<24} FAILED: {}",
                folder.folder,
                folder.error_message.as_deref().unwrap_or("Unknown")
            ),
        }
    }
    println!();

    let s = &report.summary;
    let working = s.successful + s.partial;
    let success_rate = if s.total > 0 {
        (working as f64 / s.total as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Folders: {}/{} usable  ({} partial, {} failed)",
        working, s.total, s.partial, s.failed
    );
    println!("Overall Success Rate: {:.1}%", success_rate);
    println!("═══════════════════════════════════════════════════════════");
}

// ============================================================================
// Tests
// ============================================================================
