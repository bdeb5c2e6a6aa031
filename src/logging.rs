//! Structured logging for the regularization service
//!
//! Provides context-rich logging with pipeline stage and site identifiers,
//! timestamps, and severity levels. Supports both console output and
//! file-based logging for batch runs. The logger is installed as the `log`
//! facade backend, so library code only ever goes through `log` macros.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::model::ConfigError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }

    fn of(level: Level) -> Self {
        match level {
            Level::Error => LogLevel::Error,
            Level::Warn => LogLevel::Warning,
            Level::Info => LogLevel::Info,
            Level::Debug | Level::Trace => LogLevel::Debug,
        }
    }

    fn to_level(self) -> Level {
        match self {
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warning => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::UnknownLogLevel(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Validate,
    Step,
    Regularize,
    Aggregate,
    Availability,
    Batch,
    System,
}

impl Stage {
    /// Short label, also used as the `log` target.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Ingest => "INGEST",
            Stage::Validate => "VALID",
            Stage::Step => "STEP",
            Stage::Regularize => "FILL",
            Stage::Aggregate => "AGG",
            Stage::Availability => "AVAIL",
            Stage::Batch => "BATCH",
            Stage::System => "SYS",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - folder or site simply has nothing usable
    Expected,
    /// Unexpected failure - upstream data integrity or configuration problem
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
    /// Serializes file appends from worker threads
    file_lock: Mutex<()>,
}

impl Logger {
    pub fn new(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) -> Self {
        Logger {
            min_level,
            log_file,
            console_timestamps,
            file_lock: Mutex::new(()),
        }
    }

    fn format_entry(&self, level: LogLevel, target: &str, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        format!("{} {} {}: {}", timestamp, level, target, message)
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        LogLevel::of(metadata.level()) >= self.min_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = LogLevel::of(record.level());
        let target = record.target();
        let message = record.args().to_string();
        let log_entry = self.format_entry(level, target, &message);

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {} {}", target, message),
                LogLevel::Warning => eprintln!("   ⚠ {} {}", target, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn flush(&self) {}
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Install the logger as the global `log` backend.
///
/// Fails if another backend was installed first (e.g. by a second call).
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> Result<(), log::SetLoggerError> {
    let logger = Logger::new(min_level, log_file.map(String::from), console_timestamps);
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(min_level.to_level_filter());
    Ok(())
}

fn emit(level: LogLevel, stage: Stage, site_id: Option<&str>, message: &str) {
    match site_id {
        Some(site) => log::log!(target: stage.label(), level.to_level(), "[{}] {}", site, message),
        None => log::log!(target: stage.label(), level.to_level(), "{}", message),
    }
}

/// Log a general informational message
pub fn info(stage: Stage, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Info, stage, site_id, message);
}

/// Log a warning message
pub fn warn(stage: Stage, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Warning, stage, site_id, message);
}

/// Log an error message
pub fn error(stage: Stage, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Error, stage, site_id, message);
}

/// Log a debug message
pub fn debug(stage: Stage, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Debug, stage, site_id, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a per-series failure from its error message.
///
/// Validation messages are stable, so the text is enough to tell an empty
/// source (skip quietly) from a broken one (needs attention).
pub fn classify_series_failure(error_message: &str) -> FailureType {
    if error_message.contains("no data column")
        || error_message.contains("No CSV files")
        || error_message.contains("no data rows")
    {
        FailureType::Expected
    }
    // Integrity problems upstream: duplicated or reordered timestamps, text data
    else if error_message.contains("must be unique")
        || error_message.contains("chronological order")
        || error_message.contains("must be numeric")
        || error_message.contains("is not a date/time")
    {
        FailureType::Unexpected
    }
    // Configuration never fixes itself
    else if error_message.contains("must be an integer in [0, 23]")
        || error_message.contains("must be in [0, 1]")
    {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a series failure with automatic classification
pub fn log_series_failure(site: &str, operation: &str, err: &dyn std::error::Error) -> FailureType {
    let error_msg = err.to_string();
    let failure_type = classify_series_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(Stage::Batch, Some(site), &message),
        FailureType::Unexpected => error(Stage::Batch, Some(site), &message),
        FailureType::Unknown => warn(Stage::Batch, Some(site), &message),
    }
    failure_type
}

// ---------------------------------------------------------------------------
// Batch Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a batch run
pub fn log_batch_summary(total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Batch complete: {}/{} successful, {} failed",
        successful, total, failed
    );

    if failed == 0 {
        info(Stage::Batch, None, &message);
    } else if successful == 0 {
        error(Stage::Batch, None, &message);
    } else {
        warn(Stage::Batch, None, &message);
    }
}
