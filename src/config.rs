//! Service configuration.
//!
//! Settings come from a TOML file whose path is given on the command line
//! or through `HYDROREG_CONFIG` (a `.env` file is honoured). Every section
//! and key is optional:
//!
//! ```toml
//! [analysis]
//! minimum_time_step_in_second = 60
//!
//! [daily]
//! enabled = true
//! day_starts_at = 9
//! aggregation = "sum"
//! min_completeness = 0.8
//!
//! [batch]
//! input_dir = "out/csv"
//! info_dir = "info"
//! output_dir = "out"
//!
//! [logging]
//! level = "debug"
//! file = "hydroreg.log"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::analysis::{Aggregation, DailyOptions};
use crate::logging::LogLevel;
use crate::model::{ConfigError, DEFAULT_MIN_STEP_SECONDS};

pub const CONFIG_ENV_VAR: &str = "HYDROREG_CONFIG";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub analysis: AnalysisConfig,
    pub daily: DailyConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Deltas below this are timing noise and never become the step.
    pub minimum_time_step_in_second: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            minimum_time_step_in_second: DEFAULT_MIN_STEP_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DailyConfig {
    /// Produce daily aggregates for every site in the batch.
    pub enabled: bool,
    pub day_starts_at: i64,
    pub aggregation: String,
    pub min_completeness: f64,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            day_starts_at: 0,
            aggregation: "mean".to_string(),
            min_completeness: 1.0,
        }
    }
}

impl DailyConfig {
    pub fn aggregation(&self) -> Result<Aggregation, ConfigError> {
        self.aggregation.parse()
    }

    /// Checked options for `aggregate_daily`.
    pub fn options(&self) -> Result<DailyOptions, ConfigError> {
        let options = DailyOptions {
            day_starts_at: self.day_starts_at,
            aggregation: self.aggregation()?,
            min_completeness: self.min_completeness,
        };
        options.validate()?;
        Ok(options)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// One sub-folder of export CSVs per unit of work.
    pub input_dir: PathBuf,
    /// Holds `plate_info.json` and `param_info.json`.
    pub info_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("out/csv"),
            info_dir: PathBuf::from("info"),
            output_dir: PathBuf::from("out"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            console_timestamps: true,
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<LogLevel, ConfigError> {
        self.level.parse()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Settings {
    /// Reads and validates a TOML settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::parse(&text, &path.display().to_string())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads `.env`, then the file named by `HYDROREG_CONFIG`; defaults when
    /// the variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim())),
            _ => Ok(Self::default()),
        }
    }

    /// Parses TOML text; `origin` only names the source in errors.
    pub fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Range-checks every value the core will consume.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.daily.options()?;
        self.logging.level()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
