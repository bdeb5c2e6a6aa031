//! Hydrological time-series regularization service.
//!
//! `analysis` holds the pure regularization engine (validation, step
//! inference, gap filling, daily aggregation, availability). `ingest`,
//! `sites`, `batch` and `config` are the collaborators that feed it export
//! files and write its results.

pub mod analysis;
pub mod batch;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod sites;

pub use analysis::{
    Aggregation, DailyOptions, aggregate_daily, availability, infer_step, is_daily, melt, pivot,
    regularize, regularize_to_step, validate,
};
pub use model::{
    AvailabilityRecord, AvailabilityReport, Cell, Column, Error, RawColumn, RawTable, Result,
    StepResult, TemporalKind, TimeSeries, ValidationError,
};
