//! Regularization and resampling engine.
//!
//! Every function here is a pure function of a validated `TimeSeries` plus
//! explicit configuration. Inputs are never mutated, so independent series
//! can be processed on separate threads without coordination.
//!
//! Submodules:
//! - `validate`    : structural checks that gate every other operation.
//! - `step`        : sampling-interval inference.
//! - `regularize`  : gap filling onto the inferred grid.
//! - `aggregate`   : hourly to daily buckets with completeness rules.
//! - `availability`: per-column coverage statistics.
//! - `reshape`     : wide ⇄ long conversion.

pub mod aggregate;
pub mod availability;
pub mod regularize;
pub mod reshape;
pub mod step;
pub mod validate;

pub use aggregate::{Aggregation, DailyOptions, aggregate_daily};
pub use availability::availability;
pub use regularize::{regularize, regularize_to_step};
pub use reshape::{melt, pivot};
pub use step::{infer_step, is_daily};
pub use validate::validate;
