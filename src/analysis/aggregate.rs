//! Hourly to daily aggregation with a day-start offset and a completeness
//! threshold.
//!
//! # Day buckets
//! "The day starts at H" means a bucket spans (H:00, H:00 + 24h]. Each
//! timestamp is shifted back by `1 + H` hours and truncated to its date, so
//! with `H = 9` the values stamped 10:00 on day 1 through 09:00 on day 2 all
//! land in the bucket labelled day 1.
//!
//! # Completeness
//! The ratio is `observed / 24`. Input is assumed to be hourly; any other
//! resolution yields a meaningless ratio and is not guarded against.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};

use crate::analysis::regularize::regularize_to_step;
use crate::analysis::validate::require_columns;
use crate::logging::{self, Stage};
use crate::model::{
    AGG_COLUMN_PREFIX, Column, ConfigError, HOURS_PER_DAY, LABEL_AGGREGATION, LABEL_SITE, Result,
    SECONDS_PER_DAY, SECONDS_PER_HOUR, TemporalKind, TimeSeries,
};

/// Name of the temporal column of every daily output.
pub const DAILY_TIME_COLUMN: &str = "Date";

// ---------------------------------------------------------------------------
// Aggregation functions
// ---------------------------------------------------------------------------

/// Reduction applied to the non-missing values of one day bucket.
#[derive(Debug, Clone, Copy, Default)]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
    Min,
    Max,
    Median,
    Count,
    First,
    Last,
    /// A caller-supplied reduction and the name it is reported under.
    Custom(&'static str, fn(&[f64]) -> f64),
}

impl Aggregation {
    /// Identifying name, used in the output column and the series label.
    pub fn name(&self) -> &str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::Sum => "sum",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Median => "median",
            Aggregation::Count => "count",
            Aggregation::First => "first",
            Aggregation::Last => "last",
            Aggregation::Custom(name, _) => name,
        }
    }

    /// `Agg_<name>`, so runs with different functions stay distinguishable.
    pub fn column_name(&self) -> String {
        format!("{}{}", AGG_COLUMN_PREFIX, self.name())
    }

    /// Reduces `values`. Returns `None` for an empty slice or a NaN result.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let out = match self {
            Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            Aggregation::Count => values.len() as f64,
            Aggregation::First => values[0],
            Aggregation::Last => values[values.len() - 1],
            Aggregation::Custom(_, f) => f(values),
        };
        (!out.is_nan()).then_some(out)
    }
}

/// Built-in functions compare by variant. Custom functions compare by their
/// reported name, and never equal a built-in even when the names clash.
impl PartialEq for Aggregation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Aggregation::Custom(a, _), Aggregation::Custom(b, _)) => a == b,
            (Aggregation::Custom(..), _) | (_, Aggregation::Custom(..)) => false,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Aggregation {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" | "avg" => Ok(Aggregation::Mean),
            "sum" => Ok(Aggregation::Sum),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "median" => Ok(Aggregation::Median),
            "count" => Ok(Aggregation::Count),
            "first" => Ok(Aggregation::First),
            "last" => Ok(Aggregation::Last),
            _ => Err(ConfigError::UnknownAggregation(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Daily aggregation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyOptions {
    /// Hour (0-23) at which a day bucket ends.
    pub day_starts_at: i64,
    pub aggregation: Aggregation,
    /// Minimum fraction (0-1) of the 24 hourly values a bucket must hold.
    pub min_completeness: f64,
}

impl Default for DailyOptions {
    fn default() -> Self {
        Self {
            day_starts_at: 0,
            aggregation: Aggregation::Mean,
            min_completeness: 1.0,
        }
    }
}

impl DailyOptions {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(0..=23).contains(&self.day_starts_at) {
            return Err(ConfigError::DayStartOutOfRange(self.day_starts_at));
        }
        if !(0.0..=1.0).contains(&self.min_completeness) {
            return Err(ConfigError::CompletenessOutOfRange(self.min_completeness));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// Non-missing values of one day bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub values: Vec<f64>,
}

impl DayBucket {
    /// `observed / 24`.
    pub fn completeness(&self) -> f64 {
        self.values.len() as f64 / HOURS_PER_DAY as f64
    }
}

/// Groups the non-missing values of a single-column series into day buckets
/// ending at `day_starts_at`:00. Buckets come out in date order; days with no
/// observation produce no bucket.
pub fn day_buckets(series: &TimeSeries, day_starts_at: i64) -> Result<Vec<DayBucket>> {
    if !(0..=23).contains(&day_starts_at) {
        return Err(ConfigError::DayStartOutOfRange(day_starts_at).into());
    }
    require_columns(series.columns().len(), 1)?;

    let shift = Duration::seconds(SECONDS_PER_HOUR * (1 + day_starts_at));
    let values = &series.columns()[0].values;
    let mut buckets: Vec<DayBucket> = Vec::new();
    for (ts, value) in series.timestamps().iter().zip(values) {
        let Some(v) = value else { continue };
        let date = (*ts - shift).date();
        match buckets.last_mut() {
            Some(b) if b.date == date => b.values.push(*v),
            _ => buckets.push(DayBucket {
                date,
                values: vec![*v],
            }),
        }
    }
    Ok(buckets)
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregates an hourly single-site series into a gap-filled daily series.
///
/// Buckets below `min_completeness` are dropped and then come back as
/// missing rows when the daily grid is filled. The result is keyed by
/// `Date`, holds one `Agg_<name>` column and carries the `site` and
/// `aggregation` labels.
pub fn aggregate_daily(series: &TimeSeries, options: &DailyOptions) -> Result<TimeSeries> {
    options.validate()?;
    require_columns(series.columns().len(), 1)?;
    let site = series.columns()[0].name.clone();

    let buckets = day_buckets(series, options.day_starts_at)?;
    let total = buckets.len();

    let mut index = Vec::with_capacity(total);
    let mut values = Vec::with_capacity(total);
    for bucket in buckets {
        if bucket.completeness() < options.min_completeness {
            continue;
        }
        if let Some(midnight) = bucket.date.and_hms_opt(0, 0, 0) {
            index.push(midnight);
            values.push(options.aggregation.apply(&bucket.values));
        }
    }

    if index.len() < total {
        logging::debug(
            Stage::Aggregate,
            Some(&site),
            &format!(
                "{} of {} day bucket(s) below completeness {}",
                total - index.len(),
                total,
                options.min_completeness
            ),
        );
    }

    let mut labels = series.labels().clone();
    labels.insert(LABEL_SITE.to_string(), site);
    labels.insert(LABEL_AGGREGATION.to_string(), options.aggregation.name().to_string());

    let daily = TimeSeries::from_parts(
        DAILY_TIME_COLUMN.to_string(),
        TemporalKind::Date,
        index,
        vec![Column::new(options.aggregation.column_name(), values)],
        labels,
    );
    Ok(regularize_to_step(&daily, SECONDS_PER_DAY))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Error, ValidationError};
    use chrono::NaiveDateTime;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, 0, 0).unwrap()
    }

    /// Hourly values for `hours` consecutive hours starting at `start`.
    fn hourly_from(start: NaiveDateTime, hours: i64, value: impl Fn(i64) -> Option<f64>) -> TimeSeries {
        let readings = (0..hours).map(|h| (start + Duration::hours(h), value(h))).collect();
        TimeSeries::single_site("Time", "Kaituna", readings).expect("valid series")
    }

    #[test]
    fn test_day_starting_at_nine_collects_ten_through_nine() {
        let ts = hourly_from(at(1, 10), 24, |h| Some(h as f64 + 1.0));
        let options = DailyOptions {
            day_starts_at: 9,
            ..DailyOptions::default()
        };
        let out = aggregate_daily(&ts, &options).expect("aggregation succeeds");

        assert_eq!(out.len(), 1, "all 24 values belong to one bucket");
        assert_eq!(out.timestamps()[0], at(1, 0));
        // mean of 1..=24
        assert_eq!(out.column("Agg_mean").unwrap().values, vec![Some(12.5)]);
        assert_eq!(out.kind(), TemporalKind::Date);
        assert_eq!(out.time_column(), "Date");
    }

    #[test]
    fn test_midnight_day_start_puts_midnight_into_previous_day() {
        // 01:00..=00:00(next day) is one bucket with the default offset.
        let ts = hourly_from(at(1, 1), 24, |_| Some(1.0));
        let buckets = day_buckets(&ts, 0).unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].date, day(1));
        assert_eq!(buckets[0].completeness(), 1.0);
    }

    #[test]
    fn test_incomplete_bucket_is_dropped_then_restored_as_missing() {
        // Day 1 complete, day 2 has 10 of 24 hours, day 3 complete.
        let ts = hourly_from(at(1, 1), 72, |h| {
            let in_day2 = (24..48).contains(&h);
            if in_day2 && h >= 34 { None } else { Some(2.0) }
        });
        let options = DailyOptions {
            min_completeness: 0.5,
            ..DailyOptions::default()
        };
        let out = aggregate_daily(&ts, &options).unwrap();
        assert_eq!(out.timestamps(), &[at(1, 0), at(2, 0), at(3, 0)]);
        assert_eq!(
            out.column("Agg_mean").unwrap().values,
            vec![Some(2.0), None, Some(2.0)],
            "the 10/24 bucket must come back as a missing day"
        );
    }

    #[test]
    fn test_partial_bucket_kept_when_threshold_allows() {
        let ts = hourly_from(at(1, 1), 12, |_| Some(4.0));
        let options = DailyOptions {
            min_completeness: 0.5,
            aggregation: Aggregation::Sum,
            ..DailyOptions::default()
        };
        let out = aggregate_daily(&ts, &options).unwrap();
        assert_eq!(out.column("Agg_sum").unwrap().values, vec![Some(48.0)]);
    }

    #[test]
    fn test_labels_record_site_and_function() {
        let ts = hourly_from(at(1, 1), 24, |_| Some(1.0));
        let options = DailyOptions {
            aggregation: Aggregation::Max,
            ..DailyOptions::default()
        };
        let out = aggregate_daily(&ts, &options).unwrap();
        assert_eq!(out.label(LABEL_SITE), Some("Kaituna"));
        assert_eq!(out.label(LABEL_AGGREGATION), Some("max"));
        assert_eq!(out.column_names(), vec!["Agg_max"]);
    }

    #[test]
    fn test_day_start_out_of_range_is_config_error() {
        let ts = hourly_from(at(1, 1), 24, |_| Some(1.0));
        let options = DailyOptions {
            day_starts_at: 24,
            ..DailyOptions::default()
        };
        assert!(matches!(
            aggregate_daily(&ts, &options),
            Err(Error::Config(ConfigError::DayStartOutOfRange(24)))
        ));
    }

    #[test]
    fn test_completeness_out_of_range_is_config_error() {
        let ts = hourly_from(at(1, 1), 24, |_| Some(1.0));
        let options = DailyOptions {
            min_completeness: 1.5,
            ..DailyOptions::default()
        };
        assert!(matches!(
            aggregate_daily(&ts, &options),
            Err(Error::Config(ConfigError::CompletenessOutOfRange(_)))
        ));
    }

    #[test]
    fn test_multi_column_input_is_rejected() {
        let ts = TimeSeries::new(
            "Time",
            TemporalKind::DateTime,
            vec![at(1, 1)],
            vec![Column::new("A", vec![Some(1.0)]), Column::new("B", vec![Some(2.0)])],
        )
        .unwrap();
        assert!(matches!(
            aggregate_daily(&ts, &DailyOptions::default()),
            Err(Error::Validation(ValidationError::ColumnCount { expected: 1, found: 2 }))
        ));
    }

    #[test]
    fn test_custom_aggregation_names_the_column() {
        fn range(v: &[f64]) -> f64 {
            let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = v.iter().copied().fold(f64::INFINITY, f64::min);
            max - min
        }
        let ts = hourly_from(at(1, 1), 24, |h| Some(h as f64));
        let options = DailyOptions {
            aggregation: Aggregation::Custom("range", range),
            ..DailyOptions::default()
        };
        let out = aggregate_daily(&ts, &options).unwrap();
        assert_eq!(out.column("Agg_range").unwrap().values, vec![Some(23.0)]);
    }

    #[test]
    fn test_aggregation_parsing_and_reductions() {
        assert_eq!("Mean".parse::<Aggregation>().unwrap(), Aggregation::Mean);
        assert!(matches!(
            "geomean".parse::<Aggregation>(),
            Err(ConfigError::UnknownAggregation(_))
        ));
        assert_eq!(Aggregation::Median.apply(&[3.0, 1.0, 2.0, 10.0]), Some(2.5));
        assert_eq!(Aggregation::Last.apply(&[3.0, 1.0]), Some(1.0));
        assert_eq!(Aggregation::Mean.apply(&[]), None);
    }

    #[test]
    fn test_custom_function_never_equals_builtin() {
        fn mean_like(v: &[f64]) -> f64 {
            v.iter().sum::<f64>() / v.len() as f64
        }
        let custom = Aggregation::Custom("mean", mean_like);
        assert_ne!(custom, Aggregation::Mean, "a custom reduction is not the built-in one");
        assert_eq!(custom, Aggregation::Custom("mean", mean_like));
        assert_ne!(Aggregation::Sum, Aggregation::Max);
        assert_eq!(Aggregation::Median, Aggregation::Median);
    }
}
