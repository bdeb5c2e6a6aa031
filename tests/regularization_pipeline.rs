/// End-to-end tests for the regularization pipeline
///
/// These tests verify:
/// 1. Export CSV folders are read, summarised and pivoted into wide tables
/// 2. Gaps in the common hourly grid come back as missing rows
/// 3. Folders unfit for a wide table are reported, not dropped
/// 4. Daily aggregation and availability run from the same settings
/// 5. Outputs (wide CSVs, daily CSVs, JSON report) land in the output folder
///
/// Everything runs against temporary directories; no network or database.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use hydroreg_service::batch::{self, FolderStatus, WideRefusal};
use hydroreg_service::config::Settings;
use hydroreg_service::ingest::{ExportFolder, SeriesSource, readings_to_raw};
use hydroreg_service::{
    Aggregation, DailyOptions, StepResult, TemporalKind, TimeSeries, aggregate_daily,
    availability, regularize,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn export_text(parameter: &str, plate: &str, rows: &[(&str, &str)]) -> String {
    let mut text = String::from("# Data export\n#\n");
    text.push_str(&format!(
        "# 1043-837 {}.Master@{}: {} at {}\n",
        parameter, plate, parameter, plate
    ));
    text.push_str(&format!("TimeStamp,{}@{}\n", parameter, plate));
    for (ts, value) in rows {
        text.push_str(&format!("{},{}\n", ts, value));
    }
    text
}

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Three folders: a clean two-site hourly folder, a folder mixing
/// parameters and an empty folder.
fn write_fixture(root: &Path) -> Settings {
    let input = root.join("csv");
    let info = root.join("info");
    let rivers = input.join("rivers");
    let mixed = input.join("mixed");
    fs::create_dir_all(&rivers).unwrap();
    fs::create_dir_all(&mixed).unwrap();
    fs::create_dir_all(input.join("empty")).unwrap();
    fs::create_dir_all(&info).unwrap();

    // 03:00 is missing from both files
    fs::write(
        rivers.join("upper.csv"),
        export_text(
            "Flow",
            "GS1",
            &[
                ("2024-05-01 00:00:00", "1"),
                ("2024-05-01 01:00:00", "2"),
                ("2024-05-01 02:00:00", "3"),
                ("2024-05-01 04:00:00", "5"),
                ("2024-05-01 05:00:00", "6"),
            ],
        ),
    )
    .unwrap();
    fs::write(
        rivers.join("lower.csv"),
        export_text(
            "Flow",
            "GS2",
            &[
                ("2024-05-01 00:00:00", "10"),
                ("2024-05-01 01:00:00", ""),
                ("2024-05-01 02:00:00", "12"),
                ("2024-05-01 04:00:00", "14"),
                ("2024-05-01 05:00:00", "15"),
            ],
        ),
    )
    .unwrap();

    fs::write(
        mixed.join("flow.csv"),
        export_text("Flow", "GS1", &[("2024-05-01 00:00:00", "1")]),
    )
    .unwrap();
    fs::write(
        mixed.join("rain.csv"),
        export_text("Rainfall", "RF7", &[("2024-05-01 00:00:00", "0.5")]),
    )
    .unwrap();

    fs::write(
        info.join("plate_info.json"),
        r#"{"GS1": "Upper", "GS2": "Lower", "RF7": "Gauge Hill"}"#,
    )
    .unwrap();
    fs::write(
        info.join("param_info.json"),
        r#"{"Flow": "m^3/s", "Rainfall": "mm"}"#,
    )
    .unwrap();

    let mut settings = Settings::default();
    settings.batch.input_dir = input;
    settings.batch.info_dir = info;
    settings.batch.output_dir = root.join("out");
    settings.daily.enabled = true;
    settings.daily.min_completeness = 0.0;
    settings
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[test]
fn test_batch_reports_every_folder() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_fixture(dir.path());

    let report = batch::run_batch(&settings).expect("batch should run");

    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.successful, 1, "only the clean folder fully succeeds");
    assert_eq!(report.summary.partial, 1);
    assert_eq!(report.summary.failed, 1);

    let names: Vec<&str> = report.folders.iter().map(|f| f.folder.as_str()).collect();
    assert_eq!(names, vec!["empty", "mixed", "rivers"], "folders are processed in name order");

    let empty = &report.folders[0];
    assert_eq!(empty.status, FolderStatus::Failed);
    assert!(empty.error_message.as_deref().unwrap_or("").contains("No CSV files"));

    let mixed = &report.folders[1];
    assert_eq!(mixed.status, FolderStatus::PartialSuccess);
    assert_eq!(mixed.wide_refused, Some(WideRefusal::NonUniformParameter));
    assert!(mixed.wide.is_none());
    assert_eq!(mixed.ranges.len(), 2, "range summaries are kept for refused folders");
}

#[test]
fn test_clean_folder_is_pivoted_and_gap_filled() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_fixture(dir.path());
    let report = batch::run_batch(&settings).unwrap();

    let rivers = report.folders.iter().find(|f| f.folder == "rivers").unwrap();
    assert_eq!(rivers.status, FolderStatus::Success);
    assert_eq!(rivers.step, Some(StepResult::RegularSeconds(3600)));

    let wide = rivers.wide.as_ref().expect("clean folder has a wide table");
    assert_eq!(wide.kind(), TemporalKind::DateTime);
    assert_eq!(wide.time_column(), "Time");
    assert_eq!(wide.len(), 6, "missing 03:00 row is restored");
    assert_eq!(wide.timestamps()[3], at(1, 3));

    // Files are read in name order: lower.csv before upper.csv
    assert_eq!(wide.column_names(), vec!["Lower", "Upper"]);
    assert_eq!(
        wide.column("Upper").unwrap().values,
        vec![Some(1.0), Some(2.0), Some(3.0), None, Some(5.0), Some(6.0)]
    );
    assert_eq!(
        wide.column("Lower").unwrap().values,
        vec![Some(10.0), None, Some(12.0), None, Some(14.0), Some(15.0)]
    );

    let avail = rivers.availability.as_ref().expect("availability is computed");
    let upper = avail.record("Upper").unwrap();
    assert!((upper.completeness_pct.unwrap() - 500.0 / 6.0).abs() < 1e-9);
    let lower = avail.record("Lower").unwrap();
    assert!((lower.completeness_pct.unwrap() - 400.0 / 6.0).abs() < 1e-9);
}

#[test]
fn test_daily_aggregates_follow_settings() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_fixture(dir.path());
    let report = batch::run_batch(&settings).unwrap();

    let rivers = report.folders.iter().find(|f| f.folder == "rivers").unwrap();
    assert_eq!(rivers.daily_sites, vec!["Lower", "Upper"]);

    // Day ends at 00:00, so the midnight reading belongs to 30 April
    let upper = &rivers.daily[1];
    assert_eq!(upper.kind(), TemporalKind::Date);
    assert_eq!(upper.label("site"), Some("Upper"));
    assert_eq!(upper.label("aggregation"), Some("mean"));
    assert_eq!(upper.len(), 2);
    assert_eq!(upper.column("Agg_mean").unwrap().values, vec![Some(1.0), Some(4.0)]);
}

#[test]
fn test_outputs_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_fixture(dir.path());
    let report = batch::run_batch(&settings).unwrap();

    let out = &settings.batch.output_dir;
    let written = batch::write_outputs(&report, out).expect("outputs should be written");
    assert!(written.iter().any(|p| p.ends_with("rivers_wide.csv")));
    assert!(written.iter().any(|p| p.ends_with("rivers_GS1_daily.csv")));
    assert!(!out.join("mixed_wide.csv").exists(), "refused folders get no wide table");

    let wide = fs::read_to_string(out.join("rivers_wide.csv")).unwrap();
    let lines: Vec<&str> = wide.lines().collect();
    assert_eq!(lines[0], "Time,Lower,Upper");
    assert_eq!(lines[4], "2024-05-01 03:00:00,,");

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("batch_report.json")).unwrap()).unwrap();
    assert_eq!(json["summary"]["total"], 3);
    assert_eq!(json["folders"][2]["folder"], "rivers");
    assert!(
        json["folders"][2].get("wide").is_none(),
        "tables are written as CSV, not embedded in the report"
    );
}

#[test]
fn test_missing_input_folder_aborts_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.batch.input_dir = dir.path().join("does_not_exist");
    settings.batch.info_dir = dir.path().to_path_buf();
    assert!(batch::run_batch(&settings).is_err());
}

// ---------------------------------------------------------------------------
// Source → core
// ---------------------------------------------------------------------------

#[test]
fn test_fetched_readings_flow_through_the_core() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("upper.csv"),
        export_text(
            "Flow",
            "GS1",
            &[
                ("2024-05-01 00:00:00", "1"),
                ("2024-05-01 01:00:00", "2"),
                ("2024-05-01 03:00:00", "4"),
            ],
        ),
    )
    .unwrap();
    let source = ExportFolder::new(dir.path());

    let readings = source.fetch("GS1", "Flow", at(1, 0), at(2, 0)).unwrap();
    let series = TimeSeries::from_raw(readings_to_raw("Time", "GS1", &readings)).unwrap();
    let filled = regularize(&series, 60);

    assert_eq!(
        filled.column("GS1").unwrap().values,
        vec![Some(1.0), Some(2.0), None, Some(4.0)]
    );
    let report = availability(&filled, 60).unwrap();
    assert!((report.records[0].completeness_pct.unwrap() - 75.0).abs() < 1e-9);
}

#[test]
fn test_daily_aggregation_with_offset_day_start() {
    // 10:00 on day 1 through 09:00 on day 2 form one bucket when days end at 09:00
    let readings: Vec<(NaiveDateTime, Option<f64>)> = (10..34)
        .map(|h| (at(1, 0) + chrono::Duration::hours(h), Some(h as f64)))
        .collect();
    let series = TimeSeries::single_site("Time", "GS1", readings).unwrap();
    let options = DailyOptions {
        day_starts_at: 9,
        aggregation: Aggregation::Sum,
        min_completeness: 1.0,
    };

    let daily = aggregate_daily(&series, &options).unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily.timestamps()[0].date(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    let expected: f64 = (10..34).map(|h| h as f64).sum();
    assert_eq!(daily.column("Agg_sum").unwrap().values, vec![Some(expected)]);
}
