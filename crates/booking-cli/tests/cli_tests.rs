//! Integration tests for the `bookings` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to exercise every subcommand
//! through the actual binary against the JSON fixtures, including config
//! overrides, file output and error reporting.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

/// Helper: path to the schedule.json fixture.
fn schedule_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/schedule.json")
}

/// Helper: path to the config.json fixture (30-minute slots, 09-17 calendar).
fn config_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/config.json")
}

/// Helper: path to the spans.json fixture.
fn spans_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/spans.json")
}

fn bookings() -> Command {
    Command::cargo_bin("bookings").unwrap()
}

/// Helper: run a command that must succeed and parse its stdout as JSON.
fn run_json(args: &[&str]) -> Value {
    let output = bookings().args(args).assert().success().get_output().clone();
    serde_json::from_slice(&output.stdout).expect("stdout must be JSON")
}

fn open_starts(slots: &Value) -> Vec<String> {
    slots
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["available"] == Value::Bool(true))
        .map(|s| s["start_time"].as_str().unwrap().to_string())
        .collect()
}

fn temp_path(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("bookings-cli-{}-{}", std::process::id(), name))
        .to_string_lossy()
        .into_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// slots
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn slots_reports_hourly_availability() {
    let slots = run_json(&[
        "slots", "-s", schedule_path(), "--agent", "agent-x", "--date", "2026-03-16",
    ]);

    assert_eq!(slots.as_array().unwrap().len(), 24);
    assert_eq!(
        open_starts(&slots),
        vec!["09:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00"]
    );
}

#[test]
fn slots_respects_all_day_exception() {
    let slots = run_json(&[
        "slots", "-s", schedule_path(), "--agent", "agent-x", "--date", "2026-03-17",
    ]);
    assert!(open_starts(&slots).is_empty());
}

#[test]
fn cancelled_booking_does_not_block() {
    let slots = run_json(&[
        "slots", "-s", schedule_path(), "--agent", "agent-y", "--date", "2026-03-16",
    ]);
    assert_eq!(open_starts(&slots), vec!["13:00", "14:00"]);
}

#[test]
fn slots_granularity_from_config() {
    let slots = run_json(&[
        "--config", config_path(), "slots", "-s", schedule_path(), "--agent", "agent-x", "--date",
        "2026-03-16",
    ]);
    assert_eq!(slots.as_array().unwrap().len(), 48);
}

#[test]
fn slots_granularity_flag_overrides_config() {
    let slots = run_json(&[
        "--config", config_path(), "slots", "-s", schedule_path(), "--agent", "agent-x", "--date",
        "2026-03-16", "--granularity", "120",
    ]);
    assert_eq!(slots.as_array().unwrap().len(), 12);
}

#[test]
fn slots_compact_folds_ranges() {
    let ranges = run_json(&[
        "slots", "-s", schedule_path(), "--agent", "agent-x", "--date", "2026-03-16", "--compact",
    ]);

    let shape: Vec<(String, String, bool)> = ranges
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["start"].as_str().unwrap().to_string(),
                r["end"].as_str().unwrap().to_string(),
                r["flag"].as_bool().unwrap(),
            )
        })
        .collect();

    assert_eq!(
        shape,
        vec![
            ("00:00".into(), "09:00".into(), false),
            ("09:00".into(), "10:00".into(), true),
            ("10:00".into(), "11:00".into(), false),
            ("11:00".into(), "17:00".into(), true),
            ("17:00".into(), "24:00".into(), false),
        ]
    );
}

#[test]
fn slots_rejects_bad_granularity() {
    bookings()
        .args([
            "slots", "-s", schedule_path(), "--agent", "agent-x", "--date", "2026-03-16",
            "--granularity", "7",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation error"));
}

// ─────────────────────────────────────────────────────────────────────────────
// check
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn check_booked_interval_is_unavailable() {
    let result = run_json(&[
        "check", "-s", schedule_path(), "--agent", "agent-x", "--date", "2026-03-16", "--start",
        "10:00", "--end", "11:00",
    ]);
    assert_eq!(result["available"], Value::Bool(false));
}

#[test]
fn check_free_interval_is_available() {
    let result = run_json(&[
        "check", "-s", schedule_path(), "--agent", "agent-x", "--date", "2026-03-16", "--start",
        "11:00", "--end", "13:00",
    ]);
    assert_eq!(result["available"], Value::Bool(true));
}

#[test]
fn check_rejects_malformed_time() {
    bookings()
        .args([
            "check", "-s", schedule_path(), "--agent", "agent-x", "--date", "2026-03-16",
            "--start", "25:00", "--end", "26:00",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid time of day"));
}

// ─────────────────────────────────────────────────────────────────────────────
// book
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn book_free_interval_prints_pending_booking() {
    let booking = run_json(&[
        "book", "-s", schedule_path(), "--agent", "agent-x", "--client", "client-7", "--service",
        "fence-install", "--date", "2026-03-16", "--start", "13:00", "--end", "15:00",
        "--location", "40 Spruce Ave", "--price", "320.50",
    ]);

    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["start_time"], "13:00");
    assert_eq!(booking["price"], "320.50");
    assert_eq!(booking["version"], 1);
}

#[test]
fn book_writes_updated_schedule() {
    let output_path = temp_path("book-output.json");
    let _ = std::fs::remove_file(&output_path);

    bookings()
        .args([
            "book", "-s", schedule_path(), "--agent", "agent-x", "--client", "client-7",
            "--service", "fence-install", "--date", "2026-03-16", "--start", "15:00", "--end",
            "16:00", "--location", "40 Spruce Ave", "-o", &output_path,
        ])
        .assert()
        .success();

    let content = std::fs::read_to_string(&output_path).expect("output file must exist");
    let schedule: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(schedule["bookings"].as_array().unwrap().len(), 3);
    assert_eq!(schedule["weekly"].as_array().unwrap().len(), 3);

    // The written schedule is itself a valid input: the new booking now blocks.
    let result = run_json(&[
        "check", "-s", &output_path, "--agent", "agent-x", "--date", "2026-03-16", "--start",
        "15:00", "--end", "16:00",
    ]);
    assert_eq!(result["available"], Value::Bool(false));

    let _ = std::fs::remove_file(&output_path);
}

#[test]
fn book_overlapping_interval_fails_with_conflict() {
    bookings()
        .args([
            "book", "-s", schedule_path(), "--agent", "agent-x", "--client", "client-7",
            "--service", "fence-install", "--date", "2026-03-16", "--start", "10:30", "--end",
            "11:30", "--location", "40 Spruce Ave",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Booking rejected"))
        .stderr(predicate::str::contains("Conflict"));
}

#[test]
fn book_outside_pattern_fails_unavailable() {
    bookings()
        .args([
            "book", "-s", schedule_path(), "--agent", "agent-x", "--client", "client-7",
            "--service", "fence-install", "--date", "2026-03-17", "--start", "10:00", "--end",
            "11:00", "--location", "40 Spruce Ave",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unavailable"));
}

// ─────────────────────────────────────────────────────────────────────────────
// calendar
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn calendar_week_view_buckets_by_hour() {
    let view = run_json(&[
        "calendar", "-s", schedule_path(), "--view", "week", "--date", "2026-03-18",
    ]);

    assert_eq!(view["start"], "2026-03-15");
    assert_eq!(view["end"], "2026-03-21");
    let cells = view["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 2);
    assert_eq!(cells[0]["date"], "2026-03-16");
    assert_eq!(cells[0]["hour"], 10);
}

#[test]
fn calendar_filters_by_agent() {
    let view = run_json(&[
        "calendar", "-s", schedule_path(), "--view", "day", "--date", "2026-03-16", "--agent",
        "agent-y",
    ]);
    let cells = view["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0]["hour"], 13);
}

#[test]
fn calendar_hours_come_from_config() {
    let config_path = temp_path("narrow-config.json");
    std::fs::write(&config_path, r#"{"calendar_hours": {"start": 12, "end": 17}}"#).unwrap();

    let view = run_json(&[
        "--config", &config_path, "calendar", "-s", schedule_path(), "--date", "2026-03-16",
    ]);
    let cells = view["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0]["hour"], 13);

    let _ = std::fs::remove_file(&config_path);
}

// ─────────────────────────────────────────────────────────────────────────────
// compress
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn compress_file_merges_runs() {
    let ranges = run_json(&["compress", "-i", spans_path()]);
    let ranges = ranges.as_array().unwrap();

    assert_eq!(ranges.len(), 3);
    assert_eq!(ranges[0]["start"], "09:00");
    assert_eq!(ranges[0]["end"], "12:00");
    assert_eq!(ranges[1]["flag"], false);
    assert_eq!(ranges[2]["start"], "14:00");
}

#[test]
fn compress_stdin() {
    bookings()
        .arg("compress")
        .write_stdin(
            r#"[{"start":"16:00","end":"17:00","flag":true},{"start":"17:00","end":"18:00","flag":true}]"#,
        )
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""end": "18:00""#));
}

#[test]
fn compress_rejects_invalid_json() {
    bookings()
        .arg("compress")
        .write_stdin("not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse spans JSON"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors and diagnostics
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn missing_schedule_file() {
    bookings()
        .args([
            "slots", "-s", "/nonexistent/schedule.json", "--agent", "agent-x", "--date",
            "2026-03-16",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn invalid_config_is_reported() {
    let config_path = temp_path("bad-config.json");
    std::fs::write(&config_path, r#"{"granularity_minutes": 7}"#).unwrap();

    bookings()
        .args([
            "--config", &config_path, "slots", "-s", schedule_path(), "--agent", "agent-x",
            "--date", "2026-03-16",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));

    let _ = std::fs::remove_file(&config_path);
}

#[test]
fn overlapping_bookings_in_file_are_warned_about() {
    let schedule_path = temp_path("overlapping-schedule.json");
    let mut schedule: Value =
        serde_json::from_str(&std::fs::read_to_string(self::schedule_path()).unwrap()).unwrap();
    let mut duplicate = schedule["bookings"][0].clone();
    duplicate["id"] = Value::String("5e2b9c1d-7a3f-4e8b-9d6c-1f0a2b3c4d5e".to_string());
    duplicate["start_time"] = Value::String("10:30".to_string());
    duplicate["end_time"] = Value::String("11:30".to_string());
    schedule["bookings"].as_array_mut().unwrap().push(duplicate);
    std::fs::write(&schedule_path, schedule.to_string()).unwrap();

    bookings()
        .args([
            "slots", "-s", &schedule_path, "--agent", "agent-x", "--date", "2026-03-16",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("overlapping bookings"));

    let _ = std::fs::remove_file(&schedule_path);
}

#[test]
fn no_subcommand_shows_usage() {
    bookings()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
