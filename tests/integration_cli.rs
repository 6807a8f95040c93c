// Drives the compiled binary end to end: record, store, list, export and replay.
// Every invocation points at a temp database and config so the user's own
// history is never touched.

use assert_cmd::Command;
use pacer::route_io::{read_route_file, summary_from_json};
use pacer::summary::SportType;
use std::path::Path;
use tempfile::tempdir;

fn pacer(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pacer").unwrap();
    cmd.arg("--db")
        .arg(dir.join("activities.db"))
        .arg("--config")
        .arg(dir.join("config.json"))
        .env("RUST_LOG", "warn");
    cmd
}

fn stdout(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn simulate_saves_and_history_lists_it() {
    let dir = tempdir().unwrap();

    let json = stdout(pacer(dir.path()).args([
        "simulate",
        "--points",
        "30",
        "--interval-ms",
        "1",
        "--speech",
        "off",
        "--sport",
        "cycling",
        "--json",
    ]));
    let summary = summary_from_json(&json).unwrap();
    assert_eq!(summary.sample_count, 30);
    assert_eq!(summary.sport_type, SportType::Cycling);
    assert!(summary.distance_meters > 0.0);

    let history = stdout(pacer(dir.path()).arg("history"));
    assert!(history.contains("cycling"), "{history}");

    let shown = stdout(pacer(dir.path()).args(["show", "1", "--json"]));
    assert_eq!(summary_from_json(&shown).unwrap().route_points, summary.route_points);
}

#[test]
fn export_then_replay_reproduces_the_route() {
    let dir = tempdir().unwrap();
    pacer(dir.path())
        .args(["simulate", "--points", "25", "--interval-ms", "1", "--speech", "off"])
        .assert()
        .success();

    let csv = dir.path().join("route.csv");
    pacer(dir.path())
        .args(["export", "1"])
        .arg(&csv)
        .assert()
        .success();
    let exported = read_route_file(&csv).unwrap();
    assert_eq!(exported.len(), 25);

    let json = stdout(
        pacer(dir.path())
            .arg("replay")
            .arg(&csv)
            .args(["--interval-ms", "1", "--speech", "off", "--no-save", "--json"]),
    );
    assert_eq!(summary_from_json(&json).unwrap().route_points, exported);

    // --no-save left only the simulated activity
    pacer(dir.path()).args(["delete", "1"]).assert().success();
    pacer(dir.path()).args(["show", "1"]).assert().failure();
}

#[test]
fn record_reads_fixes_from_stdin() {
    let dir = tempdir().unwrap();
    let mut input = String::from("latitude,longitude,timestamp_ms\n");
    for i in 0..12 {
        input.push_str(&format!("0.0,{},{}\n", i as f64 * 0.000_899_322, i * 30_000));
    }
    // too soon after the previous fix; the device filter drops it
    input.push_str("0.0,0.0110,330100\n");

    let json = stdout(
        pacer(dir.path())
            .args(["record", "--speech", "off", "--no-save", "--json"])
            .write_stdin(input),
    );
    let summary = summary_from_json(&json).unwrap();
    assert_eq!(summary.sample_count, 12);
    assert!((summary.distance_meters - 1100.0).abs() < 1.0);
}

#[test]
fn config_reset_writes_defaults() {
    let dir = tempdir().unwrap();
    let out = stdout(pacer(dir.path()).args(["config", "--reset"]));
    assert!(out.contains("\"replay_interval_ms\": 1000"));
    assert!(dir.path().join("config.json").exists());
}

#[test]
fn unsupported_route_format_fails() {
    let dir = tempdir().unwrap();
    let gpx = dir.path().join("route.gpx");
    std::fs::write(&gpx, "<gpx/>").unwrap();
    pacer(dir.path())
        .arg("replay")
        .arg(&gpx)
        .args(["--no-save"])
        .assert()
        .failure();
}
