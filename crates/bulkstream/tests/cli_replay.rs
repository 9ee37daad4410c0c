#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "bulkstream-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn bulkstream(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bulkstream"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("bulkstream should run")
}

fn synth(path: &str, extra: &[&str]) {
    let mut args = vec!["synth", path];
    args.extend_from_slice(extra);
    let output = bulkstream(&args);
    assert!(
        output.status.success(),
        "synth failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn replay_json(path: &str, extra: &[&str]) -> (Output, serde_json::Value) {
    let mut args = vec!["--format", "json", "replay", path];
    args.extend_from_slice(extra);
    let output = bulkstream(&args);
    let json = serde_json::from_slice(&output.stdout).expect("summary should be json");
    (output, json)
}

#[test]
fn synth_then_replay_reports_pairs() {
    let dir = unique_temp_dir("pairs");
    let capture = dir.join("stream.bscp");
    let capture = capture.to_str().expect("temp path should be utf-8");

    synth(capture, &["--pairs", "20", "--samples", "64", "--crc"]);
    let (output, json) = replay_json(capture, &[]);

    assert!(output.status.success());
    assert_eq!(json["capture"], capture);
    assert_eq!(json["stop_reason"], "slots_exhausted");
    assert_eq!(json["frames"], 40);
    assert_eq!(json["pairs"], 20);
    assert_eq!(json["rejections"]["crc_mismatch"], 0);
    assert_eq!(json["baseline"]["sample_count"], 64);
    assert_eq!(json["histogram"][0]["samples"], 64);
    assert_eq!(json["histogram"][0]["frames"], 40);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn replay_counts_injected_gaps() {
    let dir = unique_temp_dir("gaps");
    let capture = dir.join("gaps.bscp");
    let capture = capture.to_str().expect("temp path should be utf-8");

    synth(capture, &["--pairs", "10", "--skip", "4,5,6"]);
    let (output, json) = replay_json(capture, &[]);

    assert!(output.status.success());
    assert_eq!(json["pairs"], 7);
    assert_eq!(json["sequence"]["missing"], 3);
    assert_eq!(json["sequence"]["gap_events"], 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn self_test_passes_with_test_frame() {
    let dir = unique_temp_dir("selftest-pass");
    let capture = dir.join("pass.bscp");
    let capture = capture.to_str().expect("temp path should be utf-8");

    synth(capture, &["--pairs", "4", "--samples", "128", "--test-frame"]);
    let (output, json) = replay_json(capture, &["--expect-samples", "128"]);

    assert!(output.status.success());
    assert_eq!(json["self_test"]["verdict"], "PASS");
    assert_eq!(json["test_frames"], 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn failed_self_test_exits_30() {
    let dir = unique_temp_dir("selftest-fail");
    let capture = dir.join("fail.bscp");
    let capture = capture.to_str().expect("temp path should be utf-8");

    synth(capture, &["--pairs", "4"]);
    let (output, json) = replay_json(capture, &["--self-test"]);

    assert_eq!(output.status.code(), Some(30));
    assert_eq!(json["self_test"]["verdict"], "FAIL");
    assert_eq!(json["self_test"]["reason"], "no test frame first");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn status_records_reach_the_summary() {
    let dir = unique_temp_dir("status");
    let capture = dir.join("status.bscp");
    let capture = capture.to_str().expect("temp path should be utf-8");

    synth(capture, &["--pairs", "6", "--status-every", "3"]);
    let (output, json) = replay_json(capture, &[]);

    assert!(output.status.success());
    assert_eq!(json["status_records"], 2);
    assert_eq!(json["last_status"]["signature"], "STAT");
    assert_eq!(json["last_status"]["produced_sequence"], 5);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_capture_exits_60() {
    let dir = unique_temp_dir("invalid");
    let capture = dir.join("junk.bscp");
    std::fs::write(&capture, b"not a capture").expect("junk file should be writable");

    let output = bulkstream(&[
        "replay",
        capture.to_str().expect("temp path should be utf-8"),
    ]);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid capture"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = bulkstream(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("bulkstream "));
}
