#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde_json::Value;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/sensorpipe-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn sensorpipe(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sensorpipe"))
        .args(["--log-level", "error"])
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("sensorpipe should run")
}

fn json_lines(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("stdout line should be JSON"))
        .collect()
}

fn simulate_to(path: &Path, extra: &[&str]) {
    let mut args = vec!["simulate"];
    args.extend_from_slice(extra);
    let output = sensorpipe(&args);
    assert!(output.status.success());
    std::fs::write(path, &output.stdout).expect("frames should be writable");
}

#[test]
fn version_prints_package_version() {
    let output = sensorpipe(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("sensorpipe {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn version_extended_json_reports_wire_and_defaults() {
    let output = sensorpipe(&["--format", "json", "version", "--extended"]);
    assert!(output.status.success());
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["name"], "sensorpipe");
    assert_eq!(lines[0]["frame_len"], 11);
    assert_eq!(lines[0]["sync_byte"], "0x55");
    assert_eq!(lines[0]["queue_capacity"], 100);
}

#[test]
fn simulate_writes_whole_frames() {
    let output = sensorpipe(&["simulate", "--count", "7"]);
    assert!(output.status.success());
    assert_eq!(output.stdout.len(), 7 * 11);
    assert!(output.stdout.chunks(11).all(|frame| frame[0] == 0x55));
}

#[test]
fn simulate_corrupts_every_nth_checksum() {
    let output = sensorpipe(&["simulate", "--count", "6", "--corrupt-every", "3"]);
    assert!(output.status.success());
    let broken: Vec<usize> = output
        .stdout
        .chunks(11)
        .enumerate()
        .filter(|(_, frame)| {
            frame[..10].iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) != frame[10]
        })
        .map(|(index, _)| index)
        .collect();
    assert_eq!(broken, vec![2, 5]);
}

#[test]
fn simulated_frames_decode_through_small_chunks() {
    let dir = unique_temp_dir("decode");
    let frames = dir.join("imu.bin");
    simulate_to(&frames, &["--count", "8", "--type", "acceleration"]);

    let output = sensorpipe(&[
        "--format",
        "json",
        "decode",
        frames.to_str().unwrap(),
        "--binary-protocol",
        "--chunk-size",
        "5",
    ]);
    assert!(output.status.success());

    let records = json_lines(&output);
    assert_eq!(records.len(), 8);
    for record in &records {
        // 8192 counts at a 16 g range.
        assert_eq!(record["acceleration"]["z"], 4.0);
    }
    assert_eq!(records[1]["acceleration"]["x"], 0.25);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn corrupted_frames_are_skipped_and_counted() {
    let dir = unique_temp_dir("corrupt");
    let frames = dir.join("imu.bin");
    simulate_to(&frames, &["--count", "8", "--corrupt-every", "2"]);

    let output = sensorpipe(&[
        "--format",
        "json",
        "decode",
        frames.to_str().unwrap(),
        "--binary-protocol",
        "--stats",
    ]);
    assert!(output.status.success());

    let lines = json_lines(&output);
    let records = lines.iter().filter(|l| l.get("stats").is_none()).count();
    assert_eq!(records, 4);

    let stats = &lines.last().unwrap()["stats"];
    assert_eq!(stats["records_decoded"], 4);
    assert!(stats["checksum_failures"].as_u64().unwrap() >= 4);
    assert_eq!(stats["decode_errors"], 0);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn csv_file_decodes_with_header() {
    let dir = unique_temp_dir("csv");
    let csv = dir.join("imu.csv");
    std::fs::write(&csv, "timestamp,accel_x,label\n1,0.5,a\n2,0.75,b\n").unwrap();

    let output = sensorpipe(&[
        "--format",
        "json",
        "decode",
        csv.to_str().unwrap(),
        "--input-format",
        "csv",
    ]);
    assert!(output.status.success());

    let records = json_lines(&output);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["timestamp"], 1.0);
    assert_eq!(records[1]["acceleration"]["x"], 0.75);
    assert_eq!(records[0]["additional_values"]["label"], "a");
    assert_eq!(records[0]["source"], csv.to_str().unwrap());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_config_returns_60() {
    let dir = unique_temp_dir("config");
    let config = dir.join("decoder.json");
    std::fs::write(&config, r#"{"type": "binary_protocol", "acc_range": -1}"#).unwrap();
    let input = dir.join("empty.bin");
    std::fs::write(&input, b"").unwrap();

    let output = sensorpipe(&[
        "decode",
        input.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid config"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_input_returns_1() {
    let output = sensorpipe(&["decode", "/nonexistent/sensorpipe/input.bin"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn usage_errors_return_64() {
    let output = sensorpipe(&[
        "run",
        "/tmp/whatever.csv",
        "--join-timeout",
        "soon",
    ]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn run_drains_every_file_and_reports_status() {
    let dir = unique_temp_dir("run");
    let a = dir.join("a.csv");
    let b = dir.join("b.csv");
    std::fs::write(&a, "timestamp,roll\n1,10\n2,20\n3,30\n").unwrap();
    std::fs::write(&b, "timestamp,roll\n4,40\n").unwrap();

    let output = sensorpipe(&[
        "--format",
        "json",
        "run",
        a.to_str().unwrap(),
        b.to_str().unwrap(),
        "--input-format",
        "csv",
        "--stage-timeout",
        "50ms",
    ]);
    assert!(output.status.success());

    let lines = json_lines(&output);
    let records: Vec<_> = lines.iter().filter(|l| l.get("source").is_some()).collect();
    let statuses: Vec<_> = lines.iter().filter(|l| l.get("pipeline").is_some()).collect();

    assert_eq!(records.len(), 4);
    assert_eq!(
        records
            .iter()
            .filter(|r| r["source"] == a.to_str().unwrap())
            .count(),
        3
    );
    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(|s| s["state"] == "stopped"));

    let _ = std::fs::remove_dir_all(&dir);
}
