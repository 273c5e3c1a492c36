use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn ssgictl(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ssgictl"))
        .env("SSGI_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run ssgictl")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn ops(frame: &Value) -> Vec<String> {
    frame["commands"]
        .as_array()
        .unwrap()
        .iter()
        .map(|command| command["op"].as_str().unwrap().to_string())
        .collect()
}

fn pass_kinds(frame: &Value) -> Vec<String> {
    frame["commands"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|command| command["op"] == "pass")
        .map(|command| command["kind"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn plan_json_lists_balanced_commands() {
    let root = TempDir::new().unwrap();
    let output = ssgictl(
        root.path(),
        &["plan", "--size", "640x480", "--iterations", "2", "--json"],
    );
    assert!(output.status.success(), "{output:?}");

    let frames: Value = serde_json::from_str(&stdout(&output)).unwrap();
    let frames = frames.as_array().unwrap();
    assert_eq!(frames.len(), 1);

    let frame = &frames[0];
    assert_eq!(frame["outcome"]["outcome"], "submitted");
    assert_eq!(frame["outcome"]["frame_index"], 1);

    let ops = ops(frame);
    assert_eq!(ops.first().map(String::as_str), Some("allocate"));
    assert_eq!(ops.last().map(String::as_str), Some("release"));
    let allocations = ops.iter().filter(|op| *op == "allocate").count();
    let releases = ops.iter().filter(|op| *op == "release").count();
    assert_eq!(allocations, releases);
    assert_eq!(ops.iter().filter(|op| *op == "copy_camera_color").count(), 1);

    let kinds = pass_kinds(frame);
    assert_eq!(kinds.first().map(String::as_str), Some("ray_march"));
    assert_eq!(kinds.last().map(String::as_str), Some("composite"));
    assert_eq!(kinds.iter().filter(|kind| *kind == "blur").count(), 2);
}

#[test]
fn plan_counts_frames_from_one() {
    let root = TempDir::new().unwrap();
    let output = ssgictl(
        root.path(),
        &["plan", "--size", "320x200", "--frames", "3", "--json"],
    );
    assert!(output.status.success(), "{output:?}");

    let frames: Value = serde_json::from_str(&stdout(&output)).unwrap();
    let indices: Vec<u64> = frames
        .as_array()
        .unwrap()
        .iter()
        .map(|frame| frame["outcome"]["frame_index"].as_u64().unwrap())
        .collect();
    assert_eq!(indices, vec![1, 2, 3]);
}

#[test]
fn plan_text_prints_each_command() {
    let root = TempDir::new().unwrap();
    let output = ssgictl(root.path(), &["plan", "--size", "800x600"]);
    assert!(output.status.success(), "{output:?}");

    let text = stdout(&output);
    assert!(text.starts_with("Settings:"), "{text}");
    assert!(text.contains("frame 1 (800x600)"), "{text}");
    assert!(text.lines().any(|line| line.starts_with("  allocate")));
    assert!(text.lines().any(|line| line.starts_with("  ray_march")));
    assert!(text.lines().any(|line| line.starts_with("  composite")));
}

#[test]
fn plan_reads_settings_from_config_dir() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("ssgi.toml"),
        "[filter]\niterations = 0\n",
    )
    .unwrap();

    let output = ssgictl(root.path(), &["plan", "--size", "256x256", "--json"]);
    assert!(output.status.success(), "{output:?}");

    let frames: Value = serde_json::from_str(&stdout(&output)).unwrap();
    let kinds = pass_kinds(&frames[0]);
    assert!(!kinds.iter().any(|kind| kind == "blur"), "{kinds:?}");
    assert!(!kinds.iter().any(|kind| kind == "upscale"), "{kinds:?}");
}

#[test]
fn plan_fails_when_the_budget_is_exhausted() {
    let root = TempDir::new().unwrap();
    let output = ssgictl(
        root.path(),
        &["plan", "--size", "1920x1080", "--budget-mib", "1"],
    );
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn check_accepts_valid_and_rejects_invalid_files() {
    let root = TempDir::new().unwrap();
    let valid = root.path().join("valid.toml");
    fs::write(&valid, "[filter]\niterations = 4\nradius = 1.5\n").unwrap();

    let output = ssgictl(root.path(), &["check", valid.to_str().unwrap()]);
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    assert!(text.contains("is valid"));
    assert!(text.contains("iterations = 4"));

    let invalid = root.path().join("invalid.toml");
    fs::write(&invalid, "[filter]\niterations = 9\n").unwrap();
    let output = ssgictl(root.path(), &["check", invalid.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("filter.iterations"), "{stderr}");
}

#[test]
fn defaults_round_trip_through_check() {
    let root = TempDir::new().unwrap();
    let output = ssgictl(root.path(), &["defaults"]);
    assert!(output.status.success(), "{output:?}");

    let path = root.path().join("defaults.toml");
    fs::write(&path, stdout(&output)).unwrap();
    let checked = ssgictl(root.path(), &["check", path.to_str().unwrap()]);
    assert!(checked.status.success(), "{checked:?}");
}

#[test]
fn where_reports_the_override_directory() {
    let root = TempDir::new().unwrap();
    let output = ssgictl(root.path(), &["where"]);
    assert!(output.status.success(), "{output:?}");

    let text = stdout(&output);
    assert!(text.contains(&root.path().display().to_string()), "{text}");
    assert!(text.contains("missing"));
}
