use predicates::str::contains;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

fn write_temp_config(contents: &str, extension: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be available")
        .as_nanos();
    path.push(format!("flood-sim-config-{}.{}", nanos, extension));
    fs::write(&path, contents).expect("config write should succeed");
    path
}

#[test]
fn show_config_prints_resolved_toml() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("flood-sim");
    cmd.args(["show-config", "--servers", "4", "--seed", "3"]);
    cmd.assert()
        .success()
        .stdout(contains("seed = 3"))
        .stdout(contains("[servers]"))
        .stdout(contains("count = 4"))
        .stdout(contains("[malicious]"));
}

#[test]
fn config_file_toml_is_applied() {
    let config = r#"
duration = 4.0
seed = 8

[servers]
count = 2
max_queue_length = 100

[legitimate]
clients = 10

[malicious]
clients = 2
"#;
    let path = write_temp_config(config, "toml");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("flood-sim");
    cmd.args(["show-config", "--config", path.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(contains("duration = 4.0"))
        .stdout(contains("max_queue_length = 100"))
        .stdout(contains("rate = 20.0"));
}

#[test]
fn config_file_json_runs() {
    let config = r#"{
  "duration": 3.0,
  "seed": 2,
  "servers": { "count": 2 },
  "legitimate": { "clients": 10 },
  "malicious": { "clients": 1 }
}"#;
    let path = write_temp_config(config, "json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("flood-sim");
    cmd.args([
        "run",
        "--config",
        path.to_str().unwrap(),
        "--format",
        "summary",
    ]);
    cmd.assert()
        .success()
        .stdout(contains("All Requests Accounted For: true"));
}

#[test]
fn flags_override_config_file() {
    let path = write_temp_config("[servers]\ncount = 2\n", "toml");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("flood-sim");
    cmd.args([
        "show-config",
        "--config",
        path.to_str().unwrap(),
        "--servers",
        "7",
    ]);
    cmd.assert().success().stdout(contains("count = 7"));
}
