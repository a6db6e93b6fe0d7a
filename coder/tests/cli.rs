//! CLI tests for the commands that need no model backend.
//!
//! Spawns the coder binary and checks exit codes and printed output.

use std::process::Command;

use coder::exit_codes;
use coder::io::config::{AgentConfig, default_config_path, load_config};
use coder::test_support::TestWorkspace;

#[test]
fn init_writes_default_config_and_keeps_it_without_force() {
    let ws = TestWorkspace::new().expect("workspace");

    let status = Command::new(env!("CARGO_BIN_EXE_coder"))
        .current_dir(ws.root())
        .arg("init")
        .status()
        .expect("coder init");
    assert_eq!(status.code(), Some(exit_codes::OK));

    let path = default_config_path(ws.root());
    assert_eq!(load_config(&path).expect("load"), AgentConfig::default());

    std::fs::write(&path, "max_steps = 7\n").expect("edit config");
    let output = Command::new(env!("CARGO_BIN_EXE_coder"))
        .current_dir(ws.root())
        .arg("init")
        .output()
        .expect("coder init again");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&output.stdout).contains("already exists"));
    assert_eq!(load_config(&path).expect("load").max_steps, 7);
}

#[test]
fn critique_prints_report_for_file() {
    let ws = TestWorkspace::new().expect("workspace");
    ws.write("app.py", "def greet(name):\n    print(name)\n")
        .expect("write");

    let output = Command::new(env!("CARGO_BIN_EXE_coder"))
        .current_dir(ws.root())
        .args(["critique", "app.py"])
        .output()
        .expect("coder critique");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Quality score: "), "{stdout}");
    assert!(stdout.contains("[documentation]"), "{stdout}");
}

#[test]
fn critique_of_missing_file_fails() {
    let ws = TestWorkspace::new().expect("workspace");

    let output = Command::new(env!("CARGO_BIN_EXE_coder"))
        .current_dir(ws.root())
        .args(["critique", "missing.py"])
        .output()
        .expect("coder critique");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.py"));
}

#[test]
fn run_fails_when_backend_is_unreachable() {
    let ws = TestWorkspace::new().expect("workspace");
    ws.write(
        ".coder/config.toml",
        "[model]\nbackend = \"ollama\"\nbase_url = \"http://127.0.0.1:9\"\nrequest_timeout_secs = 2\n",
    )
    .expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_coder"))
        .current_dir(ws.root())
        .args(["run", "do something"])
        .output()
        .expect("coder run");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not reachable"));
}
