//! CLI integration tests.
//!
//! Tests:
//! - Help output lists the configuration options
//! - A missing connection string stops startup with a clear message
//! - An unreachable collector is not reported as a successful export

use std::process::Command;

fn appsight() -> Command {
    Command::new(env!("CARGO_BIN_EXE_appsight"))
}

#[test]
fn test_cli_help_output() {
    let output = appsight().arg("--help").output().expect("failed to run");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(
        stdout.contains("--connection-string"),
        "help should mention --connection-string option"
    );
    assert!(
        stdout.contains("--exporter"),
        "help should mention --exporter option"
    );
    assert!(
        stdout.contains("--min-severity"),
        "help should mention --min-severity option"
    );
}

#[test]
fn test_cli_version_output() {
    let output = appsight().arg("--version").output().expect("failed to run");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "version output should contain the package version: {stdout}"
    );
}

#[test]
fn test_missing_connection_string_halts() {
    let output = appsight()
        .env_remove("APPLICATION_INSIGHTS_CONNECTION_STRING")
        .env("APPSIGHT_EXPORTER", "otlp")
        .env("RUST_LOG", "error")
        .output()
        .expect("failed to run");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "startup should fail");
    assert!(
        stderr.contains("Connection String Not Found"),
        "stderr should explain the failure: {stderr}"
    );
}

#[test]
fn test_stdout_exporter_runs_demo() {
    let output = appsight()
        .env_remove("APPLICATION_INSIGHTS_CONNECTION_STRING")
        .env("RUST_LOG", "error")
        .args([
            "--exporter",
            "stdout",
            "--startup-pause-ms",
            "0",
            "--work-ms",
            "0",
        ])
        .output()
        .expect("failed to run");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout line should be JSON"))
        .collect();
    assert!(lines.iter().any(|l| l["type"] == "span" && l["name"] == "calculation"));
    assert!(lines
        .iter()
        .any(|l| l["type"] == "counter" && l["name"] == "custom_requests_total"));
}

#[test]
fn test_unreachable_collector_is_not_reported_as_sent() {
    let output = appsight()
        .env("RUST_LOG", "info")
        .args([
            "--connection-string",
            "http://127.0.0.1:9",
            "--exporter",
            "otlp",
            "--startup-pause-ms",
            "0",
            "--work-ms",
            "0",
            "--export-timeout-secs",
            "1",
        ])
        .output()
        .expect("failed to run");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "emission failures never fail the run");
    assert!(
        !stderr.contains("sent to the OTLP endpoint"),
        "success must not be claimed: {stderr}"
    );
    assert!(
        stderr.contains("Shutdown reported problems"),
        "stderr should flag the failed shutdown: {stderr}"
    );
}
