/// Smoke tests to verify the binary runs without panicking
use std::process::Command;

fn run(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "--quiet", "--"])
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute cargo run")
}

#[test]
fn binary_shows_help() {
    let output = run(&["--help"]);

    assert!(
        output.status.success(),
        "Binary failed to run --help: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("trafficmap"), "Help output should mention trafficmap");
    assert!(stdout.contains("live"));
    assert!(stdout.contains("summary"));
}

#[test]
fn binary_shows_version() {
    let output = run(&["--version"]);

    assert!(
        output.status.success(),
        "Binary failed to run --version: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn invalid_subcommand_fails_gracefully() {
    let output = run(&["nonexistent-command"]);

    assert!(
        !output.status.success(),
        "Invalid subcommand should return error status"
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.contains("panicked at"),
        "Invalid subcommand should not cause panic"
    );
}

#[test]
fn mock_summary_prints_report() {
    let output = run(&["summary", "--mock", "--seed", "1", "--count", "120"]);

    assert!(
        output.status.success(),
        "summary --mock failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("120 events from mock"));
    assert!(stdout.contains("Top locations"));
    assert!(stdout.contains("Traffic per hour"));
}

#[test]
fn missing_replay_file_reports_error() {
    let output = run(&["summary", "--file", "/nonexistent/trafficmap/batch.json"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("trafficmap:"));
    assert!(!stderr.contains("panicked at"));
}
