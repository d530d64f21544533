//! End-to-end CLI tests for the imagefetch binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

fn imagefetch() -> Command {
    let mut cmd = Command::cargo_bin("imagefetch").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("IMAGEFETCH_DISABLE_KEEP_ALIVE");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    imagefetch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("--max-retries"))
        .stdout(predicate::str::contains("--no-keep-alive"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    imagefetch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("imagefetch"));
}

/// Test that a missing URL causes a usage error.
#[test]
fn test_binary_missing_url_returns_error() {
    imagefetch()
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    imagefetch()
        .args(["--invalid-flag", "https://example.com/cat.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that out-of-range retry counts are rejected by the parser.
#[test]
fn test_binary_max_retries_out_of_range_returns_error() {
    imagefetch()
        .args(["--max-retries", "42", "https://example.com/cat.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("42"));
}

/// Test that a malformed URL fails without touching the network.
#[test]
fn test_binary_invalid_url_fails() {
    imagefetch()
        .arg("not a url")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid URL"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_writes_body_to_output_file() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path("/cat.png"))
        .and(header("x-variant", "thumb"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("cat.png");

    imagefetch()
        .args(["-H", "X-Variant: thumb", "-o"])
        .arg(&output)
        .arg(format!("{}/cat.png", mock_server.uri()))
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert_eq!(std::fs::read(&output).unwrap(), b"hello");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_writes_body_to_stdout_by_default() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&mock_server)
        .await;

    imagefetch()
        .arg("-q")
        .arg(format!("{}/cat.png", mock_server.uri()))
        .assert()
        .success()
        .stdout("hello");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_json_report() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Image-Id", "42")
                .set_body_string("hello"),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/cat.png", mock_server.uri());
    let assert = imagefetch()
        .args(["--json", "-q", "-A", "gallery/1.0", "-r", "2"])
        .arg(&url)
        .assert()
        .success();

    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["url"], url.as_str());
    assert_eq!(report["status"], 200);
    assert_eq!(report["status_message"], "OK");
    assert_eq!(report["content_length"], 5);
    assert_eq!(report["bytes"], 5);
    assert_eq!(report["attempts"], 1);
    assert_eq!(
        report["identifier"],
        "Downloader(maxRetryCount=2,connectTimeout=7000,readTimeout=7000,userAgent=gallery/1.0)"
    );
    let summary = report["header_summary"].as_str().unwrap();
    assert!(summary.contains("{x-image-id:42}"), "summary: {summary}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_non_success_status_fails() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    imagefetch()
        .arg(format!("{}/missing.png", mock_server.uri()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("404"));
}
