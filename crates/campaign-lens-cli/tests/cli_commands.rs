// crates/campaign-lens-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for the campaign-lens binary.
// Purpose: Check config validation and offline credential inspection.
// Dependencies: campaign-lens-cli binary, tempfile
// ============================================================================

//! ## Overview
//! Runs the built binary with a cleared environment so only the config file
//! written by each test influences the outcome.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use serde_json::Value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Path to the compiled binary.
fn campaign_lens_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_campaign-lens"))
}

/// Runs the binary in `dir` with `args` and no inherited environment.
fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(campaign_lens_bin())
        .current_dir(dir)
        .env_clear()
        .args(args)
        .output()
        .expect("run campaign-lens")
}

/// Writes `content` as the config file in `dir`.
fn write_config(dir: &Path, content: &str) -> String {
    let path = dir.join("campaign-lens.toml");
    fs::write(&path, content.trim()).expect("write config");
    path.to_string_lossy().into_owned()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn config_check_prints_summary_without_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"
[server]
transport = "http"
bind = "127.0.0.1:9100"

[oauth]
client_id = "client-id"
client_secret = "very-secret"

[ads]
customer_id = "123-456-7890"
"#,
    );
    let output = run(dir.path(), &["config", "check", "--config", &config]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("very-secret"));
    let summary: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["transport"], "http");
    assert_eq!(summary["bind"], "127.0.0.1:9100");
    assert_eq!(summary["ads"]["customer_id"], "1234567890");
    assert_eq!(summary["oauth"]["client_secret"], true);
}

#[test]
fn config_check_rejects_unknown_fields() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[server]\nlisten = \"0.0.0.0:1\"\n");
    let output = run(dir.path(), &["config", "check", "--config", &config]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config load failed"), "unexpected stderr: {stderr}");
}

#[test]
fn auth_url_requests_offline_consent() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[oauth]\nclient_id = \"client-id\"\n");
    let output = run(dir.path(), &["auth", "url", "--config", &config]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let url = String::from_utf8(output.stdout).unwrap();
    assert!(url.starts_with("https://accounts.google.com/"));
    assert!(url.contains("client_id=client-id"));
    assert!(url.contains("access_type=offline"));
    assert!(url.contains("prompt=consent"));
}

#[test]
fn auth_url_without_client_id_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["auth", "url"]);
    assert!(!output.status.success());
}

#[test]
fn auth_status_reads_token_file_offline() {
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("tokens.json");
    fs::write(
        &token_path,
        r#"{"refresh_token":"stored","access_token":"a","expiry_date":1700000000000}"#,
    )
    .unwrap();
    let config = write_config(
        dir.path(),
        &format!("[credentials]\ntoken_path = {:?}\n", token_path.to_string_lossy()),
    );
    let output = run(dir.path(), &["auth", "status", "--config", &config]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let status: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["credential"]["state"], "ready");
    assert_eq!(status["credential"]["has_refresh_token"], true);
    assert_eq!(status["credential"]["expiry_date"], 1_700_000_000_000_i64);
    assert!(!String::from_utf8_lossy(&output.stdout).contains("stored"));
}

#[test]
fn auth_status_without_credential_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["auth", "status"]);
    assert!(!output.status.success());
    let status: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["credential"]["has_refresh_token"], false);
}
