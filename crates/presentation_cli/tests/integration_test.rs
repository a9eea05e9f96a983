//! Integration tests for CLI
//!
//! These run the built binary against a throwaway database, so no mail
//! server is contacted.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{path::Path, process::Command};

fn write_config(dir: &Path) -> std::path::PathBuf {
    let config = dir.join("mailsync.toml");
    std::fs::write(
        &config,
        format!(
            "[database]\npath = \"{}\"\n\n[telemetry]\nlog_filter = \"error\"\n",
            dir.join("mail.db").display()
        ),
    )
    .unwrap();
    config
}

fn cli(config: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mailsync-cli"));
    cmd.arg("--config").arg(config).env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_mailsync-cli"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());

    let help = String::from_utf8_lossy(&output.stdout);
    for command in ["add-account", "sync-all", "mark-read", "stats"] {
        assert!(help.contains(command), "missing {command} in help");
    }
}

#[test]
fn accounts_for_new_user_is_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = cli(&config)
        .args(["accounts", "--user", "6f1c2a54-8a39-4a8e-9d4e-0f6d7b4b1c22"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed, serde_json::json!([]));
    assert!(dir.path().join("mail.db").exists());
}

#[test]
fn stats_for_unknown_account_are_zero() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = cli(&config)
        .args(["stats", "0b8f3c1e-2d4a-4f6b-8c9d-1e2f3a4b5c6d"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total"], 0);
    assert_eq!(stats["trash"], 0);
}

#[test]
fn sync_of_unknown_account_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = cli(&config)
        .args(["sync", "0b8f3c1e-2d4a-4f6b-8c9d-1e2f3a4b5c6d"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["synced"], 0);
    assert_eq!(result["error"], "Account not found");
}

#[test]
fn missing_config_file_fails() {
    let output = cli(Path::new("/nonexistent/mailsync.toml"))
        .args(["stats", "0b8f3c1e-2d4a-4f6b-8c9d-1e2f3a4b5c6d"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
