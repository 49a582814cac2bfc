//! Tests of the `relbin` binary itself.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

use crate::common::{ASSET, OWNER, REPO, ReleaseServer};

fn write_config(dir: &Path, api_url: &str) -> std::path::PathBuf {
    let config = dir.join("config.toml");
    std::fs::write(
        &config,
        format!(
            r#"
repository = "{OWNER}/{REPO}"
api_url = '{api_url}'
asset_name = "{ASSET}"
cache_dir = '{}'
"#,
            dir.join("cache").display()
        ),
    )
    .unwrap();
    config
}

fn relbin(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("relbin").unwrap();
    cmd.env("RELBIN_CONFIG", config)
        .env_remove("RELBIN_REPOSITORY")
        .env_remove("RELBIN_CACHE_DIR")
        .env_remove("RELBIN_ASSET")
        .env_remove("RELBIN_REFRESH_INTERVAL_MS")
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_forwards_arguments_and_relays_exit_code() {
    let server = ReleaseServer::start().await;
    server.publish("v1", b"#!/bin/sh\necho \"hello $1 $2\"\nexit 3\n").await;

    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), &server.api_url());

    // The mock server needs the runtime while the child blocks
    let assert = tokio::task::spawn_blocking(move || {
        relbin(&config).args(["world", "--flag"]).assert()
    })
    .await
    .unwrap();

    assert.code(3).stdout(predicate::eq("hello world --flag\n"));
    assert!(temp.path().join("cache").join("v1").join(ASSET).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_repository_is_reported() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.toml");
    std::fs::write(&config, "api_url = \"http://127.0.0.1:9\"\n").unwrap();

    let assert = tokio::task::spawn_blocking(move || relbin(&config).assert()).await.unwrap();
    assert
        .code(1)
        .stderr(predicate::str::contains("no repository configured"))
        .stderr(predicate::str::contains("suggestion"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_network_failure_without_cache_fails() {
    let server = ReleaseServer::start().await;
    server.fail_with(503).await;

    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), &server.api_url());

    let assert = tokio::task::spawn_blocking(move || relbin(&config).assert()).await.unwrap();
    assert.code(1).stderr(predicate::str::contains("Network error"));
}
