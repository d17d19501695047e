// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for daemon client behavior.

use super::*;
use rakaia_daemon::{server, Service};
use std::fs;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tokio::net::UnixListener;

fn test_config(dir: &TempDir) -> Config {
    Config::with_dirs(&dir.path().join("state"), dir.path())
}

fn id(s: &str) -> StreamId {
    StreamId::new(s).unwrap()
}

/// Serve an in-process daemon on the config's socket
fn spawn_daemon(config: &Config) -> Arc<Service> {
    let listener = UnixListener::bind(&config.socket_path).unwrap();
    let service = Arc::new(Service::new(config.clone()).unwrap());
    tokio::spawn({
        let service = Arc::clone(&service);
        async move { server::serve(&listener, service).await }
    });
    service
}

/// Verify that connect() does not delete state files when daemon is not running.
///
/// The pid file may belong to a daemon that is mid-startup and has not bound
/// its socket yet.
#[test]
fn connect_does_not_delete_pid_file() {
    let temp = tempdir().unwrap();
    let config = test_config(&temp);

    fs::create_dir_all(&config.state_dir).unwrap();
    fs::write(&config.lock_path, "12345\n").unwrap();

    let result = DaemonClient::connect(&config);
    assert!(matches!(result, Err(ClientError::DaemonNotRunning)));

    assert!(config.lock_path.exists(), "connect() must not delete pid file");
}

#[test]
fn startup_error_is_read_from_last_marker() {
    let temp = tempdir().unwrap();
    let log = temp.path().join("daemon.log");
    fs::write(
        &log,
        "--- rakaiad: starting (pid: 1) ---\n\
         ERROR Failed to start daemon: old failure\n\
         --- rakaiad: starting (pid: 2) ---\n\
         ERROR Failed to start daemon: Failed to acquire lock: daemon already running?\n",
    )
    .unwrap();

    assert_eq!(
        read_startup_error(&log).as_deref(),
        Some("Failed to acquire lock: daemon already running?")
    );
}

#[test]
fn clean_startup_has_no_error() {
    let temp = tempdir().unwrap();
    let log = temp.path().join("daemon.log");
    fs::write(&log, "--- rakaiad: starting (pid: 3) ---\n INFO Daemon started\n").unwrap();

    assert_eq!(read_startup_error(&log), None);
}

#[test]
fn refusals_map_to_errors() {
    assert!(matches!(
        refusal(Response::Unauthorized),
        ClientError::Unauthorized
    ));
    assert!(matches!(
        refusal(Response::Conflict { stream_id: id("a") }),
        ClientError::Conflict(_)
    ));
    assert!(matches!(
        refusal(Response::AlreadyWritten { stream_id: id("a") }),
        ClientError::AlreadyWritten(_)
    ));
    assert!(matches!(
        refusal(Response::NotFound { stream_id: id("a") }),
        ClientError::NotFound(_)
    ));
    assert!(matches!(refusal(Response::Pong), ClientError::UnexpectedResponse));
}

#[tokio::test]
async fn upload_then_download_lines() {
    let temp = tempdir().unwrap();
    let config = test_config(&temp);
    spawn_daemon(&config);

    let client = DaemonClient::connect(&config).unwrap();
    let token = client.mint_token(&id("job/7")).await.unwrap();
    let written = client
        .upload(&id("job/7"), token, &b"one\ntwo\nthree"[..])
        .await
        .unwrap();
    assert_eq!(written, 13);

    let mut raw = Vec::new();
    client
        .download(&id("job/7"), ReadMode::Chunks, false, &mut raw)
        .await
        .unwrap();
    assert_eq!(raw, b"one\ntwo\nthree");

    // Line mode terminates the final partial line
    let mut lines = Vec::new();
    client
        .download(&id("job/7"), ReadMode::Lines, false, &mut lines)
        .await
        .unwrap();
    assert_eq!(lines, b"one\ntwo\nthree\n");
}

#[tokio::test]
async fn line_mode_normalizes_missing_final_newline() {
    let temp = tempdir().unwrap();
    let config = test_config(&temp);
    spawn_daemon(&config);
    let client = DaemonClient::connect(&config).unwrap();

    for (stream, content) in [("terminated", &b"a\nb\n"[..]), ("open", &b"a\nb"[..])] {
        let token = client.mint_token(&id(stream)).await.unwrap();
        client.upload(&id(stream), token, content).await.unwrap();

        let mut lines = Vec::new();
        client
            .download(&id(stream), ReadMode::Lines, false, &mut lines)
            .await
            .unwrap();
        assert_eq!(lines, b"a\nb\n", "stream {stream}");
    }
}

#[tokio::test]
async fn download_joins_line_longer_than_a_frame() {
    let temp = tempdir().unwrap();
    let config = test_config(&temp);
    spawn_daemon(&config);
    let client = DaemonClient::connect(&config).unwrap();

    let long_line = vec![b'x'; protocol::MAX_FRAME_PAYLOAD + 10];
    let token = client.mint_token(&id("huge")).await.unwrap();
    client
        .upload(&id("huge"), token, &long_line[..])
        .await
        .unwrap();

    let mut lines = Vec::new();
    client
        .download(&id("huge"), ReadMode::Lines, false, &mut lines)
        .await
        .unwrap();
    assert_eq!(lines.len(), long_line.len() + 1);
    assert_eq!(&lines[..long_line.len()], &long_line[..]);
    assert_eq!(lines.last(), Some(&b'\n'));
}

#[tokio::test]
async fn upload_with_bad_token_is_unauthorized() {
    let temp = tempdir().unwrap();
    let config = test_config(&temp);
    spawn_daemon(&config);

    let client = DaemonClient::connect(&config).unwrap();
    let result = client
        .upload(&id("job"), "deadbeef".to_string(), &b"nope"[..])
        .await;

    assert!(matches!(result, Err(ClientError::Unauthorized)));
}

#[tokio::test]
async fn second_upload_to_same_stream_is_rejected() {
    let temp = tempdir().unwrap();
    let config = test_config(&temp);
    spawn_daemon(&config);

    let client = DaemonClient::connect(&config).unwrap();
    let token = client.mint_token(&id("job")).await.unwrap();
    client
        .upload(&id("job"), token.clone(), &b"first"[..])
        .await
        .unwrap();

    let result = client.upload(&id("job"), token, &b"second"[..]).await;
    assert!(matches!(result, Err(ClientError::AlreadyWritten(_))));

    let mut out = Vec::new();
    client
        .download(&id("job"), ReadMode::Chunks, false, &mut out)
        .await
        .unwrap();
    assert_eq!(out, b"first");
}

#[tokio::test]
async fn download_of_unknown_stream_is_not_found() {
    let temp = tempdir().unwrap();
    let config = test_config(&temp);
    spawn_daemon(&config);

    let client = DaemonClient::connect(&config).unwrap();
    let mut out = Vec::new();
    let result = client
        .download(&id("missing"), ReadMode::Chunks, false, &mut out)
        .await;

    assert!(matches!(result, Err(ClientError::NotFound(_))));
    assert!(out.is_empty());
}

#[tokio::test]
async fn status_and_list_after_upload() {
    let temp = tempdir().unwrap();
    let config = test_config(&temp);
    spawn_daemon(&config);

    let client = DaemonClient::connect(&config).unwrap();
    let token = client.mint_token(&id("job")).await.unwrap();
    client.upload(&id("job"), token, &b"x"[..]).await.unwrap();

    let (_, active, finished) = client.status().await.unwrap();
    assert_eq!((active, finished), (0, 1));
    assert!(client.list_streams().await.unwrap().is_empty());
    assert_eq!(client.hello().await.unwrap(), env!("CARGO_PKG_VERSION"));
}
