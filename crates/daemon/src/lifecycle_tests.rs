// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> Config {
    Config::with_dirs(&dir.path().join("state"), &dir.path().join("sock"))
}

#[tokio::test]
async fn startup_creates_files_and_private_socket() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let _daemon = startup(&config).await.unwrap();

    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert_eq!(
        std::fs::read_to_string(&config.version_path).unwrap(),
        env!("CARGO_PKG_VERSION")
    );
    assert!(config.scratch_dir.is_dir());
    assert!(config.archive_dir.is_dir());

    let mode = std::fs::metadata(&config.socket_path)
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn second_startup_fails_without_touching_first() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let _first = startup(&config).await.unwrap();
    let second = startup(&config).await;

    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));
    assert!(config.socket_path.exists());
    assert!(config.version_path.exists());
    assert!(!std::fs::read_to_string(&config.lock_path)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn startup_replaces_stale_socket() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    std::fs::create_dir_all(config.socket_path.parent().unwrap()).unwrap();
    std::fs::write(&config.socket_path, b"stale").unwrap();

    let _daemon = startup(&config).await.unwrap();

    assert!(tokio::net::UnixStream::connect(&config.socket_path)
        .await
        .is_ok());
}

#[tokio::test]
async fn shutdown_removes_runtime_files() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let mut daemon = startup(&config).await.unwrap();
    daemon.shutdown().await.unwrap();

    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
    assert!(!config.version_path.exists());
}
