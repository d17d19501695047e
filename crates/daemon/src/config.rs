// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration
//!
//! Resolved in three layers: built-in defaults, then an optional
//! `<state_dir>/config.toml`, then `RAKAIA_*` environment variables.

use rakaia_core::DEFAULT_MAX_CHUNK_SIZE;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_STATE_DIR: &str = "RAKAIA_STATE_DIR";
pub const ENV_SOCKET_DIR: &str = "RAKAIA_SOCKET_DIR";
pub const ENV_SCRATCH_DIR: &str = "RAKAIA_SCRATCH_DIR";
pub const ENV_ARCHIVE_DIR: &str = "RAKAIA_ARCHIVE_DIR";
pub const ENV_MAX_CHUNK_SIZE: &str = "RAKAIA_MAX_CHUNK_SIZE";
pub const ENV_IDLE_TIMEOUT_MS: &str = "RAKAIA_IDLE_TIMEOUT_MS";
pub const ENV_TIMEOUT_IPC_MS: &str = "RAKAIA_TIMEOUT_IPC_MS";
pub const ENV_ALLOW_MINT: &str = "RAKAIA_ALLOW_MINT";

const CONFIG_FILE: &str = "config.toml";
const SOCKET_NAME: &str = "rakaiad.sock";
const DEFAULT_SOCKET_DIR: &str = "/tmp/rakaia";
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine state directory (set RAKAIA_STATE_DIR or HOME)")]
    NoStateDir,

    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Invalid config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("max_chunk_size must be greater than zero")]
    ZeroChunkSize,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for pid, version, log and config files
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// In-flight stream files
    pub scratch_dir: PathBuf,
    /// Finished stream files
    pub archive_dir: PathBuf,
    /// Cap on one chunk handed to a reader
    pub max_chunk_size: usize,
    /// Longest gap between frames of a write session
    pub idle_timeout: Duration,
    /// Bound on reading the first request and writing control responses
    pub request_timeout: Duration,
    /// Serve `MintToken` over the socket
    pub allow_mint: bool,
}

/// Contents of `config.toml`; every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    socket_path: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    archive_dir: Option<PathBuf>,
    max_chunk_size: Option<usize>,
    #[serde(default, with = "humantime_serde")]
    idle_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    request_timeout: Option<Duration>,
    allow_mint: Option<bool>,
}

impl Config {
    /// Resolve from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` in place of the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let state_dir = state_dir(&lookup)?;
        let socket_dir = lookup(ENV_SOCKET_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_DIR));

        let mut config = Self::with_dirs(&state_dir, &socket_dir);

        let file = read_file_config(&state_dir.join(CONFIG_FILE))?;
        config.apply_file(file);
        config.apply_env(&lookup)?;

        if config.max_chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        Ok(config)
    }

    /// Defaults rooted at `state_dir`, with the socket in `socket_dir`
    pub fn with_dirs(state_dir: &Path, socket_dir: &Path) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            socket_path: socket_dir.join(SOCKET_NAME),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            scratch_dir: state_dir.join("streams"),
            archive_dir: state_dir.join("archive"),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            allow_mint: true,
        }
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(path) = file.socket_path {
            self.socket_path = path;
        }
        if let Some(dir) = file.scratch_dir {
            self.scratch_dir = dir;
        }
        if let Some(dir) = file.archive_dir {
            self.archive_dir = dir;
        }
        if let Some(size) = file.max_chunk_size {
            self.max_chunk_size = size;
        }
        if let Some(timeout) = file.idle_timeout {
            self.idle_timeout = timeout;
        }
        if let Some(timeout) = file.request_timeout {
            self.request_timeout = timeout;
        }
        if let Some(allow) = file.allow_mint {
            self.allow_mint = allow;
        }
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(dir) = lookup(ENV_SCRATCH_DIR) {
            self.scratch_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_ARCHIVE_DIR) {
            self.archive_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_MAX_CHUNK_SIZE) {
            self.max_chunk_size = parse_env(ENV_MAX_CHUNK_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_IDLE_TIMEOUT_MS) {
            self.idle_timeout = Duration::from_millis(parse_env(ENV_IDLE_TIMEOUT_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_TIMEOUT_IPC_MS) {
            self.request_timeout = Duration::from_millis(parse_env(ENV_TIMEOUT_IPC_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_ALLOW_MINT) {
            self.allow_mint = match value.as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_ALLOW_MINT,
                        value,
                    })
                }
            };
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(e) => return Err(ConfigError::Read(path.to_path_buf(), e)),
    };
    toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

/// State directory: `RAKAIA_STATE_DIR`, else `$XDG_STATE_HOME/rakaia`,
/// else `~/.local/state/rakaia`
fn state_dir(lookup: &impl Fn(&str) -> Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = lookup(ENV_STATE_DIR) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = lookup("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("rakaia"));
    }

    let home = lookup("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .ok_or(ConfigError::NoStateDir)?;
    Ok(home.join(".local/state/rakaia"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
