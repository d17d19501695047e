// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rakaia_core::StreamId;
use rakaia_daemon::protocol::{self, Frame, ProtocolError, ReadMode};
use rakaia_daemon::{Config, Request, Response, StreamSummary};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;

/// Upload frame size when streaming stdin
const UPLOAD_CHUNK: usize = 64 * 1024;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests (hello, status, mint, shutdown)
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("RAKAIA_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for daemon to start
pub fn timeout_connect() -> Duration {
    parse_duration_ms("RAKAIA_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for process to exit
pub fn timeout_exit() -> Duration {
    parse_duration_ms("RAKAIA_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(2))
}

/// Polling interval for retries
pub fn poll_interval() -> Duration {
    parse_duration_ms("RAKAIA_POLL_INTERVAL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Not authorized to write this stream")]
    Unauthorized,

    #[error("Stream {0} already has a writer")]
    Conflict(StreamId),

    #[error("Stream {0} was already written")]
    AlreadyWritten(StreamId),

    #[error("Stream {0} not found")]
    NotFound(StreamId),

    #[error("Daemon is shutting down")]
    ShuttingDown,

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Map a refusal to its error; anything else is unexpected here
fn refusal(response: Response) -> ClientError {
    match response {
        Response::Unauthorized => ClientError::Unauthorized,
        Response::Conflict { stream_id } => ClientError::Conflict(stream_id),
        Response::AlreadyWritten { stream_id } => ClientError::AlreadyWritten(stream_id),
        Response::NotFound { stream_id } => ClientError::NotFound(stream_id),
        Response::ShuttingDown => ClientError::ShuttingDown,
        Response::Error { message } => ClientError::Rejected(message),
        _ => ClientError::UnexpectedResponse,
    }
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to daemon, auto-starting if not running
    pub async fn connect_or_start(config: &Config) -> Result<Self, ClientError> {
        // Restart a daemon left over from another version
        if let Ok(daemon_version) = std::fs::read_to_string(&config.version_path) {
            if daemon_version.trim() != env!("CARGO_PKG_VERSION") {
                tracing::info!(
                    daemon = daemon_version.trim(),
                    cli = env!("CARGO_PKG_VERSION"),
                    "restarting daemon from another version"
                );
                let _ = daemon_stop(config).await;
            }
        }

        match Self::connect(config) {
            Ok(client) => Ok(client),
            Err(ClientError::DaemonNotRunning) => {
                tracing::debug!(socket = %config.socket_path.display(), "starting daemon");
                let child = start_daemon_background()?;
                Self::connect_with_retry(config, timeout_connect(), child).await
            }
            Err(e) => Err(wrap_with_startup_error(e, config)),
        }
    }

    /// Connect to existing daemon (no auto-start)
    pub fn connect(config: &Config) -> Result<Self, ClientError> {
        if !config.socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }

        Ok(Self {
            socket_path: config.socket_path.clone(),
        })
    }

    pub(crate) async fn connect_with_retry(
        config: &Config,
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            // Check if daemon process exited early (startup failure)
            if let Ok(Some(status)) = child.try_wait() {
                // Poll for startup error in log (filesystem may need to sync)
                let poll_start = Instant::now();
                while poll_start.elapsed() < timeout_exit() {
                    if let Some(err) = read_startup_error(&config.log_path) {
                        return Err(ClientError::DaemonStartFailed(err));
                    }
                    tokio::time::sleep(poll_interval()).await;
                }
                return Err(ClientError::DaemonStartFailed(format!(
                    "exited with {}",
                    status
                )));
            }

            match Self::connect(config) {
                Ok(client) => return Ok(client),
                Err(ClientError::DaemonNotRunning) => {
                    tokio::time::sleep(poll_interval()).await;
                }
                Err(e) => return Err(wrap_with_startup_error(e, config)),
            }
        }

        // Timeout - check log for startup errors
        Err(wrap_with_startup_error(
            ClientError::DaemonStartTimeout,
            config,
        ))
    }

    /// Open a connection and send one request, bounded by `timeout`
    async fn open(&self, request: &Request, timeout: Duration) -> Result<UnixStream, ClientError> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        let data = protocol::encode(request)?;
        tokio::time::timeout(timeout, protocol::write_message(&mut stream, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        Ok(stream)
    }

    async fn read_response(stream: &mut UnixStream, timeout: Duration) -> Result<Response, ClientError> {
        let response_bytes = tokio::time::timeout(timeout, protocol::read_message(stream))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        Ok(protocol::decode(&response_bytes)?)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let timeout = timeout_ipc();
        let mut stream = self.open(&request, timeout).await?;
        Self::read_response(&mut stream, timeout).await
    }

    /// Get daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            other => Err(refusal(other)),
        }
    }

    /// Get daemon status: uptime, active streams, finished streams
    pub async fn status(&self) -> Result<(u64, usize, u64), ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                streams_active,
                streams_finished,
            } => Ok((uptime_secs, streams_active, streams_finished)),
            other => Err(refusal(other)),
        }
    }

    pub async fn list_streams(&self) -> Result<Vec<StreamSummary>, ClientError> {
        match self.send(Request::ListStreams).await? {
            Response::Streams { streams } => Ok(streams),
            other => Err(refusal(other)),
        }
    }

    pub async fn mint_token(&self, stream_id: &StreamId) -> Result<String, ClientError> {
        match self
            .send(Request::MintToken {
                stream_id: stream_id.clone(),
            })
            .await?
        {
            Response::Token { token } => Ok(token),
            other => Err(refusal(other)),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Err(refusal(other)),
        }
    }

    /// Upload everything from `input` as the stream's content.
    ///
    /// Returns the byte count the daemon committed.
    pub async fn upload<R: AsyncRead + Unpin>(
        &self,
        stream_id: &StreamId,
        token: String,
        mut input: R,
    ) -> Result<u64, ClientError> {
        let timeout = timeout_ipc();
        let request = Request::Write {
            stream_id: stream_id.clone(),
            token,
        };
        let mut stream = self.open(&request, timeout).await?;
        match Self::read_response(&mut stream, timeout).await? {
            Response::Ok => {}
            other => return Err(refusal(other)),
        }

        let mut buf = vec![0u8; UPLOAD_CHUNK];
        loop {
            let n = input.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let frame = Frame::Data(Bytes::copy_from_slice(&buf[..n]));
            protocol::write_frame(&mut stream, &frame).await?;
        }
        protocol::write_frame(&mut stream, &Frame::End).await?;

        match Self::read_response(&mut stream, timeout).await? {
            Response::Written { bytes } => Ok(bytes),
            other => Err(refusal(other)),
        }
    }

    /// Copy a stream to `output` from byte zero until its writer closes.
    ///
    /// Line mode normalizes line endings: every line is written followed by
    /// a newline, including a final line the stream left unterminated.
    pub async fn download<W: AsyncWrite + Unpin>(
        &self,
        stream_id: &StreamId,
        mode: ReadMode,
        wait: bool,
        output: &mut W,
    ) -> Result<(), ClientError> {
        let timeout = timeout_ipc();
        let request = Request::Read {
            stream_id: stream_id.clone(),
            mode,
            wait,
        };
        let mut stream = self.open(&request, timeout).await?;

        // A waiting read is answered only once the stream exists
        let response = if wait {
            let bytes = protocol::read_message(&mut stream).await?;
            protocol::decode(&bytes)?
        } else {
            Self::read_response(&mut stream, timeout).await?
        };
        match response {
            Response::Ok => {}
            other => return Err(refusal(other)),
        }

        loop {
            match protocol::read_frame(&mut stream).await? {
                // Leading piece of a line too long for one frame
                Frame::More(piece) => output.write_all(&piece).await?,
                Frame::Data(data) => {
                    output.write_all(&data).await?;
                    if mode == ReadMode::Lines {
                        output.write_all(b"\n").await?;
                    }
                    output.flush().await?;
                }
                Frame::End => return Ok(()),
            }
        }
    }
}

/// Start the daemon in the background, returning the child process handle
pub(crate) fn start_daemon_background() -> Result<std::process::Child, ClientError> {
    let daemon_path = find_daemon_binary();

    Command::new(&daemon_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(e.to_string()))
}

/// Stop the daemon (graceful first, then forceful)
/// Returns true if daemon was stopped, false if it wasn't running
pub async fn daemon_stop(config: &Config) -> Result<bool, ClientError> {
    let client = match DaemonClient::connect(config) {
        Ok(c) => c,
        Err(ClientError::DaemonNotRunning) => {
            cleanup_stale_pid(config);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    // Try graceful shutdown (timeout handled by send())
    let shutdown_result = client.shutdown().await;

    if let Some(pid) = read_daemon_pid(config) {
        if shutdown_result.is_ok() {
            wait_for_exit(pid, timeout_exit()).await;
        }

        // Force kill if still running
        if process_exists(pid) {
            force_kill_daemon(pid);
            wait_for_exit(pid, timeout_exit()).await;
        }
    }

    cleanup_stale_pid(config);
    Ok(true)
}

/// Wait for a process to exit
async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval()).await;
    }
    false
}

/// Find the rakaiad binary
pub(crate) fn find_daemon_binary() -> PathBuf {
    // Explicit override (used by tests to ensure correct binary)
    if let Ok(path) = std::env::var("RAKAIA_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    // Running from cargo (development)
    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        let dev_path = PathBuf::from(manifest_dir)
            .parent()
            .and_then(|p| p.parent())
            .map(|p| p.join("target/debug/rakaiad"));
        if let Some(path) = dev_path {
            if path.exists() {
                return path;
            }
        }
    }

    // Installed next to the CLI
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("rakaiad");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    // Fall back to PATH lookup
    PathBuf::from("rakaiad")
}

/// Remove a PID file left behind by a daemon that is no longer running
fn cleanup_stale_pid(config: &Config) {
    if let Some(pid) = read_daemon_pid(config) {
        if process_exists(pid) {
            return;
        }
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Get the PID from the daemon PID file, if it exists
pub fn read_daemon_pid(config: &Config) -> Option<u32> {
    std::fs::read_to_string(&config.lock_path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
}

/// Check if a process with the given PID exists
pub fn process_exists(pid: u32) -> bool {
    // Use kill -0 to check if process exists without sending a signal
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Force kill a daemon process
pub fn force_kill_daemon(pid: u32) -> bool {
    Command::new("kill")
        .args(["-9", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Startup marker prefix that daemon writes to log before anything else.
/// Full format: "--- rakaiad: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- rakaiad: starting (pid: ";

/// Read daemon log from the last startup marker, looking for errors.
/// Returns the error message if found, None otherwise.
pub fn read_startup_error(log_path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(log_path).ok()?;

    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;
    let startup_log = &content[start_pos..];

    let errors: Vec<&str> = startup_log
        .lines()
        .filter(|line| line.contains(" ERROR ") || line.contains("Failed to start"))
        .collect();

    if errors.is_empty() {
        return None;
    }

    // Format: "timestamp LEVEL target: message"; keep the message part
    let error_messages: Vec<String> = errors
        .iter()
        .filter_map(|line| line.split_once(": ").map(|(_, msg)| msg.to_string()))
        .collect();

    if error_messages.is_empty() {
        Some(errors.join("\n"))
    } else {
        Some(error_messages.join("\n"))
    }
}

/// Wrap an error with startup log info if available.
fn wrap_with_startup_error(err: ClientError, config: &Config) -> ClientError {
    // Don't double-wrap
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }

    match read_startup_error(&config.log_path) {
        Some(startup_error) => ClientError::DaemonStartFailed(startup_error),
        None => err,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
