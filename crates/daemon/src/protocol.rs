// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between `rakaia` clients and `rakaiad`
//!
//! Every message is a 4-byte big-endian length prefix followed by the
//! payload. Control messages ([`Request`], [`Response`]) are JSON. Once a
//! write or read session is accepted, stream bytes travel as binary
//! [`Frame`]s: one tag byte, then raw payload.
//!
//! ```text
//! write:  Request::Write → Response::Ok → Frame::Data* → Frame::End → Response::Written
//! read:   Request::Read  → Response::Ok ← (Frame::More* Frame::Data)* ← Frame::End
//! ```
//!
//! An item larger than one frame (a very long line) is sent as `More`
//! frames followed by a final `Data` frame; [`read_item`] joins them.

use bytes::{Bytes, BytesMut};
use rakaia_core::StreamId;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version reported in the hello handshake
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout for reading a request or writing a response
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest accepted message payload
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Largest payload one frame carries after its tag byte
pub const MAX_FRAME_PAYLOAD: usize = MAX_MESSAGE_SIZE - 1;

const FRAME_DATA: u8 = 0x01;
const FRAME_END: u8 = 0x02;
const FRAME_MORE: u8 = 0x03;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timed out")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Invalid frame tag: {0:#04x}")]
    InvalidFrame(u8),

    #[error("Empty frame")]
    EmptyFrame,

    #[error("Stream ended inside a split item")]
    SplitItem,
}

/// How a read session segments the stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Raw chunks as they were read from disk
    #[default]
    Chunks,
    /// Newline-delimited lines, delimiter stripped
    Lines,
}

/// Requests from client to daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Version handshake
    Hello { version: String },

    Ping,

    Status,

    /// List streams with an active writer
    ListStreams,

    /// Mint the write token for a stream
    MintToken { stream_id: StreamId },

    /// Start a write session; frames follow once accepted
    Write { stream_id: StreamId, token: String },

    /// Start a read session; frames follow once accepted
    Read {
        stream_id: StreamId,
        #[serde(default)]
        mode: ReadMode,
        /// Wait for the stream to appear instead of failing with not-found
        #[serde(default)]
        wait: bool,
    },

    Shutdown,
}

impl Request {
    /// Variant name for logging; never includes tokens
    pub fn name(&self) -> &'static str {
        match self {
            Request::Hello { .. } => "Hello",
            Request::Ping => "Ping",
            Request::Status => "Status",
            Request::ListStreams => "ListStreams",
            Request::MintToken { .. } => "MintToken",
            Request::Write { .. } => "Write",
            Request::Read { .. } => "Read",
            Request::Shutdown => "Shutdown",
        }
    }
}

/// Lifecycle of a stream known to the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// A writer is attached and appending
    Writing,
    /// Writer closed; the stream is being handed to the archive
    Closed,
}

/// Summary of one stream for listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub id: StreamId,
    pub state: StreamState,
    pub bytes: u64,
}

/// Responses from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Hello { version: String },

    Pong,

    /// Generic success; also accepts a write or read session
    Ok,

    Status {
        uptime_secs: u64,
        streams_active: usize,
        streams_finished: u64,
    },

    Streams { streams: Vec<StreamSummary> },

    Token { token: String },

    /// Write session finished cleanly
    Written { bytes: u64 },

    /// Token missing or invalid; deliberately carries no detail
    Unauthorized,

    NotFound { stream_id: StreamId },

    /// The stream already has an active writer
    Conflict { stream_id: StreamId },

    /// The stream was written before; streams are written once
    AlreadyWritten { stream_id: StreamId },

    Error { message: String },

    ShuttingDown,
}

/// Binary frame carrying stream payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One chunk or one line, or the last piece of one; may be empty
    Data(Bytes),
    /// A leading piece of an item continued by the next frame
    More(Bytes),
    /// End of the sequence
    End,
}

/// Encode a message to JSON bytes (without length prefix)
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(msg)?)
}

/// Decode a message from JSON bytes
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write a length-prefixed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    write_parts(writer, &[data]).await
}

async fn write_parts<W: AsyncWrite + Unpin>(
    writer: &mut W,
    parts: &[&[u8]],
) -> Result<(), ProtocolError> {
    let len: usize = parts.iter().map(|p| p.len()).sum();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    writer.write_all(&(len as u32).to_be_bytes()).await?;
    for part in parts {
        writer.write_all(part).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Read a length-prefixed message
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut data = vec![0u8; len];
    match reader.read_exact(&mut data).await {
        Ok(_) => Ok(data),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => Err(e.into()),
    }
}

/// Read and decode a request, bounded by `timeout`
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let data = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&data)
}

/// Encode and write a response, bounded by `timeout`
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

/// Write one binary frame
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), ProtocolError> {
    match frame {
        Frame::Data(payload) => write_parts(writer, &[&[FRAME_DATA], payload.as_ref()]).await,
        Frame::More(payload) => write_parts(writer, &[&[FRAME_MORE], payload.as_ref()]).await,
        Frame::End => write_parts(writer, &[&[FRAME_END]]).await,
    }
}

/// Read one binary frame
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, ProtocolError> {
    let mut data = Bytes::from(read_message(reader).await?);
    if data.is_empty() {
        return Err(ProtocolError::EmptyFrame);
    }

    let tag = data[0];
    match tag {
        FRAME_DATA => Ok(Frame::Data(data.split_off(1))),
        FRAME_MORE => Ok(Frame::More(data.split_off(1))),
        FRAME_END if data.len() == 1 => Ok(Frame::End),
        other => Err(ProtocolError::InvalidFrame(other)),
    }
}

/// Write one item, splitting it into `More` frames when it exceeds a frame
pub async fn write_item<W: AsyncWrite + Unpin>(
    writer: &mut W,
    mut item: Bytes,
) -> Result<(), ProtocolError> {
    while item.len() > MAX_FRAME_PAYLOAD {
        let head = item.split_to(MAX_FRAME_PAYLOAD);
        write_frame(writer, &Frame::More(head)).await?;
    }
    write_frame(writer, &Frame::Data(item)).await
}

/// Read the next whole item, or `None` at the end frame
pub async fn read_item<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Bytes>, ProtocolError> {
    let mut pending: Option<BytesMut> = None;
    loop {
        match read_frame(reader).await? {
            Frame::More(piece) => pending
                .get_or_insert_with(BytesMut::new)
                .extend_from_slice(&piece),
            Frame::Data(last) => {
                return Ok(Some(match pending {
                    Some(mut joined) => {
                        joined.extend_from_slice(&last);
                        joined.freeze()
                    }
                    None => last,
                }));
            }
            Frame::End if pending.is_some() => return Err(ProtocolError::SplitItem),
            Frame::End => return Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
