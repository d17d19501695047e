// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use rakaia_core::{LineReader, StreamError, StreamId};
use tokio::io::AsyncReadExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn, Instrument};

use crate::protocol::{self, Frame, ProtocolError, ReadMode, Request, Response, PROTOCOL_VERSION};
use crate::registry::{ActiveWrite, RegistryError};
use crate::service::Service;

/// Accept connections until shutdown is requested over IPC
///
/// Each connection runs as its own task; sessions still in flight when this
/// returns are left running.
pub async fn serve(listener: &UnixListener, service: Arc<Service>) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => spawn_connection(Arc::clone(&service), stream),
                    Err(e) => error!("Error accepting connection: {}", e),
                }
            }
            _ = service.shutdown_requested() => return,
        }
    }
}

fn spawn_connection(service: Arc<Service>, stream: UnixStream) {
    let span = tracing::info_span!("connection", id = %uuid::Uuid::new_v4());
    tokio::spawn(
        async move {
            if let Err(e) = handle_connection(&service, stream).await {
                error!("Error handling connection: {}", e);
            }
        }
        .instrument(span),
    );
}

/// Handle a single client connection
pub async fn handle_connection(service: &Service, stream: UnixStream) -> Result<(), ServerError> {
    let timeout = service.config().request_timeout;
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, timeout).await {
        Ok(req) => req,
        Err(ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!(request = request.name(), "Received request");

    match request {
        Request::Write { .. } | Request::Read { .. } if service.is_shutting_down() => {
            respond(&mut writer, &Response::ShuttingDown, timeout).await
        }
        Request::Write { stream_id, token } => {
            write_session(service, stream_id, &token, reader, writer).await
        }
        Request::Read {
            stream_id,
            mode,
            wait,
        } => read_session(service, stream_id, mode, wait, reader, writer).await,
        other => {
            let response = handle_request(service, other);
            respond(&mut writer, &response, timeout).await
        }
    }
}

async fn respond(
    writer: &mut OwnedWriteHalf,
    response: &Response,
    timeout: std::time::Duration,
) -> Result<(), ServerError> {
    debug!("Sending response: {:?}", response);
    protocol::write_response(writer, response, timeout)
        .await
        .map_err(ServerError::Protocol)
}

/// Handle a control request and return a response
fn handle_request(service: &Service, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => Response::Status {
            uptime_secs: service.uptime_secs(),
            streams_active: service.registry().active_count(),
            streams_finished: service.registry().finished_count(),
        },

        Request::ListStreams => Response::Streams {
            streams: service.registry().summaries(),
        },

        Request::MintToken { stream_id } => {
            if service.config().allow_mint {
                Response::Token {
                    token: service.mint().mint(&stream_id),
                }
            } else {
                warn!(stream_id = %stream_id, "token mint disabled");
                Response::Unauthorized
            }
        }

        Request::Shutdown => {
            service.request_shutdown();
            Response::ShuttingDown
        }

        Request::Write { .. } | Request::Read { .. } => Response::Error {
            message: "session requests are not control requests".to_string(),
        },
    }
}

/// Receive an upload: `Ok`, then data frames until an end frame
async fn write_session(
    service: &Service,
    stream_id: StreamId,
    token: &str,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
) -> Result<(), ServerError> {
    let timeout = service.config().request_timeout;

    if service.mint().validate(&stream_id, token).is_err() {
        warn!(stream_id = %stream_id, "write rejected: unauthorized");
        return respond(&mut writer, &Response::Unauthorized, timeout).await;
    }

    let mut active = match service.registry().begin_write(&stream_id).await {
        Ok(active) => active,
        Err(RegistryError::Conflict(stream_id)) => {
            warn!(stream_id = %stream_id, "write rejected: stream already has a writer");
            return respond(&mut writer, &Response::Conflict { stream_id }, timeout).await;
        }
        Err(RegistryError::AlreadyWritten(stream_id)) => {
            warn!(stream_id = %stream_id, "write rejected: stream already written");
            let response = Response::AlreadyWritten { stream_id };
            return respond(&mut writer, &response, timeout).await;
        }
        Err(e) => {
            error!(stream_id = %stream_id, "failed to start writer: {}", e);
            let response = Response::Error {
                message: e.to_string(),
            };
            return respond(&mut writer, &response, timeout).await;
        }
    };

    let received = match respond(&mut writer, &Response::Ok, timeout).await {
        Ok(()) => receive_frames(service, &mut active, &mut reader).await,
        Err(e) => Err(e),
    };
    let bytes_received = active.bytes();

    // The stream is finished on every path so readers always terminate.
    let finished = service.registry().finish(active).await;

    match (received, finished) {
        (Ok(()), Ok(bytes)) => respond(&mut writer, &Response::Written { bytes }, timeout).await,
        (Ok(()), Err(e)) => {
            error!(stream_id = %stream_id, "failed to finish stream: {}", e);
            let response = Response::Error {
                message: e.to_string(),
            };
            respond(&mut writer, &response, timeout).await
        }
        (Err(e), finished) => {
            warn!(
                stream_id = %stream_id,
                bytes = bytes_received,
                "write session ended early, stream closed: {}",
                e
            );
            if let Err(fe) = finished {
                error!(stream_id = %stream_id, "failed to finish stream: {}", fe);
            }
            if matches!(e, ServerError::IdleTimeout | ServerError::Stream(_)) {
                let response = Response::Error {
                    message: e.to_string(),
                };
                let _ = protocol::write_response(&mut writer, &response, timeout).await;
            }
            Ok(())
        }
    }
}

async fn receive_frames(
    service: &Service,
    active: &mut ActiveWrite,
    reader: &mut OwnedReadHalf,
) -> Result<(), ServerError> {
    let idle_timeout = service.config().idle_timeout;
    loop {
        let frame = tokio::time::timeout(idle_timeout, protocol::read_frame(reader))
            .await
            .map_err(|_| ServerError::IdleTimeout)??;

        match frame {
            Frame::Data(data) | Frame::More(data) => active.write(&data)?,
            Frame::End => {
                debug!(stream_id = %active.id(), bytes = active.bytes(), "upload complete");
                return Ok(());
            }
        }
    }
}

/// Serve a stream: `Ok`, then one data frame per chunk or line, then an end frame
async fn read_session(
    service: &Service,
    stream_id: StreamId,
    mode: ReadMode,
    wait: bool,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
) -> Result<(), ServerError> {
    let timeout = service.config().request_timeout;
    let registry = service.registry();

    let attached = if wait {
        tokio::select! {
            attached = registry.attach_wait(&stream_id) => attached,
            _ = client_gone(&mut reader) => {
                debug!(stream_id = %stream_id, "reader left before the stream started");
                return Ok(());
            }
        }
    } else {
        registry.attach(&stream_id).await
    };

    let chunks = match attached {
        Ok(chunks) => chunks,
        Err(RegistryError::NotFound(stream_id)) => {
            return respond(&mut writer, &Response::NotFound { stream_id }, timeout).await;
        }
        Err(e) => {
            error!(stream_id = %stream_id, "failed to attach reader: {}", e);
            let response = Response::Error {
                message: e.to_string(),
            };
            return respond(&mut writer, &response, timeout).await;
        }
    };

    respond(&mut writer, &Response::Ok, timeout).await?;
    info!(stream_id = %stream_id, ?mode, "reader attached");

    match mode {
        ReadMode::Chunks => send_frames(chunks.into_stream(), &mut reader, &mut writer).await,
        ReadMode::Lines => {
            let lines = LineReader::new(chunks).into_stream();
            send_frames(lines, &mut reader, &mut writer).await
        }
    }
}

async fn send_frames(
    items: impl Stream<Item = Result<Bytes, StreamError>>,
    reader: &mut OwnedReadHalf,
    writer: &mut OwnedWriteHalf,
) -> Result<(), ServerError> {
    let mut items = std::pin::pin!(items);
    let mut gone = std::pin::pin!(client_gone(reader));

    loop {
        tokio::select! {
            item = items.next() => match item {
                Some(Ok(data)) => protocol::write_item(writer, data).await?,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    protocol::write_frame(writer, &Frame::End).await?;
                    return Ok(());
                }
            },
            _ = &mut gone => {
                debug!("reader disconnected");
                return Ok(());
            }
        }
    }
}

/// Resolves when the peer closes its end; stray input is discarded
async fn client_gone(reader: &mut OwnedReadHalf) {
    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request timeout")]
    Timeout,

    #[error("Idle timeout waiting for upload data")]
    IdleTimeout,

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}
