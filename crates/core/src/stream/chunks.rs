// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-reader chunk cursor

use super::Shared;
use crate::error::StreamError;
use bytes::Bytes;
use futures::Stream;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Default cap on the size of one emitted chunk
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 16 * 1024;

/// Replays a stream from byte zero as a sequence of chunks
///
/// Each reader holds its own file handle and position. When caught up with
/// the writer it waits for the next broadcast; once caught up with a closed
/// stream the sequence ends. Concatenating every chunk yields exactly the
/// bytes written, in order.
#[derive(Debug)]
pub struct ChunkReader {
    shared: Arc<Shared>,
    file: tokio::fs::File,
    position: u64,
    max_chunk_size: usize,
}

impl ChunkReader {
    pub(crate) fn new(shared: Arc<Shared>, file: std::fs::File, max_chunk_size: usize) -> Self {
        Self {
            shared,
            file: tokio::fs::File::from_std(file),
            position: 0,
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    /// Next chunk, or `None` once the stream is closed and fully drained.
    ///
    /// Cancel-safe at the wait: dropping the future while it is suspended
    /// unregisters its wait token and leaves the position untouched.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        let shared = Arc::clone(&self.shared);
        loop {
            let notified = shared.notifier().register();
            let cursor = shared.cursor();

            if cursor.written > self.position {
                drop(notified);
                return self.read_up_to(cursor.written).await.map(Some);
            }
            if cursor.closed {
                tracing::trace!(bytes = self.position, "reader drained");
                return Ok(None);
            }

            notified.await;
        }
    }

    async fn read_up_to(&mut self, written: u64) -> Result<Bytes, StreamError> {
        let available = written - self.position;
        let want = usize::try_from(available)
            .unwrap_or(usize::MAX)
            .min(self.max_chunk_size);

        let mut buf = vec![0u8; want];
        let n = self.file.read(&mut buf).await?;
        if n == 0 {
            return Err(StreamError::Truncated {
                expected: written,
                position: self.position,
            });
        }

        buf.truncate(n);
        self.position += n as u64;
        Ok(Bytes::from(buf))
    }

    /// Bytes consumed by this reader so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Adapt into a [`Stream`] of chunks
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, StreamError>> + Send {
        futures::stream::try_unfold(self, |mut reader| async move {
            let next = reader.next_chunk().await;
            next.map(|chunk| chunk.map(|chunk| (chunk, reader)))
        })
    }
}

#[cfg(test)]
#[path = "chunks_tests.rs"]
mod tests;
