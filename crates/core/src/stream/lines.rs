// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Newline re-segmentation of a chunk sequence
//!
//! Chunks arrive with arbitrary boundaries: a line may span many chunks and
//! a chunk may hold many lines. [`LineSplitter`] carries the unterminated
//! tail of the current line between chunks. The tail only ever grows by
//! appending, so a long line delivered one byte per chunk costs linear time
//! rather than re-copying the tail on every chunk.

use super::ChunkReader;
use crate::error::StreamError;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::collections::VecDeque;

/// Line delimiter; stripped from emitted lines
pub const DELIMITER: u8 = b'\n';

/// Synchronous chunk-to-line state machine
///
/// Feeding the chunks of a byte sequence `D` through [`push`](Self::push)
/// and then calling [`finish`](Self::finish) yields the same lines as
/// splitting `D` on the delimiter in one go, except that a final delimiter
/// does not produce a trailing empty line.
#[derive(Debug, Default)]
pub struct LineSplitter {
    /// Tail of the current line; never contains the delimiter
    trailing: BytesMut,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk, appending every line it completes to `out`.
    ///
    /// Empty chunks are legal and produce nothing.
    pub fn push(&mut self, mut chunk: Bytes, out: &mut impl Extend<Bytes>) {
        while let Some(idx) = chunk.iter().position(|&b| b == DELIMITER) {
            let segment = chunk.split_to(idx);
            chunk = chunk.slice(1..);

            if self.trailing.is_empty() {
                out.extend(Some(segment));
            } else {
                self.trailing.extend_from_slice(&segment);
                out.extend(Some(self.trailing.split().freeze()));
            }
        }
        self.trailing.extend_from_slice(&chunk);
    }

    /// Flush the unterminated final line, if any.
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.trailing.is_empty() {
            None
        } else {
            Some(self.trailing.split().freeze())
        }
    }

    /// Length of the partial line currently carried
    pub fn pending_len(&self) -> usize {
        self.trailing.len()
    }
}

/// Replays a stream from byte zero as newline-delimited lines
///
/// Empty lines are preserved. If the stream closes mid-line, the partial
/// line is emitted last.
#[derive(Debug)]
pub struct LineReader {
    chunks: ChunkReader,
    splitter: LineSplitter,
    ready: VecDeque<Bytes>,
    drained: bool,
}

impl LineReader {
    pub fn new(chunks: ChunkReader) -> Self {
        Self {
            chunks,
            splitter: LineSplitter::new(),
            ready: VecDeque::new(),
            drained: false,
        }
    }

    /// Next line without its delimiter, or `None` at end of stream.
    pub async fn next_line(&mut self) -> Result<Option<Bytes>, StreamError> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(Some(line));
            }
            if self.drained {
                return Ok(None);
            }

            match self.chunks.next_chunk().await? {
                Some(chunk) => self.splitter.push(chunk, &mut self.ready),
                None => {
                    self.drained = true;
                    return Ok(self.splitter.finish());
                }
            }
        }
    }

    /// Adapt into a [`Stream`] of lines
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, StreamError>> + Send {
        futures::stream::try_unfold(self, |mut reader| async move {
            let next = reader.next_line().await;
            next.map(|line| line.map(|line| (line, reader)))
        })
    }
}

#[cfg(test)]
#[path = "lines_tests.rs"]
mod tests;
