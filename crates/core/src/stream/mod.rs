// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tailable on-disk streams
//!
//! One [`StreamWriter`] appends to a file while any number of readers replay
//! it from byte zero, blocking for new bytes until the writer closes.
//!
//! ```text
//! StreamWriter::write → file + write cursor + notify_all
//!                                   ↓
//!       ChunkReader (own handle, own position) → LineReader
//! ```
//!
//! Readers never share a file cursor. The only state shared with the writer
//! is the write cursor, the closed flag, and the [`Notifier`].
//!
//! Unix only in practice: `unlink` relies on open handles outliving the
//! directory entry.

mod chunks;
mod lines;
mod writer;

pub use chunks::{ChunkReader, DEFAULT_MAX_CHUNK_SIZE};
pub use lines::{LineReader, LineSplitter, DELIMITER};
pub use writer::StreamWriter;

use crate::error::StreamError;
use crate::notifier::Notifier;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Snapshot of the writer's progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    /// Bytes committed so far; never decreases
    pub(crate) written: u64,
    /// One-way false → true; freezes `written`
    pub(crate) closed: bool,
}

/// State shared between the writer and every attached reader
#[derive(Debug)]
pub(crate) struct Shared {
    path: PathBuf,
    cursor: Mutex<Cursor>,
    notifier: Notifier,
}

impl Shared {
    fn new(path: PathBuf, written: u64, closed: bool) -> Self {
        Self {
            path,
            cursor: Mutex::new(Cursor { written, closed }),
            notifier: Notifier::new(),
        }
    }

    pub(crate) fn cursor(&self) -> Cursor {
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn advance(&self, len: u64) {
        {
            let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
            cursor.written += len;
        }
        self.notifier.notify_all();
    }

    /// Returns true if this call performed the transition.
    fn close(&self) -> bool {
        let transitioned = {
            let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
            !std::mem::replace(&mut cursor.closed, true)
        };
        self.notifier.notify_all();
        transitioned
    }
}

/// Cloneable read-side handle to a stream
///
/// Obtained from [`StreamWriter::handle`] for a live stream, or from
/// [`StreamHandle::completed`] for a finished file already on disk.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    shared: Arc<Shared>,
}

impl StreamHandle {
    /// Attach to a finished stream file: closed, with its current length
    /// as the write cursor.
    pub fn completed(path: impl Into<PathBuf>) -> Result<Self, StreamError> {
        let path = path.into();
        let len = std::fs::metadata(&path)
            .map_err(|e| StreamError::from_open(&path, e))?
            .len();
        Ok(Self {
            shared: Arc::new(Shared::new(path, len, true)),
        })
    }

    /// Attach a chunk reader positioned at byte zero.
    ///
    /// The file is opened before this returns, so the reader keeps working
    /// even if the stream is unlinked before its first poll.
    pub fn chunks(&self, max_chunk_size: usize) -> Result<ChunkReader, StreamError> {
        let file = File::open(&self.shared.path)
            .map_err(|e| StreamError::from_open(&self.shared.path, e))?;
        tracing::trace!(path = %self.shared.path.display(), "reader attached");
        Ok(ChunkReader::new(
            Arc::clone(&self.shared),
            file,
            max_chunk_size,
        ))
    }

    /// Attach a line reader positioned at byte zero.
    pub fn lines(&self, max_chunk_size: usize) -> Result<LineReader, StreamError> {
        Ok(LineReader::new(self.chunks(max_chunk_size)?))
    }

    /// Bytes committed by the writer so far
    pub fn write_cursor(&self) -> u64 {
        self.shared.cursor().written
    }

    pub fn is_closed(&self) -> bool {
        self.shared.cursor().closed
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }
}
