// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-writer side of a tailable stream

use super::{ChunkReader, LineReader, Shared, StreamHandle};
use crate::error::StreamError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Owns the backing file of one stream and appends to it
///
/// Writes go straight to the file (no userspace buffering) so that readers
/// in the same process see every committed byte. Each write and the close
/// transition wake all waiting readers.
///
/// The writer closes the stream when dropped.
#[derive(Debug)]
pub struct StreamWriter {
    shared: Arc<Shared>,
    file: File,
}

impl StreamWriter {
    /// Create (or truncate) the backing file at `path`
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, StreamError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        tracing::debug!(path = %path.display(), "stream created");

        Ok(Self {
            shared: Arc::new(Shared::new(path, 0, false)),
            file,
        })
    }

    /// Append `data`, advance the write cursor, and wake readers.
    ///
    /// Storage errors propagate; the cursor only advances once the bytes
    /// are in the file.
    pub fn write(&mut self, data: &[u8]) -> Result<(), StreamError> {
        if self.shared.cursor().closed {
            return Err(StreamError::WriteAfterClose);
        }

        self.file.write_all(data)?;
        self.file.flush()?;
        self.shared.advance(data.len() as u64);
        Ok(())
    }

    /// Mark the stream closed and wake readers. Idempotent.
    pub fn close(&mut self) {
        if self.shared.close() {
            tracing::debug!(
                path = %self.shared.path.display(),
                bytes = self.shared.cursor().written,
                "stream closed"
            );
        }
    }

    /// Close the stream, then remove the backing file.
    ///
    /// Readers that already hold an open handle keep reading the full
    /// stream; new attaches fail with [`StreamError::NotFound`]. Calling
    /// this again is a no-op.
    pub fn unlink(&mut self) -> Result<(), StreamError> {
        self.close();
        match std::fs::remove_file(&self.shared.path) {
            Ok(()) => {
                tracing::debug!(path = %self.shared.path.display(), "stream unlinked");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read-side handle for attaching readers without owning the writer
    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn chunks(&self, max_chunk_size: usize) -> Result<ChunkReader, StreamError> {
        self.handle().chunks(max_chunk_size)
    }

    pub fn lines(&self, max_chunk_size: usize) -> Result<LineReader, StreamError> {
        self.handle().lines(max_chunk_size)
    }

    /// Bytes committed so far
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

impl Drop for StreamWriter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
