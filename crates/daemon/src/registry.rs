// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writer registry: which streams are live, and where finished ones went
//!
//! An entry exists from `begin_write` until `finish` has handed the file to
//! the archive and unlinked the scratch copy. Entry removal and unlink happen
//! under the same lock, so a reader opened from a live entry always finds
//! the file.
//!
//! A stream is written once. After its writer finishes, the id stays taken
//! for as long as the archive or a leftover scratch file holds its content,
//! so readers never see a finished stream reopened or truncated.
//!
//! ```text
//! begin_write ──► Reserved ──create──► Writing ──close──► Closed ──archive──► (removed, unlinked)
//! ```

use crate::archive::{Archive, ArchiveError};
use crate::layout::{LayoutError, StreamLayout};
use crate::protocol::{StreamState, StreamSummary};
use rakaia_core::{ChunkReader, Notifier, StreamError, StreamHandle, StreamId, StreamWriter};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("stream {0} already has a writer")]
    Conflict(StreamId),

    #[error("stream {0} was already written")]
    AlreadyWritten(StreamId),

    #[error("stream {0} not found")]
    NotFound(StreamId),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("archive failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// A write session's exclusive hold on one stream
#[derive(Debug)]
pub struct ActiveWrite {
    id: StreamId,
    writer: StreamWriter,
}

impl ActiveWrite {
    pub fn id(&self) -> &StreamId {
        &self.id
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), StreamError> {
        self.writer.write(data)
    }

    /// Bytes committed so far
    pub fn bytes(&self) -> u64 {
        self.writer.write_cursor()
    }
}

enum Entry {
    /// Claimed by a writer whose scratch file is not created yet
    Reserved,
    Live(StreamHandle),
}

enum Lookup {
    Live(ChunkReader),
    Reserved,
    Absent,
}

/// Live and finishing streams of one daemon
pub struct Registry {
    scratch: StreamLayout,
    archive: Arc<dyn Archive>,
    max_chunk_size: usize,
    entries: Mutex<HashMap<StreamId, Entry>>,
    finished: AtomicU64,
    /// Broadcast whenever a writer begins or a reservation is released
    started: Notifier,
}

impl Registry {
    pub fn new(scratch: StreamLayout, archive: Arc<dyn Archive>, max_chunk_size: usize) -> Self {
        Self {
            scratch,
            archive,
            max_chunk_size,
            entries: Mutex::new(HashMap::new()),
            finished: AtomicU64::new(0),
            started: Notifier::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StreamId, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim `id` for writing and create its scratch file.
    ///
    /// Fails with `Conflict` while another writer holds the id, and with
    /// `AlreadyWritten` once the stream has content in the archive or in a
    /// leftover scratch file.
    pub async fn begin_write(&self, id: &StreamId) -> Result<ActiveWrite, RegistryError> {
        let path = self.scratch.path_for(id)?;
        let reservation = self.reserve(id)?;

        let leftover = tokio::fs::try_exists(&path)
            .await
            .map_err(StreamError::from)?;
        if leftover || self.archive.locate(id).await?.is_some() {
            return Err(RegistryError::AlreadyWritten(id.clone()));
        }

        let writer = StreamWriter::create(path)?;
        reservation.fill(writer.handle());

        tracing::info!(stream_id = %id, "writer started");
        self.started.notify_all();

        Ok(ActiveWrite {
            id: id.clone(),
            writer,
        })
    }

    /// Close the stream, archive it, then drop the entry and the scratch file.
    ///
    /// Returns the stream length. If archiving fails the scratch file is left
    /// in place and keeps serving reads as a completed stream.
    pub async fn finish(&self, active: ActiveWrite) -> Result<u64, RegistryError> {
        let ActiveWrite { id, mut writer } = active;
        writer.close();
        let bytes = writer.write_cursor();

        let stored = self.archive.store(&id, writer.path()).await;

        let unlinked = {
            let mut entries = self.lock();
            entries.remove(&id);
            match &stored {
                Ok(_) => writer.unlink(),
                Err(_) => Ok(()),
            }
        };

        let dest = stored?;
        unlinked?;
        self.finished.fetch_add(1, Ordering::Relaxed);
        tracing::info!(stream_id = %id, bytes, archive = %dest.display(), "stream finished");
        Ok(bytes)
    }

    fn reserve(&self, id: &StreamId) -> Result<Reservation<'_>, RegistryError> {
        let mut entries = self.lock();
        if entries.contains_key(id) {
            return Err(RegistryError::Conflict(id.clone()));
        }
        entries.insert(id.clone(), Entry::Reserved);
        Ok(Reservation {
            registry: self,
            id: id.clone(),
            filled: false,
        })
    }

    /// Attach a chunk reader at byte zero.
    ///
    /// Live streams are read from scratch; otherwise from the archive, then
    /// from a scratch file left behind by an earlier failed hand-off.
    pub async fn attach(&self, id: &StreamId) -> Result<ChunkReader, RegistryError> {
        let reserved = match self.attach_live(id)? {
            Lookup::Live(reader) => return Ok(reader),
            Lookup::Reserved => true,
            Lookup::Absent => false,
        };

        if let Some(path) = self.archive.locate(id).await? {
            return self.attach_completed(id, &path);
        }

        // The scratch file of a reserved id may be mid-creation
        if reserved {
            return Err(RegistryError::NotFound(id.clone()));
        }

        let leftover = self.scratch.path_for(id)?;
        self.attach_completed(id, &leftover)
    }

    /// Like [`Registry::attach`], but a stream that does not exist yet is
    /// waited for until its writer begins.
    pub async fn attach_wait(&self, id: &StreamId) -> Result<ChunkReader, RegistryError> {
        loop {
            let started = self.started.register();
            match self.attach(id).await {
                Err(RegistryError::NotFound(_)) => started.await,
                other => return other,
            }
        }
    }

    fn attach_live(&self, id: &StreamId) -> Result<Lookup, RegistryError> {
        let entries = self.lock();
        match entries.get(id) {
            Some(Entry::Live(handle)) => Ok(Lookup::Live(handle.chunks(self.max_chunk_size)?)),
            Some(Entry::Reserved) => Ok(Lookup::Reserved),
            None => Ok(Lookup::Absent),
        }
    }

    fn attach_completed(&self, id: &StreamId, path: &Path) -> Result<ChunkReader, RegistryError> {
        let opened = StreamHandle::completed(path).and_then(|h| h.chunks(self.max_chunk_size));
        match opened {
            Ok(reader) => Ok(reader),
            Err(e) if e.is_not_found() => Err(RegistryError::NotFound(id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Streams with an entry, sorted by id
    pub fn summaries(&self) -> Vec<StreamSummary> {
        let mut summaries: Vec<StreamSummary> = self
            .lock()
            .iter()
            .filter_map(|(id, entry)| match entry {
                Entry::Live(handle) => Some((id, handle)),
                Entry::Reserved => None,
            })
            .map(|(id, handle)| StreamSummary {
                id: id.clone(),
                state: if handle.is_closed() {
                    StreamState::Closed
                } else {
                    StreamState::Writing
                },
                bytes: handle.write_cursor(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    pub fn active_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| matches!(entry, Entry::Live(_)))
            .count()
    }

    /// Streams successfully archived since startup
    pub fn finished_count(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("scratch", &self.scratch)
            .field("active", &self.active_count())
            .field("finished", &self.finished_count())
            .finish()
    }
}

/// Hold on an id between the conflict check and file creation; released on
/// drop unless filled
struct Reservation<'a> {
    registry: &'a Registry,
    id: StreamId,
    filled: bool,
}

impl Reservation<'_> {
    fn fill(mut self, handle: StreamHandle) {
        self.registry
            .lock()
            .insert(self.id.clone(), Entry::Live(handle));
        self.filled = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.filled {
            self.registry.lock().remove(&self.id);
            // Waiting readers retry the archive and leftover lookups
            self.registry.started.notify_all();
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
