// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hand-off of finished streams to long-term storage

use crate::layout::{LayoutError, StreamLayout};
use async_trait::async_trait;
use rakaia_core::StreamId;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Destination for closed streams
#[async_trait]
pub trait Archive: Send + Sync + 'static {
    /// Persist the closed stream file at `source` under `id`
    async fn store(&self, id: &StreamId, source: &Path) -> Result<PathBuf, ArchiveError>;

    /// Location of an archived stream, if any
    async fn locate(&self, id: &StreamId) -> Result<Option<PathBuf>, ArchiveError>;
}

/// Archive on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalArchive {
    layout: StreamLayout,
}

impl LocalArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: StreamLayout::new(root),
        }
    }
}

#[async_trait]
impl Archive for LocalArchive {
    async fn store(&self, id: &StreamId, source: &Path) -> Result<PathBuf, ArchiveError> {
        let dest = self.layout.path_for(id)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Copy beside the destination, then rename into place so `locate`
        // never sees a partial file.
        let mut partial = dest.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let bytes = tokio::fs::copy(source, &partial).await?;
        if let Err(e) = tokio::fs::rename(&partial, &dest).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        tracing::debug!(stream_id = %id, bytes, dest = %dest.display(), "stream archived");
        Ok(dest)
    }

    async fn locate(&self, id: &StreamId) -> Result<Option<PathBuf>, ArchiveError> {
        let path = self.layout.path_for(id)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
