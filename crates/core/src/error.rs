// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the tailing core

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by stream writers and readers
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The single writer tried to append after closing the stream.
    #[error("write after close")]
    WriteAfterClose,

    #[error("stream truncated: {expected} bytes committed, read stopped at {position}")]
    Truncated { expected: u64, position: u64 },

    #[error("invalid stream id {id:?}: {reason}")]
    InvalidStreamId { id: String, reason: &'static str },
}

impl StreamError {
    /// Map an io error from opening `path`, keeping not-found distinct
    pub(crate) fn from_open(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
