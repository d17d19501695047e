// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rakaia-core: tailable on-disk byte streams
//!
//! This crate provides:
//! - A broadcast [`Notifier`] with no memory between broadcasts
//! - A single [`StreamWriter`] per stream that appends to a file
//! - Any number of [`ChunkReader`]s replaying the whole stream from byte zero
//! - [`LineReader`] / [`LineSplitter`] re-segmenting chunks into lines
//! - Path-safe [`StreamId`]s

pub mod error;
pub mod notifier;
pub mod stream;
pub mod stream_id;

pub use error::StreamError;
pub use notifier::Notifier;
pub use stream::{
    ChunkReader, LineReader, LineSplitter, StreamHandle, StreamWriter, DEFAULT_MAX_CHUNK_SIZE,
    DELIMITER,
};
pub use stream_id::{StreamId, MAX_STREAM_ID_LEN};
