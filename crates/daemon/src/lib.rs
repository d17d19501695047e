// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rakaia-daemon: serves tailable streams over a Unix socket
//!
//! Writers upload with a per-stream token; any number of readers replay a
//! stream from byte zero while it is written and after it is archived.

pub mod archive;
pub mod config;
pub mod layout;
pub mod lifecycle;
pub mod mint;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod service;

pub use archive::{Archive, ArchiveError, LocalArchive};
pub use config::{Config, ConfigError};
pub use layout::{LayoutError, StreamLayout};
pub use lifecycle::{DaemonState, LifecycleError};
pub use mint::{Mint, MintError};
pub use protocol::{Frame, ProtocolError, ReadMode, Request, Response, StreamState, StreamSummary};
pub use registry::{ActiveWrite, Registry, RegistryError};
pub use server::ServerError;
pub use service::Service;
