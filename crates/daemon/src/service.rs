// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State shared by every connection of one daemon

use crate::archive::{Archive, LocalArchive};
use crate::config::Config;
use crate::layout::StreamLayout;
use crate::mint::{Mint, MintError};
use crate::registry::Registry;
use rakaia_core::Notifier;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug)]
pub struct Service {
    config: Config,
    registry: Registry,
    mint: Mint,
    start_time: Instant,
    shutdown_requested: AtomicBool,
    shutdown: Notifier,
}

impl Service {
    /// Service archiving to `config.archive_dir` on the local filesystem
    pub fn new(config: Config) -> Result<Self, MintError> {
        let archive = Arc::new(LocalArchive::new(&config.archive_dir));
        Self::with_archive(config, archive)
    }

    pub fn with_archive(config: Config, archive: Arc<dyn Archive>) -> Result<Self, MintError> {
        let registry = Registry::new(
            StreamLayout::new(&config.scratch_dir),
            archive,
            config.max_chunk_size,
        );
        Ok(Self {
            config,
            registry,
            mint: Mint::new()?,
            start_time: Instant::now(),
            shutdown_requested: AtomicBool::new(false),
            shutdown: Notifier::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn mint(&self) -> &Mint {
        &self.mint
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Ask the accept loop to stop
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.shutdown.notify_all();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been requested
    pub async fn shutdown_requested(&self) {
        loop {
            let notified = self.shutdown.register();
            if self.is_shutting_down() {
                return;
            }
            notified.await;
        }
    }
}
