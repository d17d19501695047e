// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast wake-up primitive
//!
//! A [`Notifier`] wakes every task currently waiting on it, all at once, and
//! carries no payload. It has no memory: a wait registered after a broadcast
//! is not satisfied by that broadcast and blocks until the next one.
//!
//! Waiters must re-check their own condition after waking. The safe pattern
//! is register, check, then await:
//!
//! ```
//! # async fn demo(notifier: &rakaia_core::Notifier, ready: impl Fn() -> bool) {
//! loop {
//!     let notified = notifier.register();
//!     if ready() {
//!         break;
//!     }
//!     notified.await;
//! }
//! # }
//! ```
//!
//! Registering before the check closes the window where a broadcast could
//! land between the check and the wait.

use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// Broadcast condition without data
#[derive(Debug, Default)]
pub struct Notifier {
    inner: Notify,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a one-shot wait token.
    ///
    /// The token counts as waiting from the moment it is created, even before
    /// it is first polled. Dropping it unregisters it without affecting any
    /// other waiter.
    pub fn register(&self) -> Notified<'_> {
        self.inner.notified()
    }

    /// Suspend until the next [`Notifier::notify_all`] call made after this one.
    pub async fn wait(&self) {
        self.inner.notified().await
    }

    /// Wake every registered waiter exactly once and clear the waiter set.
    pub fn notify_all(&self) {
        self.inner.notify_waiters();
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
