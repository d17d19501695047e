// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const SHORT: Duration = Duration::from_millis(20);
const LONG: Duration = Duration::from_secs(5);

fn spawn_waiter(notifier: &Arc<Notifier>, tx: mpsc::UnboundedSender<&'static str>) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        notifier.wait().await;
        let _ = tx.send("notified");
    });
}

#[tokio::test]
async fn notify_all_wakes_every_waiter() {
    let notifier = Arc::new(Notifier::new());
    let (tx, mut rx) = mpsc::unbounded_channel();

    spawn_waiter(&notifier, tx.clone());
    spawn_waiter(&notifier, tx);

    tokio::time::sleep(SHORT).await;
    assert!(rx.try_recv().is_err(), "nobody should wake before a broadcast");

    notifier.notify_all();

    assert_eq!(timeout(LONG, rx.recv()).await.unwrap(), Some("notified"));
    assert_eq!(timeout(LONG, rx.recv()).await.unwrap(), Some("notified"));
}

#[tokio::test]
async fn wait_started_after_broadcast_is_not_satisfied_by_it() {
    let notifier = Notifier::new();
    notifier.notify_all();

    assert!(timeout(SHORT, notifier.wait()).await.is_err());
}

#[tokio::test]
async fn wait_after_broadcast_completes_on_the_next_one() {
    let notifier = Arc::new(Notifier::new());
    notifier.notify_all();

    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_waiter(&notifier, tx);

    tokio::time::sleep(SHORT).await;
    assert!(rx.try_recv().is_err());

    notifier.notify_all();
    assert_eq!(timeout(LONG, rx.recv()).await.unwrap(), Some("notified"));
}

#[tokio::test]
async fn registered_token_is_woken_before_first_poll() {
    let notifier = Notifier::new();

    let notified = notifier.register();
    notifier.notify_all();

    assert!(timeout(LONG, notified).await.is_ok());
}

#[tokio::test]
async fn token_is_resolved_by_one_broadcast_only() {
    let notifier = Notifier::new();

    let first = notifier.register();
    notifier.notify_all();
    assert!(timeout(LONG, first).await.is_ok());

    let second = notifier.register();
    assert!(timeout(SHORT, second).await.is_err());
}

#[tokio::test]
async fn dropped_token_does_not_disturb_other_waiters() {
    let notifier = Notifier::new();

    let abandoned = notifier.register();
    let kept = notifier.register();
    drop(abandoned);

    notifier.notify_all();
    assert!(timeout(LONG, kept).await.is_ok());
}

#[tokio::test]
async fn aborted_waiter_task_is_removed_cleanly() {
    let notifier = Arc::new(Notifier::new());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let doomed = {
        let notifier = Arc::clone(&notifier);
        tokio::spawn(async move { notifier.wait().await })
    };
    spawn_waiter(&notifier, tx);

    tokio::time::sleep(SHORT).await;
    doomed.abort();
    assert!(doomed.await.unwrap_err().is_cancelled());

    notifier.notify_all();
    assert_eq!(timeout(LONG, rx.recv()).await.unwrap(), Some("notified"));
}
