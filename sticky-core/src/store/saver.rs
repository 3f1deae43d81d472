//! Debounced, serialized snapshot writes.
//!
//! The engine hands every post-mutation snapshot to a [`SaveScheduler`] and
//! moves on. [`DebouncedSaver`] keeps only the newest pending snapshot, writes
//! it once its delay expires, and performs writes one at a time on a blocking
//! thread so the window loop is never held up by disk I/O.

use super::SnapshotStore;
use crate::board::model::Snapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Accepts snapshots to be persisted later
pub trait SaveScheduler: Send {
    /// Replace any pending save with `snapshot`, due after `delay`
    fn schedule(&mut self, snapshot: Snapshot, delay: Duration);

    /// Write the pending snapshot now, if any
    fn flush(&mut self);
}

enum SaveCommand {
    Schedule { snapshot: Snapshot, delay: Duration },
    Flush { ack: Option<oneshot::Sender<()>> },
    Shutdown { ack: oneshot::Sender<()> },
}

/// Handle to the background save worker; clones talk to the same worker
#[derive(Clone)]
pub struct DebouncedSaver {
    tx: mpsc::UnboundedSender<SaveCommand>,
}

impl DebouncedSaver {
    /// Spawn the worker on the current tokio runtime
    pub fn spawn(store: Arc<dyn SnapshotStore>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(store, rx));
        (Self { tx }, handle)
    }

    /// Write the pending snapshot and wait until it is on disk
    pub async fn flushed(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(SaveCommand::Flush { ack: Some(ack) }).is_ok() {
            let _ = done.await;
        }
    }

    /// Flush and stop the worker
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(SaveCommand::Shutdown { ack }).is_ok() {
            let _ = done.await;
        }
    }
}

impl SaveScheduler for DebouncedSaver {
    fn schedule(&mut self, snapshot: Snapshot, delay: Duration) {
        if self
            .tx
            .send(SaveCommand::Schedule { snapshot, delay })
            .is_err()
        {
            tracing::warn!(event = "save_worker_gone");
        }
    }

    fn flush(&mut self) {
        let _ = self.tx.send(SaveCommand::Flush { ack: None });
    }
}

async fn run_worker(store: Arc<dyn SnapshotStore>, mut rx: mpsc::UnboundedReceiver<SaveCommand>) {
    let mut pending: Option<(Snapshot, Instant)> = None;

    loop {
        let deadline = pending.as_ref().map(|(_, due)| *due);

        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(SaveCommand::Schedule { snapshot, delay }) => {
                    pending = Some((snapshot, Instant::now() + delay));
                }
                Some(SaveCommand::Flush { ack }) => {
                    if let Some((snapshot, _)) = pending.take() {
                        write(&store, snapshot).await;
                    }
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                Some(SaveCommand::Shutdown { ack }) => {
                    if let Some((snapshot, _)) = pending.take() {
                        write(&store, snapshot).await;
                    }
                    let _ = ack.send(());
                    break;
                }
                None => {
                    // Every handle dropped: last chance to persist
                    if let Some((snapshot, _)) = pending.take() {
                        write(&store, snapshot).await;
                    }
                    break;
                }
            },

            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some((snapshot, _)) = pending.take() {
                    write(&store, snapshot).await;
                }
            }
        }
    }

    tracing::debug!(event = "save_worker_stopped");
}

async fn write(store: &Arc<dyn SnapshotStore>, snapshot: Snapshot) {
    let store = Arc::clone(store);
    let tasks = snapshot.tasks.len();
    match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
        Ok(Ok(())) => tracing::debug!(event = "snapshot_saved", tasks),
        Ok(Err(e)) => tracing::warn!(event = "snapshot_save_failed", error = %e),
        Err(e) => tracing::warn!(event = "snapshot_save_panicked", error = %e),
    }
}

/// Writes synchronously on every request; for one-shot tools like the CLI
pub struct ImmediateSaver {
    store: Arc<dyn SnapshotStore>,
}

impl ImmediateSaver {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }
}

impl SaveScheduler for ImmediateSaver {
    fn schedule(&mut self, snapshot: Snapshot, _delay: Duration) {
        if let Err(e) = self.store.save(&snapshot) {
            tracing::warn!(event = "snapshot_save_failed", error = %e);
        }
    }

    fn flush(&mut self) {}
}
