//! Background persistence of the working set.
//!
//! Mutations push full snapshots onto an unbounded queue drained by a single
//! task. Writes happen in queue order, and snapshots that pile up behind a
//! slow write are coalesced so only the newest is written.

use crate::catalog::record::{Record, StoredRecord};
use crate::error::StoreError;
use crate::store::{to_entry, Collection, ObjectStore};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Write the whole working set into the records collection.
pub async fn persist(store: &dyn ObjectStore, records: &[Record]) -> Result<(), StoreError> {
    let entries = records
        .iter()
        .map(|record| to_entry(&StoredRecord::from(record)))
        .collect::<Result<Vec<_>, _>>()?;
    store.replace_all(Collection::Records, entries).await
}

/// Counters for the background writer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub scheduled: usize,
    pub written: usize,
    pub failed: usize,
    /// Snapshots superseded before they were written
    pub coalesced: usize,
}

enum Command {
    Snapshot(Vec<Record>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer
#[derive(Debug)]
pub struct PersistQueue {
    sender: mpsc::UnboundedSender<Command>,
    stats: Arc<RwLock<PersistStats>>,
}

impl PersistQueue {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn ObjectStore>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stats = Arc::new(RwLock::new(PersistStats::default()));
        tokio::spawn(Self::run(store, receiver, Arc::clone(&stats)));
        Self { sender, stats }
    }

    /// Queue a snapshot for writing. Never blocks.
    pub fn schedule(&self, snapshot: Vec<Record>) {
        self.stats.write().scheduled += 1;
        if self.sender.send(Command::Snapshot(snapshot)).is_err() {
            warn!("Persistence task has stopped; snapshot dropped");
        }
    }

    /// Wait until every snapshot scheduled so far has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Command::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }

    pub fn stats(&self) -> PersistStats {
        self.stats.read().clone()
    }

    async fn run(
        store: Arc<dyn ObjectStore>,
        mut receiver: mpsc::UnboundedReceiver<Command>,
        stats: Arc<RwLock<PersistStats>>,
    ) {
        while let Some(command) = receiver.recv().await {
            let mut latest = match command {
                Command::Snapshot(snapshot) => snapshot,
                Command::Flush(done) => {
                    let _ = done.send(());
                    continue;
                }
            };

            // Take everything already queued up to the next flush marker.
            let mut waiter = None;
            while let Ok(next) = receiver.try_recv() {
                match next {
                    Command::Snapshot(snapshot) => {
                        latest = snapshot;
                        stats.write().coalesced += 1;
                    }
                    Command::Flush(done) => {
                        waiter = Some(done);
                        break;
                    }
                }
            }

            match persist(store.as_ref(), &latest).await {
                Ok(()) => {
                    stats.write().written += 1;
                    debug!(count = latest.len(), "Persisted working set");
                }
                Err(e) => {
                    stats.write().failed += 1;
                    warn!(error = %e, count = latest.len(), "Failed to persist working set");
                }
            }

            if let Some(done) = waiter {
                let _ = done.send(());
            }
        }
        debug!("Persistence task stopped");
    }
}
