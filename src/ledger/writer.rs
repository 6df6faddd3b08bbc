//! Single-writer queue applying ledger updates off the calling thread.
//!
//! Handles persist themselves from transport callbacks, which must never
//! block. Updates are pushed onto an unbounded channel and applied one at a
//! time, in submission order, by a dedicated Tokio task.

use super::{ArchivedRecord, Ledger, LedgerEntries};

use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Produces the task identifiers a purge must keep.
type KeepSet = Box<dyn FnOnce() -> Vec<String> + Send>;

enum LedgerOp {
    Save {
        scope: String,
        record: ArchivedRecord,
    },
    Delete {
        scope: String,
        task_id: String,
    },
    Retain {
        scope: String,
        keep: KeepSet,
        done: oneshot::Sender<usize>,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle to the ledger writer task.
#[derive(Clone)]
pub struct LedgerWriter {
    ledger: Arc<Ledger>,
    tx: mpsc::UnboundedSender<LedgerOp>,
}

impl fmt::Debug for LedgerWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerWriter")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl LedgerWriter {
    /// Spawns the writer task on the current Tokio runtime.
    pub fn spawn(ledger: Arc<Ledger>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LedgerOp>();
        let worker_ledger = ledger.clone();

        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                let ledger = worker_ledger.clone();
                match op {
                    LedgerOp::Save { scope, record } => {
                        let task_id = record.task_id.clone();
                        let res =
                            tokio::task::spawn_blocking(move || ledger.save(&scope, &record)).await;
                        match res {
                            Ok(Ok(())) => (),
                            Ok(Err(e)) => warn!("Failed to save ledger record {}: {}", task_id, e),
                            Err(e) => warn!("Ledger save for {} aborted: {}", task_id, e),
                        }
                    }
                    LedgerOp::Delete { scope, task_id } => {
                        let id = task_id.clone();
                        let res =
                            tokio::task::spawn_blocking(move || ledger.delete(&scope, &id)).await;
                        match res {
                            Ok(Ok(())) => (),
                            Ok(Err(e)) => {
                                warn!("Failed to delete ledger record {}: {}", task_id, e)
                            }
                            Err(e) => warn!("Ledger delete for {} aborted: {}", task_id, e),
                        }
                    }
                    LedgerOp::Retain { scope, keep, done } => {
                        let keep = keep();
                        let res =
                            tokio::task::spawn_blocking(move || ledger.retain(&scope, &keep)).await;
                        let removed = match res {
                            Ok(Ok(removed)) => removed,
                            Ok(Err(e)) => {
                                warn!("Failed to purge ledger: {}", e);
                                0
                            }
                            Err(e) => {
                                warn!("Ledger purge aborted: {}", e);
                                0
                            }
                        };
                        let _ = done.send(removed);
                    }
                    LedgerOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Ledger writer stopped");
        });

        Self { ledger, tx }
    }

    /// The ledger this writer applies updates to.
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Returns an accessor bound to `scope`.
    pub fn scoped(&self, scope: impl Into<String>) -> ScopedLedger {
        ScopedLedger {
            scope: scope.into(),
            writer: self.clone(),
        }
    }

    /// Waits until every update queued before this call has been applied.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(LedgerOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    fn submit(&self, op: LedgerOp) {
        if self.tx.send(op).is_err() {
            warn!("Ledger writer is gone, dropping update");
        }
    }
}

/// Ledger accessor bound to one session scope.
///
/// Every download handle carries one, instead of reaching for process-wide
/// storage.
#[derive(Clone, Debug)]
pub struct ScopedLedger {
    scope: String,
    writer: LedgerWriter,
}

impl ScopedLedger {
    /// The session scope.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Reads the records of this scope, synchronously.
    pub fn load(&self) -> LedgerEntries {
        self.writer.ledger.load(&self.scope)
    }

    /// Queues an upsert of `record`.
    pub fn save(&self, record: ArchivedRecord) {
        self.writer.submit(LedgerOp::Save {
            scope: self.scope.clone(),
            record,
        });
    }

    /// Queues the removal of `task_id`.
    pub fn delete(&self, task_id: impl Into<String>) {
        self.writer.submit(LedgerOp::Delete {
            scope: self.scope.clone(),
            task_id: task_id.into(),
        });
    }

    /// Queues the removal of every record whose task `keep` does not list,
    /// and waits for it.
    ///
    /// `keep` runs on the writer once every earlier update is applied.
    pub async fn retain<F>(&self, keep: F) -> usize
    where
        F: FnOnce() -> Vec<String> + Send + 'static,
    {
        let (done, wait) = oneshot::channel();
        self.writer.submit(LedgerOp::Retain {
            scope: self.scope.clone(),
            keep: Box::new(keep),
            done,
        });
        wait.await.unwrap_or(0)
    }

    /// Waits for every queued update to be applied.
    pub async fn flush(&self) {
        self.writer.flush().await
    }
}
