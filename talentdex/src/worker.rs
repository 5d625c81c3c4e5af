//! Background index worker
//!
//! The user-facing write path never waits on the index. It hands a job to a
//! bounded queue and returns; a single task drains the queue in order and runs
//! each write on the blocking pool. A full queue drops the job (counted), and a
//! failed write is counted and remembered, so drift is observable instead of
//! silent. Dropped or failed documents are repaired by the next write of the
//! same candidate or by a reindex.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, warn};

use crate::indexer::Indexer;
use crate::models::IndexDocument;

enum IndexJob {
    Upsert(IndexDocument),
    Delete(String),
    Flush(oneshot::Sender<()>),
}

/// Snapshot of the worker's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexingStats {
    /// Jobs accepted into the queue
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    /// Jobs rejected because the queue was full or closed
    pub dropped: u64,
    pub last_failure: Option<String>,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    last_failure: Mutex<Option<String>>,
}

impl Counters {
    fn record_failure(&self, message: String) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock() = Some(message);
    }
}

pub struct IndexWorker {
    tx: mpsc::Sender<IndexJob>,
    counters: Arc<Counters>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
    // Cancels `shutdown` when the worker is dropped
    _guard: DropGuard,
}

impl IndexWorker {
    /// Start the worker task on `runtime`
    pub fn spawn(indexer: Arc<Indexer>, capacity: usize, runtime: &tokio::runtime::Handle) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let shutdown = CancellationToken::new();

        let task = runtime.spawn(run(rx, indexer, Arc::clone(&counters), shutdown.clone()));

        Self {
            tx,
            counters,
            task: Mutex::new(Some(task)),
            _guard: shutdown.clone().drop_guard(),
            shutdown,
        }
    }

    /// Queue an upsert. Returns false if the job was dropped.
    pub fn dispatch_upsert(&self, document: IndexDocument) -> bool {
        let candidate_id = document.candidate_id.clone();
        self.dispatch(IndexJob::Upsert(document), &candidate_id)
    }

    /// Queue a delete. Returns false if the job was dropped.
    pub fn dispatch_delete(&self, candidate_id: String) -> bool {
        let id = candidate_id.clone();
        self.dispatch(IndexJob::Delete(candidate_id), &id)
    }

    fn dispatch(&self, job: IndexJob, candidate_id: &str) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => {
                self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "worker stopped",
                };
                warn!(candidate_id, reason, "Index job dropped");
                false
            }
        }
    }

    /// Wait until every job queued before this call has been processed
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(IndexJob::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    pub fn stats(&self) -> IndexingStats {
        IndexingStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            last_failure: self.counters.last_failure.lock().clone(),
        }
    }

    /// Stop accepting work, finish what is queued, and wait for the task
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Index worker task failed");
            }
        }
    }
}

async fn run(
    mut rx: mpsc::Receiver<IndexJob>,
    indexer: Arc<Indexer>,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            job = rx.recv() => match job {
                Some(job) => process(job, &indexer, &counters).await,
                None => break,
            },
            _ = shutdown.cancelled() => {
                rx.close();
                while let Some(job) = rx.recv().await {
                    process(job, &indexer, &counters).await;
                }
                break;
            }
        }
    }
    debug!("Index worker stopped");
}

async fn process(job: IndexJob, indexer: &Arc<Indexer>, counters: &Counters) {
    let (candidate_id, outcome) = match job {
        IndexJob::Flush(done) => {
            let _ = done.send(());
            return;
        }
        IndexJob::Upsert(document) => {
            let indexer = Arc::clone(indexer);
            let candidate_id = document.candidate_id.clone();
            let outcome = tokio::task::spawn_blocking(move || indexer.try_upsert(&document)).await;
            (candidate_id, outcome)
        }
        IndexJob::Delete(candidate_id) => {
            let indexer = Arc::clone(indexer);
            let id = candidate_id.clone();
            let outcome = tokio::task::spawn_blocking(move || indexer.try_remove(&id)).await;
            (candidate_id, outcome)
        }
    };

    match outcome {
        Ok(Ok(())) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(e)) => {
            error!(candidate_id = %candidate_id, error = %e, "Background index write failed");
            counters.record_failure(format!("{candidate_id}: {e}"));
        }
        Err(e) => {
            error!(candidate_id = %candidate_id, error = %e, "Background index task panicked");
            counters.record_failure(format!("{candidate_id}: {e}"));
        }
    }
}
