//! Worker pool for parallel checksum processing
//!
//! A fixed number of worker threads drain a bounded crossbeam channel of
//! open-file items, run the policy, and unconditionally drop the handle.
//! Errors are funneled back to the walker through a buffered channel sized
//! to the worker count; the walker polls it between directory entries.
//!
//! Shutdown is cooperative: closing the work channel lets workers drain
//! whatever is already queued and exit, and `finish` joins them all before
//! surfacing any late error. First observed error wins.

use crate::error::BitsumError;
use crate::policy::Policy;
use crate::progress::Progress;
use crate::store::ChecksumStore;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::{File, Metadata};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// One file handed from the walker to exactly one worker.
///
/// The handle is closed (dropped) exactly once, when the worker finishes
/// with the item, regardless of outcome. The metadata was captured before
/// the file was opened.
pub struct WorkItem {
    pub file: File,
    pub path: PathBuf,
    pub metadata: Metadata,
}

/// Fixed-size pool of policy workers
pub struct WorkerPool {
    work_tx: Option<Sender<WorkItem>>,
    err_rx: Receiver<BitsumError>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` threads sharing the store and progress aggregator.
    /// The work queue is bounded, so the walker blocks when the pool falls
    /// behind.
    pub fn spawn(
        workers: usize,
        policy: Policy,
        store: Arc<dyn ChecksumStore>,
        progress: Arc<Progress>,
    ) -> io::Result<Self> {
        let (work_tx, work_rx) = bounded::<WorkItem>(workers * 2);
        let (err_tx, err_rx) = bounded::<BitsumError>(workers);

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let work_rx = work_rx.clone();
            let err_tx = err_tx.clone();
            let store = Arc::clone(&store);
            let progress = Arc::clone(&progress);
            let handle = thread::Builder::new()
                .name(format!("checker-{id}"))
                .spawn(move || worker_loop(id, work_rx, err_tx, policy, store, progress))?;
            handles.push(handle);
        }

        Ok(Self {
            work_tx: Some(work_tx),
            err_rx,
            handles,
        })
    }

    /// Hand an item to the pool, blocking while the queue is full.
    pub fn submit(&self, item: WorkItem) -> Result<(), BitsumError> {
        let tx = self.work_tx.as_ref().ok_or(BitsumError::PoolClosed)?;
        tx.send(item).map_err(|_| BitsumError::PoolClosed)
    }

    /// Non-blocking check for a worker error.
    pub fn poll_error(&self) -> Option<BitsumError> {
        self.err_rx.try_recv().ok()
    }

    /// Close the queue, let workers drain remaining items, join them, and
    /// return any error that arrived after the walker's last poll.
    pub fn finish(mut self) -> Option<BitsumError> {
        drop(self.work_tx.take());
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        self.err_rx.try_recv().ok()
    }
}

fn worker_loop(
    id: usize,
    work_rx: Receiver<WorkItem>,
    err_tx: Sender<BitsumError>,
    policy: Policy,
    store: Arc<dyn ChecksumStore>,
    progress: Arc<Progress>,
) {
    debug!(worker = id, "worker started");
    for item in work_rx.iter() {
        if let Err(err) = policy.apply(store.as_ref(), &progress, &item) {
            let wrapped = BitsumError::in_file(item.path.clone(), err);
            // Only the first observed error becomes the invocation result;
            // drop overflow rather than block the drain.
            if err_tx.try_send(wrapped).is_err() {
                debug!(worker = id, "error channel full, dropping error");
            }
        }
        // item dropped here: the handle is closed exactly once
    }
    debug!(worker = id, "worker exiting");
}
