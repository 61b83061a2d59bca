//! Bounded background queue for snapshot exports.
//!
//! Readers enqueue with `try_send` and never wait on an export. One worker
//! task owns the receiving side; on shutdown it stops accepting work, drains
//! what is already queued and exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use strata_core::snapshot::SnapshotView;

use super::SnapshotExporter;
use crate::shutdown::Shutdown;

pub struct ExportQueue {
    tx: mpsc::Sender<SnapshotView>,
    stop: Shutdown,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ExportQueue {
    /// Spawns the worker. `capacity` of zero is treated as one.
    ///
    /// The worker also stops when `process` is triggered.
    pub fn start(exporter: Arc<SnapshotExporter>, capacity: usize, process: Shutdown) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stop = Shutdown::new();
        let worker = tokio::spawn(run_worker(exporter, rx, stop.clone(), process));

        Self {
            tx,
            stop,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues an export of `view`. Returns `false` when the queue is full or
    /// already shut down.
    pub fn enqueue(&self, view: SnapshotView) -> bool {
        match self.tx.try_send(view) {
            Ok(()) => {
                debug!(%view, "Queued snapshot export");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                // A queued export will capture the same repository state.
                info!(%view, "Export queue full, dropping request");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(%view, "Export queue closed, dropping request");
                false
            }
        }
    }

    /// Stops the worker after it drains queued exports, waiting at most
    /// `timeout`. Calling it more than once is a no-op.
    pub async fn shutdown(&self, timeout: Duration) {
        self.stop.trigger();

        let Some(handle) = self.worker.lock().await.take() else {
            return;
        };

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => info!("Export queue drained"),
            Ok(Err(e)) => warn!(error = %e, "Export worker terminated abnormally"),
            Err(_) => warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Export queue did not drain before timeout"
            ),
        }
    }
}

async fn run_worker(
    exporter: Arc<SnapshotExporter>,
    mut rx: mpsc::Receiver<SnapshotView>,
    stop: Shutdown,
    process: Shutdown,
) {
    info!("Export worker started");

    loop {
        tokio::select! {
            job = rx.recv() => match job {
                Some(view) => {
                    exporter.export(view).await;
                }
                None => break,
            },
            _ = stop.wait() => break,
            _ = process.wait() => break,
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Some(view) = rx.recv().await {
        exporter.export(view).await;
        drained += 1;
    }

    info!(drained, "Export worker stopped");
}
