//! Bounded dispatch queue carrying request ids from producer to workers.
//!
//! A single FIFO channel gives per-id ordering (all publishes for one id
//! land in the same queue); no ordering across ids is promised, since each
//! request is processed independently. The channel is bounded to provide
//! backpressure, and a publish blocks until the queue accepts the id or the
//! bounded wait elapses.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::worker::DispatchWorker;

/// Publisher half of the dispatch queue.
#[derive(Debug, Clone)]
pub struct Producer {
    tx: mpsc::Sender<i64>,
    publish_timeout: Duration,
}

impl Producer {
    /// Publish a request id, blocking until the queue acknowledges or the
    /// bounded wait elapses.
    ///
    /// Returns whether the id was accepted. A failed publish is logged and
    /// reported as `false` rather than an error: the request simply stays
    /// `IN_PROGRESS`.
    pub async fn publish(&self, request_id: i64) -> bool {
        match self.tx.send_timeout(request_id, self.publish_timeout).await {
            Ok(()) => {
                info!(request_id, "request id published to dispatch queue");
                true
            }
            Err(err) => {
                error!(request_id, error = %err, "failed to publish request id to dispatch queue");
                false
            }
        }
    }
}

/// Create the dispatch queue, returning the producer and the consume side.
pub fn dispatch_queue(
    capacity: usize,
    publish_timeout: Duration,
) -> (Producer, mpsc::Receiver<i64>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        Producer {
            tx,
            publish_timeout,
        },
        rx,
    )
}

/// Spawn `worker_count` consumer tasks sharing the queue's receive side.
///
/// Each worker pulls one id at a time and processes it to completion before
/// taking the next (no intra-worker pipelining). The tasks run until the
/// producer side is dropped and the queue drains; the returned handles can
/// be awaited for shutdown.
pub fn run_workers(
    worker_count: usize,
    rx: mpsc::Receiver<i64>,
    worker: Arc<DispatchWorker>,
) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(Mutex::new(rx));
    (0..worker_count)
        .map(|worker_id| {
            let rx = Arc::clone(&rx);
            let worker = Arc::clone(&worker);
            tokio::spawn(consume_loop(worker_id, rx, worker))
        })
        .collect()
}

async fn consume_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<i64>>>,
    worker: Arc<DispatchWorker>,
) {
    loop {
        // Hold the receiver lock only while pulling the next id so other
        // workers can consume while this one is processing.
        let next = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        match next {
            Some(request_id) => {
                debug!(worker_id, request_id, "consumed request id");
                worker.process(request_id).await;
            }
            None => break,
        }
    }
    debug!(worker_id, "dispatch worker stopped");
}
