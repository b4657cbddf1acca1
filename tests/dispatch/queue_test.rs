//! Tests for `src/dispatch/queue.rs` — bounded queue and worker pool.

use std::sync::Arc;
use std::time::Duration;

use courier::blacklist::SqliteBlacklist;
use courier::dispatch::{dispatch_queue, run_workers, DispatchWorker};
use courier::store::RequestStore;
use courier::transport::{SendOutcome, TransportClient};
use courier::types::{DispatchStatus, FailureCode};

use crate::support::{memory_pool, wait_for_terminal, ScriptedTransport};

#[tokio::test]
async fn published_ids_drain_to_terminal_states() {
    let pool = memory_pool().await;
    let store = RequestStore::new(pool.clone());
    let transport = Arc::new(ScriptedTransport::new(SendOutcome::Success));
    let transport_dyn: Arc<dyn TransportClient> = transport.clone();
    let worker = Arc::new(DispatchWorker::new(
        store.clone(),
        Arc::new(SqliteBlacklist::new(pool)),
        transport_dyn,
    ));

    let (producer, rx) = dispatch_queue(16, Duration::from_secs(1));
    let handles = run_workers(2, rx, worker);

    let a = store.insert("+15550000001", "first").await.expect("insert");
    let b = store.insert("+15550000002", "second").await.expect("insert");
    assert!(producer.publish(a.id).await);
    assert!(producer.publish(b.id).await);

    let a_row = wait_for_terminal(&store, a.id).await;
    let b_row = wait_for_terminal(&store, b.id).await;
    assert_eq!(a_row.status, DispatchStatus::Finished);
    assert_eq!(b_row.status, DispatchStatus::Finished);
    assert_eq!(a_row.failure_code, FailureCode::Success);
    assert_eq!(transport.calls(), 2);

    drop(producer);
    for handle in handles {
        handle.await.expect("worker task should not panic");
    }
}

#[tokio::test]
async fn publish_reports_false_when_the_queue_stays_full() {
    // No consumers: the single slot fills and the bounded wait elapses.
    let (producer, _rx) = dispatch_queue(1, Duration::from_millis(50));
    assert!(producer.publish(1).await);
    assert!(!producer.publish(2).await);
}

#[tokio::test]
async fn publish_reports_false_after_consumers_are_gone() {
    let (producer, rx) = dispatch_queue(8, Duration::from_secs(1));
    drop(rx);
    assert!(!producer.publish(1).await);
}

#[tokio::test]
async fn a_bad_message_does_not_stall_the_pool() {
    let pool = memory_pool().await;
    let store = RequestStore::new(pool.clone());
    let transport = Arc::new(ScriptedTransport::new(SendOutcome::Success));
    let transport_dyn: Arc<dyn TransportClient> = transport.clone();
    let worker = Arc::new(DispatchWorker::new(
        store.clone(),
        Arc::new(SqliteBlacklist::new(pool)),
        transport_dyn,
    ));

    let (producer, rx) = dispatch_queue(16, Duration::from_secs(1));
    let handles = run_workers(1, rx, worker);

    // An id with no row is consumed, logged, and dropped.
    assert!(producer.publish(424242).await);

    let request = store.insert("+15550000003", "still flows").await.expect("insert");
    assert!(producer.publish(request.id).await);

    let row = wait_for_terminal(&store, request.id).await;
    assert_eq!(row.status, DispatchStatus::Finished);
    assert_eq!(transport.calls(), 1);

    drop(producer);
    for handle in handles {
        handle.await.expect("worker task should not panic");
    }
}
