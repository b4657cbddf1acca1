//! Tests for `src/service.rs` — the request service write and read paths.

use std::sync::Arc;
use std::time::Duration;

use courier::blacklist::{BlacklistGate, SqliteBlacklist};
use courier::dispatch::{dispatch_queue, run_workers, DispatchWorker};
use courier::index::{SearchIndex, SearchQuery};
use courier::service::DispatchService;
use courier::store::RequestStore;
use courier::transport::{SendOutcome, TransportClient};
use courier::types::{DispatchStatus, FailureCode};

use crate::support::{memory_pool, store_only_pool, wait_for_terminal, ScriptedTransport};

#[tokio::test]
async fn create_request_persists_indexes_and_publishes() {
    let pool = memory_pool().await;
    let store = RequestStore::new(pool.clone());
    let index = SearchIndex::new(pool);
    let (producer, mut rx) = dispatch_queue(8, Duration::from_secs(1));
    let service = DispatchService::new(store.clone(), index.clone(), producer);

    let request = service
        .create_request("+911111111111", "welcome aboard")
        .await
        .expect("create should succeed");
    assert_eq!(request.status, DispatchStatus::InProgress);
    assert_eq!(request.failure_code, FailureCode::Success);

    // Row store copy is authoritative.
    let row = service
        .get_request(request.id)
        .await
        .expect("lookup")
        .expect("row exists");
    assert_eq!(row.phone_number, "+911111111111");

    // Index copy carries the creation-time metadata.
    let indexed = index.find_all().await.expect("index query");
    assert_eq!(indexed.len(), 1);
    assert_eq!(indexed[0].request_id, request.id);
    assert_eq!(indexed[0].message, "welcome aboard");

    // The id went onto the queue.
    assert_eq!(rx.recv().await, Some(request.id));
}

#[tokio::test]
async fn index_write_failure_is_best_effort() {
    // No search index schema: every index write fails.
    let pool = store_only_pool().await;
    let store = RequestStore::new(pool.clone());
    let index = SearchIndex::new(pool);
    let (producer, mut rx) = dispatch_queue(8, Duration::from_secs(1));
    let service = DispatchService::new(store.clone(), index, producer);

    let request = service
        .create_request("+15550001111", "hello")
        .await
        .expect("create should still succeed");

    let row = store
        .find_by_id(request.id)
        .await
        .expect("lookup")
        .expect("row exists");
    assert_eq!(row.status, DispatchStatus::InProgress);

    // Dispatch proceeds regardless of the index.
    assert_eq!(rx.recv().await, Some(request.id));
}

#[tokio::test]
async fn publish_failure_leaves_the_request_in_progress() {
    let pool = memory_pool().await;
    let store = RequestStore::new(pool.clone());
    let index = SearchIndex::new(pool);
    let (producer, rx) = dispatch_queue(8, Duration::from_millis(50));
    drop(rx);
    let service = DispatchService::new(store.clone(), index, producer);

    let request = service
        .create_request("+15550001111", "hello")
        .await
        .expect("create should still succeed");

    let row = store
        .find_by_id(request.id)
        .await
        .expect("lookup")
        .expect("row exists");
    assert_eq!(row.status, DispatchStatus::InProgress);
    assert_eq!(row.failure_code, FailureCode::Success);
}

#[tokio::test]
async fn end_to_end_blacklisted_and_clean_requests_diverge() {
    let pool = memory_pool().await;
    let store = RequestStore::new(pool.clone());
    let index = SearchIndex::new(pool.clone());
    let gate = SqliteBlacklist::new(pool);
    gate.add(&["+911111111112".to_owned()]).await.expect("add");

    let transport = Arc::new(ScriptedTransport::new(SendOutcome::Success));
    let transport_dyn: Arc<dyn TransportClient> = transport.clone();
    let worker = Arc::new(DispatchWorker::new(
        store.clone(),
        Arc::new(gate),
        transport_dyn,
    ));

    let (producer, rx) = dispatch_queue(16, Duration::from_secs(1));
    let handles = run_workers(2, rx, worker);
    let service = DispatchService::new(store.clone(), index, producer);

    let clean = service
        .create_request("+911111111111", "promo code inside")
        .await
        .expect("create");
    let blocked = service
        .create_request("+911111111112", "promo code inside")
        .await
        .expect("create");

    let clean_row = wait_for_terminal(&store, clean.id).await;
    let blocked_row = wait_for_terminal(&store, blocked.id).await;

    assert_eq!(clean_row.status, DispatchStatus::Finished);
    assert_eq!(clean_row.failure_code, FailureCode::Success);
    assert_eq!(blocked_row.status, DispatchStatus::Failed);
    assert_eq!(blocked_row.failure_code, FailureCode::BlacklistedPhoneNumber);
    // Only the clean request ever reached the transport.
    assert_eq!(transport.calls(), 1);

    // Both remain findable on each query surface.
    let finished = service
        .requests_by_status(DispatchStatus::Finished)
        .await
        .expect("status query");
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].id, clean.id);

    let matches = service
        .search(&SearchQuery {
            message_terms: vec!["promo".to_owned()],
            ..SearchQuery::default()
        })
        .await
        .expect("search");
    assert_eq!(matches.len(), 2);

    drop(service);
    for handle in handles {
        handle.await.expect("worker task should not panic");
    }
}
