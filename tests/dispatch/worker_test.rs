//! Tests for `src/dispatch/worker.rs` — the consumer state machine.

use std::sync::Arc;

use courier::blacklist::{BlacklistGate, SqliteBlacklist};
use courier::dispatch::worker::correlation_id;
use courier::dispatch::DispatchWorker;
use courier::store::RequestStore;
use courier::transport::{SendOutcome, SmsPayload};
use courier::types::{DispatchStatus, FailureCode};

use crate::support::{memory_pool, FailingGate, ScriptedTransport};

async fn worker_with(
    outcome: SendOutcome,
) -> (RequestStore, SqliteBlacklist, Arc<ScriptedTransport>, DispatchWorker) {
    let pool = memory_pool().await;
    let store = RequestStore::new(pool.clone());
    let gate = SqliteBlacklist::new(pool);
    let transport = Arc::new(ScriptedTransport::new(outcome));
    let transport_dyn: Arc<dyn courier::transport::TransportClient> = transport.clone();
    let worker = DispatchWorker::new(store.clone(), Arc::new(gate.clone()), transport_dyn);
    (store, gate, transport, worker)
}

#[tokio::test]
async fn successful_dispatch_finishes_the_request() {
    let (store, _gate, transport, worker) = worker_with(SendOutcome::Success).await;
    let request = store.insert("+911111111111", "order shipped").await.expect("insert");

    let result = worker.try_process(request.id).await.expect("processing should succeed");
    assert_eq!(result, Some((DispatchStatus::Finished, FailureCode::Success)));

    let row = store
        .find_by_id(request.id)
        .await
        .expect("lookup")
        .expect("row exists");
    assert_eq!(row.status, DispatchStatus::Finished);
    assert_eq!(row.failure_code, FailureCode::Success);
    assert_eq!(row.failure_comment, None);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn transport_payload_carries_deterministic_correlation_id() {
    let (store, _gate, transport, worker) = worker_with(SendOutcome::Success).await;
    let request = store.insert("+15550001111", "pin is 4242").await.expect("insert");

    worker.process(request.id).await;

    let payload = transport.last_payload().expect("transport should be called");
    assert_eq!(
        payload,
        SmsPayload::sms("pin is 4242", "+15550001111", &correlation_id(request.id))
    );
}

#[tokio::test]
async fn blacklisted_number_fails_without_touching_the_transport() {
    let (store, gate, transport, worker) = worker_with(SendOutcome::Success).await;
    gate.add(&["+911111111111".to_owned()]).await.expect("add");
    let request = store.insert("+911111111111", "hello").await.expect("insert");

    let result = worker.try_process(request.id).await.expect("processing should succeed");
    assert_eq!(
        result,
        Some((DispatchStatus::Failed, FailureCode::BlacklistedPhoneNumber))
    );

    let row = store
        .find_by_id(request.id)
        .await
        .expect("lookup")
        .expect("row exists");
    assert_eq!(row.failure_code, FailureCode::BlacklistedPhoneNumber);
    assert!(row.failure_comment.is_some());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn failed_blacklist_lookup_denies_dispatch() {
    let pool = memory_pool().await;
    let store = RequestStore::new(pool);
    let transport = Arc::new(ScriptedTransport::new(SendOutcome::Success));
    let transport_dyn: Arc<dyn courier::transport::TransportClient> = transport.clone();
    let worker = DispatchWorker::new(store.clone(), Arc::new(FailingGate), transport_dyn);
    let request = store.insert("+15550001111", "hello").await.expect("insert");

    let result = worker.try_process(request.id).await.expect("processing should succeed");
    assert_eq!(
        result,
        Some((DispatchStatus::Failed, FailureCode::BlacklistedPhoneNumber))
    );
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn transport_outcomes_map_to_their_failure_codes() {
    let cases = [
        (SendOutcome::Timeout, FailureCode::ExternalApiTimeout),
        (SendOutcome::ApiError, FailureCode::ExternalApiError),
        (SendOutcome::InvalidRequestBody, FailureCode::InvalidRequestBody),
        (SendOutcome::MalformedUrl, FailureCode::InvalidUrl),
    ];
    for (outcome, expected_code) in cases {
        let (store, _gate, _transport, worker) = worker_with(outcome).await;
        let request = store.insert("+15550001111", "hello").await.expect("insert");

        let result = worker.try_process(request.id).await.expect("processing should succeed");
        assert_eq!(result, Some((DispatchStatus::Failed, expected_code)));

        let row = store
            .find_by_id(request.id)
            .await
            .expect("lookup")
            .expect("row exists");
        assert_eq!(row.status, DispatchStatus::Failed);
        assert_eq!(row.failure_code, expected_code);
        assert!(row.failure_comment.is_some());
    }
}

#[tokio::test]
async fn unknown_request_id_produces_no_state_change() {
    let (_store, _gate, transport, worker) = worker_with(SendOutcome::Success).await;

    let result = worker.try_process(9999).await.expect("processing should succeed");
    assert_eq!(result, None);
    assert_eq!(transport.calls(), 0);

    // The swallowing entry point tolerates it too.
    worker.process(9999).await;
}

#[tokio::test]
async fn replayed_consume_converges_on_the_same_terminal_state() {
    let (store, _gate, transport, worker) = worker_with(SendOutcome::Success).await;
    let request = store.insert("+15550001111", "hello").await.expect("insert");

    worker.process(request.id).await;
    worker.process(request.id).await;

    let row = store
        .find_by_id(request.id)
        .await
        .expect("lookup")
        .expect("row exists");
    assert_eq!(row.status, DispatchStatus::Finished);
    assert_eq!(row.failure_code, FailureCode::Success);
    // Each consume is a full attempt; convergence comes from the state
    // machine, not from skipping work.
    assert_eq!(transport.calls(), 2);
}
