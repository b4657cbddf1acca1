//! Consumer state machine: one consumed request id to one terminal state.
//!
//! Per consumed id the worker re-fetches the request, checks the blacklist
//! gate exactly once before any external call, invokes the transport client
//! if allowed, and persists the final status and failure code in a single
//! update. Every per-message failure is logged and isolated — the consume
//! loop never crashes on a bad message.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::blacklist::BlacklistGate;
use crate::store::{RequestStore, StoreError};
use crate::transport::{SendOutcome, SmsPayload, TransportClient};
use crate::types::{DispatchStatus, FailureCode};

/// Errors surfaced by one processing attempt.
///
/// These never escape the consume loop; [`DispatchWorker::process`] logs
/// them and moves on to the next message.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Row store read or write failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Derive the deterministic correlation id for a request.
///
/// UUIDv5 over the request id, so redelivered ids produce the same
/// correlation id and a downstream consumer can deduplicate attempts.
pub fn correlation_id(request_id: i64) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, request_id.to_string().as_bytes()).to_string()
}

/// Dispatch worker driving consumed request ids to a terminal state.
pub struct DispatchWorker {
    store: RequestStore,
    blacklist: Arc<dyn BlacklistGate>,
    transport: Arc<dyn TransportClient>,
}

impl std::fmt::Debug for DispatchWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchWorker").finish_non_exhaustive()
    }
}

impl DispatchWorker {
    /// Create a worker over its collaborators.
    pub fn new(
        store: RequestStore,
        blacklist: Arc<dyn BlacklistGate>,
        transport: Arc<dyn TransportClient>,
    ) -> Self {
        Self {
            store,
            blacklist,
            transport,
        }
    }

    /// Process one consumed request id, swallowing and logging any error.
    ///
    /// This is the consume-loop entry point: per-message isolation is
    /// mandatory, so no failure here may propagate to the caller.
    pub async fn process(&self, request_id: i64) {
        match self.try_process(request_id).await {
            Ok(Some((status, failure_code))) => {
                info!(
                    request_id,
                    status = status.as_str(),
                    failure_code = failure_code.as_str(),
                    "dispatch attempt recorded"
                );
            }
            Ok(None) => {
                error!(request_id, "consumed unknown request id; dropping");
            }
            Err(err) => {
                error!(request_id, error = %err, "failed to process dispatch request");
            }
        }
    }

    /// Run the dispatch state machine for one request id.
    ///
    /// Returns the terminal `(status, failure_code)` pair that was written,
    /// or `None` when the id has no row in the store (the only case where a
    /// consumed message produces no state change).
    pub async fn try_process(
        &self,
        request_id: i64,
    ) -> Result<Option<(DispatchStatus, FailureCode)>, DispatchError> {
        let Some(request) = self.store.find_by_id(request_id).await? else {
            return Ok(None);
        };

        // The gate is consulted exactly once, before any external call. A
        // failed lookup denies dispatch rather than guessing.
        let blocked = match self.blacklist.is_blacklisted(&request.phone_number).await {
            Ok(blocked) => blocked,
            Err(err) => {
                warn!(
                    request_id,
                    number = request.phone_number,
                    error = %err,
                    "blacklist lookup failed; denying dispatch"
                );
                true
            }
        };

        let (status, failure_code, comment) = if blocked {
            warn!(
                request_id,
                number = request.phone_number,
                "phone number is blacklisted; dispatch denied"
            );
            (
                DispatchStatus::Failed,
                FailureCode::BlacklistedPhoneNumber,
                Some("phone number is blacklisted".to_owned()),
            )
        } else {
            let correlation = correlation_id(request_id);
            let payload = SmsPayload::sms(&request.message, &request.phone_number, &correlation);
            let outcome = self.transport.send(&payload).await;
            outcome_to_state(outcome)
        };

        self.store
            .update_status_and_failure(request_id, status, failure_code, comment.as_deref())
            .await?;
        Ok(Some((status, failure_code)))
    }
}

/// Map a transport outcome onto the terminal `(status, failure code,
/// comment)` triple recorded in the row store.
fn outcome_to_state(outcome: SendOutcome) -> (DispatchStatus, FailureCode, Option<String>) {
    match outcome {
        SendOutcome::Success => (DispatchStatus::Finished, FailureCode::Success, None),
        SendOutcome::Timeout => (
            DispatchStatus::Failed,
            FailureCode::ExternalApiTimeout,
            Some("third-party API timed out".to_owned()),
        ),
        SendOutcome::InvalidRequestBody => (
            DispatchStatus::Failed,
            FailureCode::InvalidRequestBody,
            Some("transport payload could not be constructed".to_owned()),
        ),
        SendOutcome::MalformedUrl => (
            DispatchStatus::Failed,
            FailureCode::InvalidUrl,
            Some("third-party endpoint URL is malformed".to_owned()),
        ),
        SendOutcome::ApiError => (
            DispatchStatus::Failed,
            FailureCode::ExternalApiError,
            Some("third-party API returned an error".to_owned()),
        ),
    }
}
