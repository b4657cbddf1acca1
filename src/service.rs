//! Request service: orchestrates creation and read paths.
//!
//! `create_request` is the only write path exposed to callers. Its contract:
//! the row store write is durable and authoritative; the search index write
//! is best-effort (logged on failure, never rolled back); the queue publish
//! is best-effort (a request whose publish fails stays `IN_PROGRESS`). No
//! failure past the row store write surfaces to the caller — terminal
//! outcomes are expressed as status/failure-code pairs, not errors.
//!
//! Reads are pure lookups against the row store or the search index and
//! never touch the queue.

use chrono::{DateTime, Utc};
use tracing::error;

use crate::dispatch::Producer;
use crate::index::{IndexError, SearchIndex, SearchQuery};
use crate::store::{RequestStore, StoreError};
use crate::types::{DispatchRequest, DispatchStatus, IndexedRequest};

/// Orchestrator over the row store, search index, and dispatch producer.
#[derive(Debug, Clone)]
pub struct DispatchService {
    store: RequestStore,
    index: SearchIndex,
    producer: Producer,
}

impl DispatchService {
    /// Create a service over its collaborators.
    pub fn new(store: RequestStore, index: SearchIndex, producer: Producer) -> Self {
        Self {
            store,
            index,
            producer,
        }
    }

    /// Accept a delivery request: durable insert, best-effort index write,
    /// queue publish.
    ///
    /// # Errors
    ///
    /// Only a failed row store insert is an error; index and publish
    /// failures are logged and the created request is still returned.
    pub async fn create_request(
        &self,
        phone_number: &str,
        message: &str,
    ) -> Result<DispatchRequest, StoreError> {
        let request = self.store.insert(phone_number, message).await?;

        // The two stores are not transactionally linked; the index copy is
        // creation-time metadata only and may lag or be missing.
        if let Err(err) = self
            .index
            .index(&IndexedRequest::from_request(&request))
            .await
        {
            error!(
                request_id = request.id,
                error = %err,
                "search index write failed; row store remains authoritative"
            );
        }

        if !self.producer.publish(request.id).await {
            error!(
                request_id = request.id,
                "dispatch publish failed; request remains IN_PROGRESS"
            );
        }

        Ok(request)
    }

    /// Fetch one request's exact lifecycle state.
    pub async fn get_request(&self, id: i64) -> Result<Option<DispatchRequest>, StoreError> {
        self.store.find_by_id(id).await
    }

    /// List requests in a given lifecycle state.
    pub async fn requests_by_status(
        &self,
        status: DispatchStatus,
    ) -> Result<Vec<DispatchRequest>, StoreError> {
        self.store.find_by_status(status).await
    }

    /// List every recorded request.
    pub async fn all_requests(&self) -> Result<Vec<DispatchRequest>, StoreError> {
        self.store.find_all().await
    }

    /// List requests created within `[from, to]` (inclusive).
    pub async fn requests_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DispatchRequest>, StoreError> {
        self.store.find_by_created_between(from, to).await
    }

    /// Query the search index with combinable filters.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<IndexedRequest>, IndexError> {
        self.index.search(query).await
    }
}
