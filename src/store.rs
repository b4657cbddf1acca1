//! Durable row store for dispatch requests.
//!
//! The [`RequestStore`] is the source of truth for request lifecycle state.
//! Each request is written once at creation (`IN_PROGRESS`) and updated once
//! by the dispatch worker with its terminal status and failure code. Reads
//! are concurrent through the connection pool.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::types::{
    timestamp_from_millis, DecodeError, DispatchRequest, DispatchStatus, FailureCode,
};

/// Errors from row store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be decoded into its domain type.
    #[error("stored value decode error: {0}")]
    Decode(#[from] DecodeError),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS dispatch_requests (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    phone_number    TEXT NOT NULL,
    message         TEXT NOT NULL,
    status          INTEGER NOT NULL,
    failure_code    INTEGER NOT NULL,
    failure_comment TEXT,
    created_at      INTEGER NOT NULL,
    updated_at      INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_dispatch_requests_status ON dispatch_requests(status);
CREATE INDEX IF NOT EXISTS idx_dispatch_requests_created ON dispatch_requests(created_at);
"#;

/// Apply the row store schema.
///
/// Invoked once by the process entry point before any store is constructed.
///
/// # Errors
///
/// Returns the underlying database error if the DDL fails.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// Raw row returned by request queries.
///
/// Fields: `(id, phone_number, message, status, failure_code,
/// failure_comment, created_at, updated_at)`.
type RequestRow = (i64, String, String, i64, i64, Option<String>, i64, i64);

fn row_to_request(row: RequestRow) -> Result<DispatchRequest, StoreError> {
    let (id, phone_number, message, status, failure_code, failure_comment, created, updated) = row;
    Ok(DispatchRequest {
        id,
        phone_number,
        message,
        status: DispatchStatus::from_i64(status)?,
        failure_code: FailureCode::from_i64(failure_code)?,
        failure_comment,
        created_at: timestamp_from_millis(created)?,
        updated_at: timestamp_from_millis(updated)?,
    })
}

/// SQLite-backed request store.
#[derive(Debug, Clone)]
pub struct RequestStore {
    db: SqlitePool,
}

impl RequestStore {
    /// Create a store over an initialised pool.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a new request in `IN_PROGRESS` with failure code `SUCCESS`.
    ///
    /// Returns the persisted request with its assigned id.
    pub async fn insert(
        &self,
        phone_number: &str,
        message: &str,
    ) -> Result<DispatchRequest, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO dispatch_requests \
                 (phone_number, message, status, failure_code, failure_comment, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)",
        )
        .bind(phone_number)
        .bind(message)
        .bind(DispatchStatus::InProgress.as_i64())
        .bind(FailureCode::Success.as_i64())
        .bind(now.timestamp_millis())
        .execute(&self.db)
        .await?;

        let id = result.last_insert_rowid();
        debug!(request_id = id, phone_number, "dispatch request inserted");

        Ok(DispatchRequest {
            id,
            phone_number: phone_number.to_owned(),
            message: message.to_owned(),
            status: DispatchStatus::InProgress,
            failure_code: FailureCode::Success,
            failure_comment: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Write a request's status and failure code in one update.
    ///
    /// Status transitions are monotone: a terminal row may be overwritten by
    /// another terminal state (replayed consumes converge) but is never
    /// reverted to `IN_PROGRESS`. Returns whether a row was updated.
    pub async fn update_status_and_failure(
        &self,
        id: i64,
        status: DispatchStatus,
        failure_code: FailureCode,
        failure_comment: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE dispatch_requests \
             SET status = ?2, failure_code = ?3, failure_comment = ?4, updated_at = ?5 \
             WHERE id = ?1 AND (?2 != ?6 OR status = ?6)",
        )
        .bind(id)
        .bind(status.as_i64())
        .bind(failure_code.as_i64())
        .bind(failure_comment)
        .bind(Utc::now().timestamp_millis())
        .bind(DispatchStatus::InProgress.as_i64())
        .execute(&self.db)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            debug!(
                request_id = id,
                status = status.as_str(),
                failure_code = failure_code.as_str(),
                "request state updated"
            );
        } else {
            warn!(
                request_id = id,
                status = status.as_str(),
                "request state not updated (missing row or non-terminal overwrite)"
            );
        }
        Ok(updated)
    }

    /// Fetch a request by id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<DispatchRequest>, StoreError> {
        let row: Option<RequestRow> = sqlx::query_as(
            "SELECT id, phone_number, message, status, failure_code, failure_comment, \
                    created_at, updated_at \
             FROM dispatch_requests WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(row_to_request).transpose()
    }

    /// Fetch all requests with the given status, oldest first.
    pub async fn find_by_status(
        &self,
        status: DispatchStatus,
    ) -> Result<Vec<DispatchRequest>, StoreError> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            "SELECT id, phone_number, message, status, failure_code, failure_comment, \
                    created_at, updated_at \
             FROM dispatch_requests WHERE status = ?1 ORDER BY id",
        )
        .bind(status.as_i64())
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(row_to_request).collect()
    }

    /// Fetch every request, oldest first.
    pub async fn find_all(&self) -> Result<Vec<DispatchRequest>, StoreError> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            "SELECT id, phone_number, message, status, failure_code, failure_comment, \
                    created_at, updated_at \
             FROM dispatch_requests ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(row_to_request).collect()
    }

    /// Fetch requests created within `[from, to]` (inclusive), oldest first.
    pub async fn find_by_created_between(
        &self,
        from: chrono::DateTime<Utc>,
        to: chrono::DateTime<Utc>,
    ) -> Result<Vec<DispatchRequest>, StoreError> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            "SELECT id, phone_number, message, status, failure_code, failure_comment, \
                    created_at, updated_at \
             FROM dispatch_requests \
             WHERE created_at >= ?1 AND created_at <= ?2 \
             ORDER BY created_at, id",
        )
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(row_to_request).collect()
    }
}
