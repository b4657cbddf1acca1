//! Search index over dispatch request metadata.
//!
//! A denormalized, eventually-consistent copy of each request's immutable
//! fields, backed by SQLite FTS5 for free-text message matching. Rows are
//! written once at request creation and never updated — status changes are
//! not projected here, so the index always reflects creation-time metadata
//! only. The row store remains the source of truth.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::types::{timestamp_from_millis, DecodeError, IndexedRequest};

/// Maximum rows returned by an unpaginated query.
pub const RESULT_CAP: i64 = 10_000;

/// Errors from search index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be decoded into its domain type.
    #[error("stored value decode error: {0}")]
    Decode(#[from] DecodeError),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS indexed_requests (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id   INTEGER NOT NULL,
    phone_number TEXT NOT NULL,
    message      TEXT NOT NULL,
    created_at   INTEGER NOT NULL,
    updated_at   INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_indexed_requests_created ON indexed_requests(created_at);
CREATE INDEX IF NOT EXISTS idx_indexed_requests_phone ON indexed_requests(phone_number);

CREATE VIRTUAL TABLE IF NOT EXISTS indexed_requests_fts
    USING fts5(message, content='indexed_requests', content_rowid='id');

CREATE TRIGGER IF NOT EXISTS indexed_requests_ai AFTER INSERT ON indexed_requests BEGIN
    INSERT INTO indexed_requests_fts(rowid, message) VALUES (new.id, new.message);
END;
"#;

/// Apply the search index schema.
///
/// Invoked once by the process entry point before any index is constructed.
///
/// # Errors
///
/// Returns the underlying database error if the DDL fails.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// Combinable search filters.
///
/// All filters are optional; an empty query returns everything up to
/// [`RESULT_CAP`]. Pagination applies only when both `page` and `size` are
/// present and `size` is non-zero.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Lower bound (inclusive) on creation time.
    pub from: Option<DateTime<Utc>>,
    /// Upper bound (inclusive) on creation time.
    pub to: Option<DateTime<Utc>>,
    /// Exact phone-number match.
    pub phone_number: Option<String>,
    /// Message terms; every term must match as a token/phrase.
    pub message_terms: Vec<String>,
    /// Zero-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub size: Option<u32>,
}

/// Raw row returned by index queries.
///
/// Fields: `(id, request_id, phone_number, message, created_at, updated_at)`.
type IndexRow = (i64, i64, String, String, i64, i64);

fn row_to_indexed(row: IndexRow) -> Result<IndexedRequest, IndexError> {
    let (id, request_id, phone_number, message, created, updated) = row;
    Ok(IndexedRequest {
        id: Some(id),
        request_id,
        phone_number,
        message,
        created_at: timestamp_from_millis(created)?,
        updated_at: timestamp_from_millis(updated)?,
    })
}

/// SQLite FTS5-backed search index.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    db: SqlitePool,
}

impl SearchIndex {
    /// Create an index over an initialised pool.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Write one denormalized request entry.
    ///
    /// Best-effort from the caller's perspective: the request service logs
    /// and continues on failure, it never rolls back the row store write.
    pub async fn index(&self, entry: &IndexedRequest) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO indexed_requests \
                 (request_id, phone_number, message, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(entry.request_id)
        .bind(&entry.phone_number)
        .bind(&entry.message)
        .bind(entry.created_at.timestamp_millis())
        .bind(entry.updated_at.timestamp_millis())
        .execute(&self.db)
        .await?;
        debug!(request_id = entry.request_id, "request indexed");
        Ok(())
    }

    /// Run a combinable filter query.
    ///
    /// Term matches are ranked by FTS5 relevance; otherwise results come
    /// back most recent first. Without pagination at most [`RESULT_CAP`]
    /// rows are returned.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<IndexedRequest>, IndexError> {
        let match_expr = fts_match_expression(&query.message_terms);
        // Terms were requested but none survived sanitisation: nothing can match.
        if !query.message_terms.is_empty() && match_expr.is_none() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT r.id, r.request_id, r.phone_number, r.message, r.created_at, r.updated_at \
             FROM indexed_requests r",
        );
        if match_expr.is_some() {
            qb.push(" JOIN indexed_requests_fts f ON f.rowid = r.id");
        }
        qb.push(" WHERE 1 = 1");
        if let Some(expr) = &match_expr {
            qb.push(" AND indexed_requests_fts MATCH ");
            qb.push_bind(expr.clone());
        }
        if let Some(number) = &query.phone_number {
            qb.push(" AND r.phone_number = ");
            qb.push_bind(number.clone());
        }
        if let Some(from) = query.from {
            qb.push(" AND r.created_at >= ");
            qb.push_bind(from.timestamp_millis());
        }
        if let Some(to) = query.to {
            qb.push(" AND r.created_at <= ");
            qb.push_bind(to.timestamp_millis());
        }

        if match_expr.is_some() {
            qb.push(" ORDER BY f.rank, r.id");
        } else {
            qb.push(" ORDER BY r.created_at DESC, r.id DESC");
        }

        match (query.page, query.size) {
            (Some(page), Some(size)) if size > 0 => {
                qb.push(" LIMIT ");
                qb.push_bind(i64::from(size));
                qb.push(" OFFSET ");
                qb.push_bind(i64::from(page) * i64::from(size));
            }
            _ => {
                qb.push(" LIMIT ");
                qb.push_bind(RESULT_CAP);
            }
        }

        let rows: Vec<IndexRow> = qb.build_query_as().fetch_all(&self.db).await?;
        debug!(results = rows.len(), "search index query completed");
        rows.into_iter().map(row_to_indexed).collect()
    }

    /// Fetch every indexed entry (up to [`RESULT_CAP`]).
    pub async fn find_all(&self) -> Result<Vec<IndexedRequest>, IndexError> {
        self.search(&SearchQuery::default()).await
    }

    /// Fetch entries created within `[from, to]` (inclusive).
    pub async fn find_by_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<Vec<IndexedRequest>, IndexError> {
        self.search(&SearchQuery {
            from: Some(from),
            to: Some(to),
            page,
            size,
            ..SearchQuery::default()
        })
        .await
    }

    /// Fetch entries whose message matches every given term, optionally
    /// bounded by creation time.
    pub async fn find_by_message_contains(
        &self,
        terms: &[String],
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<Vec<IndexedRequest>, IndexError> {
        self.search(&SearchQuery {
            from,
            to,
            message_terms: terms.to_vec(),
            page,
            size,
            ..SearchQuery::default()
        })
        .await
    }

    /// Fetch entries for one phone number, optionally bounded by creation
    /// time.
    pub async fn find_by_phone_number(
        &self,
        number: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<Vec<IndexedRequest>, IndexError> {
        self.search(&SearchQuery {
            from,
            to,
            phone_number: Some(number.to_owned()),
            page,
            size,
            ..SearchQuery::default()
        })
        .await
    }
}

/// Build an FTS5 MATCH expression from message terms.
///
/// Each term is sanitised (FTS5 treats punctuation as operators), quoted as
/// a phrase, and the phrases are AND-joined: every term must match. Returns
/// `None` when no term survives sanitisation.
fn fts_match_expression(terms: &[String]) -> Option<String> {
    let phrases: Vec<String> = terms
        .iter()
        .map(|t| sanitise_term(t))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if phrases.is_empty() {
        return None;
    }
    Some(phrases.join(" AND "))
}

/// Strip FTS5 operator characters from a term, collapsing to spaces.
fn sanitise_term(term: &str) -> String {
    let cleaned: String = term
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
