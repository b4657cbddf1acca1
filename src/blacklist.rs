//! Blacklist gate: membership set of phone numbers excluded from delivery.
//!
//! The [`BlacklistGate`] trait is what the dispatch worker and the admin
//! surface program against; [`SqliteBlacklist`] is the backing-set
//! implementation. Absence from the set means "not blacklisted" — there is
//! no separate unknown state. When the membership lookup itself fails the
//! worker denies dispatch rather than guessing (deny-by-default).

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Errors from blacklist operations.
#[derive(Debug, thiserror::Error)]
pub enum BlacklistError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Membership-set abstraction deciding whether a phone number is excluded
/// from delivery.
///
/// Implementations must be safe to call concurrently from many dispatch
/// workers.
#[async_trait]
pub trait BlacklistGate: Send + Sync {
    /// Whether the number is in the blacklist set.
    async fn is_blacklisted(&self, number: &str) -> Result<bool, BlacklistError>;

    /// Idempotent bulk insert into the set.
    async fn add(&self, numbers: &[String]) -> Result<(), BlacklistError>;

    /// Idempotent bulk removal from the set.
    async fn remove(&self, numbers: &[String]) -> Result<(), BlacklistError>;

    /// Full membership snapshot for administrative listing.
    async fn list_all(&self) -> Result<HashSet<String>, BlacklistError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS blacklisted_numbers (
    phone_number TEXT PRIMARY KEY
);
"#;

/// Apply the blacklist schema.
///
/// Invoked once by the process entry point before any gate is constructed.
///
/// # Errors
///
/// Returns the underlying database error if the DDL fails.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// SQLite-backed blacklist set.
#[derive(Debug, Clone)]
pub struct SqliteBlacklist {
    db: SqlitePool,
}

impl SqliteBlacklist {
    /// Create a gate over an initialised pool.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BlacklistGate for SqliteBlacklist {
    async fn is_blacklisted(&self, number: &str) -> Result<bool, BlacklistError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM blacklisted_numbers WHERE phone_number = ?1")
                .bind(number)
                .fetch_optional(&self.db)
                .await?;
        let blacklisted = row.is_some();
        debug!(number, blacklisted, "blacklist membership checked");
        Ok(blacklisted)
    }

    async fn add(&self, numbers: &[String]) -> Result<(), BlacklistError> {
        for number in numbers {
            sqlx::query("INSERT OR IGNORE INTO blacklisted_numbers (phone_number) VALUES (?1)")
                .bind(number)
                .execute(&self.db)
                .await?;
        }
        info!(count = numbers.len(), "numbers added to blacklist");
        Ok(())
    }

    async fn remove(&self, numbers: &[String]) -> Result<(), BlacklistError> {
        for number in numbers {
            sqlx::query("DELETE FROM blacklisted_numbers WHERE phone_number = ?1")
                .bind(number)
                .execute(&self.db)
                .await?;
        }
        info!(count = numbers.len(), "numbers removed from blacklist");
        Ok(())
    }

    async fn list_all(&self) -> Result<HashSet<String>, BlacklistError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT phone_number FROM blacklisted_numbers")
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|(n,)| n).collect())
    }
}
