//! Core domain types: request lifecycle, failure taxonomy, stored shapes.
//!
//! Status and failure codes are persisted as integers; the numeric values
//! are part of the stored format and must never be renumbered.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Errors decoding persisted values into domain types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    /// A stored integer does not map to any known enum value.
    #[error("unknown {field} code {value}")]
    UnknownCode {
        /// Which field carried the value.
        field: &'static str,
        /// The unmapped stored value.
        value: i64,
    },

    /// A stored millisecond timestamp is out of the representable range.
    #[error("invalid timestamp {0} ms")]
    InvalidTimestamp(i64),
}

/// Decode a unix-millisecond timestamp from the database.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidTimestamp`] when the value is outside
/// chrono's representable range.
pub fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>, DecodeError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(DecodeError::InvalidTimestamp(millis))
}

/// Lifecycle status of a dispatch request.
///
/// `InProgress` is the only non-terminal state; the dispatch worker moves a
/// request to exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchStatus {
    /// Accepted and queued; no terminal outcome recorded yet.
    InProgress,
    /// Delivery attempt succeeded.
    Finished,
    /// Delivery attempt failed; see the failure code.
    Failed,
}

impl DispatchStatus {
    /// Stored integer code.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::InProgress => 0,
            Self::Finished => 1,
            Self::Failed => 2,
        }
    }

    /// Decode a stored integer code.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownCode`] for unmapped values.
    pub fn from_i64(value: i64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(Self::InProgress),
            1 => Ok(Self::Finished),
            2 => Ok(Self::Failed),
            other => Err(DecodeError::UnknownCode {
                field: "status",
                value: other,
            }),
        }
    }

    /// Display name used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether the status is terminal (never reverted once written).
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Failure taxonomy recorded alongside the status.
///
/// `Success` doubles as "no failure"; a freshly inserted request carries
/// `Success` while still `IN_PROGRESS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    /// No failure.
    Success,
    /// The blacklist gate denied dispatch.
    BlacklistedPhoneNumber,
    /// The third-party API timed out.
    ExternalApiTimeout,
    /// The third-party API returned an error.
    ExternalApiError,
    /// The transport payload could not be constructed.
    InvalidRequestBody,
    /// The third-party endpoint URL is malformed.
    InvalidUrl,
    /// Dispatch has not completed yet.
    InProgress,
}

impl FailureCode {
    /// Stored integer code.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Success => 0,
            Self::BlacklistedPhoneNumber => 1,
            Self::ExternalApiTimeout => 2,
            Self::ExternalApiError => 3,
            Self::InvalidRequestBody => 4,
            Self::InvalidUrl => 5,
            Self::InProgress => 6,
        }
    }

    /// Decode a stored integer code.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownCode`] for unmapped values.
    pub fn from_i64(value: i64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::BlacklistedPhoneNumber),
            2 => Ok(Self::ExternalApiTimeout),
            3 => Ok(Self::ExternalApiError),
            4 => Ok(Self::InvalidRequestBody),
            5 => Ok(Self::InvalidUrl),
            6 => Ok(Self::InProgress),
            other => Err(DecodeError::UnknownCode {
                field: "failure_code",
                value: other,
            }),
        }
    }

    /// Display name used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::BlacklistedPhoneNumber => "BLACKLISTED_PHONE_NUMBER",
            Self::ExternalApiTimeout => "EXTERNAL_API_TIMEOUT",
            Self::ExternalApiError => "EXTERNAL_API_ERROR",
            Self::InvalidRequestBody => "INVALID_REQUEST_BODY",
            Self::InvalidUrl => "INVALID_URL",
            Self::InProgress => "IN_PROGRESS",
        }
    }
}

/// One dispatch request as stored in the row store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Row store identifier.
    pub id: i64,
    /// Destination phone number.
    pub phone_number: String,
    /// Message body.
    pub message: String,
    /// Lifecycle status.
    pub status: DispatchStatus,
    /// Failure taxonomy entry; `SUCCESS` when nothing has failed.
    pub failure_code: FailureCode,
    /// Free-text failure detail, present only for failed requests.
    pub failure_comment: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last state-change time.
    pub updated_at: DateTime<Utc>,
}

/// Denormalized search index entry.
///
/// Carries only creation-time metadata: the index is written once per
/// request and never updated, so it holds no lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedRequest {
    /// Index row identifier (`None` before the entry is stored).
    pub id: Option<i64>,
    /// Row store identifier of the indexed request.
    pub request_id: i64,
    /// Destination phone number.
    pub phone_number: String,
    /// Message body.
    pub message: String,
    /// Creation time of the request.
    pub created_at: DateTime<Utc>,
    /// Last update time as of indexing (equals `created_at`).
    pub updated_at: DateTime<Utc>,
}

impl IndexedRequest {
    /// Project a stored request into its index entry.
    pub fn from_request(request: &DispatchRequest) -> Self {
        Self {
            id: None,
            request_id: request.id,
            phone_number: request.phone_number.clone(),
            message: request.message.clone(),
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}
