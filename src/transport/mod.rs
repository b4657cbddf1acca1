//! Third-party transport abstraction.
//!
//! Defines the [`TransportClient`] trait, the outbound wire payload types,
//! and the fixed [`SendOutcome`] taxonomy every implementation must map
//! into. The HTTP implementation lives in [`http`].
//!
//! Exactly one outcome is produced per call; retry policy, if any, belongs
//! to the caller — and this design has none: one consume is one attempt.

use async_trait::async_trait;
use serde::Serialize;

pub mod http;

pub use http::HttpTransportClient;

/// Result of one delivery attempt against the third-party API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendOutcome {
    /// The API answered HTTP 200.
    Success,
    /// The request body could not be serialized or written.
    InvalidRequestBody,
    /// Connect or read timeout.
    Timeout,
    /// Any other non-200 response or transport failure.
    ApiError,
    /// The endpoint URL could not be parsed.
    MalformedUrl,
}

impl SendOutcome {
    /// Returns the display name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::InvalidRequestBody => "INVALID_REQUEST_BODY",
            Self::Timeout => "TIMEOUT",
            Self::ApiError => "API_ERROR",
            Self::MalformedUrl => "MALFORMED_URL",
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Outbound payload for one delivery attempt.
///
/// The third-party API accepts a JSON array of these objects; this system
/// always sends exactly one per call (no multi-recipient batching).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsPayload {
    /// Delivery channel tag; fixed to `"sms"`.
    pub delivery_channel: String,
    /// Channel-specific message content.
    pub channels: Channels,
    /// Destination blocks; one per call in this design.
    pub destination: Vec<Destination>,
}

/// Channel container of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channels {
    /// SMS channel body.
    pub sms: SmsBody,
}

/// SMS channel body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsBody {
    /// Message text.
    pub text: String,
}

/// One destination block: recipient numbers plus a correlation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Recipient numbers (a single number per call in this design).
    pub msisdn: Vec<String>,
    /// Correlation identifier for downstream deduplication.
    pub correlation_id: String,
}

impl SmsPayload {
    /// Build the fixed-shape SMS payload for one recipient.
    pub fn sms(text: &str, number: &str, correlation_id: &str) -> Self {
        Self {
            delivery_channel: "sms".to_owned(),
            channels: Channels {
                sms: SmsBody {
                    text: text.to_owned(),
                },
            },
            destination: vec![Destination {
                msisdn: vec![number.to_owned()],
                correlation_id: correlation_id.to_owned(),
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Client performing the outbound delivery call.
///
/// Implementations must be `Send + Sync`: one client instance is shared by
/// all dispatch workers.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Attempt one delivery and classify the result.
    ///
    /// Never returns an error: every failure mode is folded into the
    /// [`SendOutcome`] taxonomy so the caller can record it as a failure
    /// code.
    async fn send(&self, payload: &SmsPayload) -> SendOutcome;
}
