//! HTTP implementation of the transport client using `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};
use url::Url;

use crate::config::TransportConfig;

use super::{SendOutcome, SmsPayload, TransportClient};

/// Transport client POSTing JSON payloads to the third-party SMS API.
///
/// The endpoint URL is kept as a string and parsed per call so a malformed
/// configured URL surfaces as `MalformedUrl` on the affected request instead
/// of failing construction. Connect and read timeouts are fixed at
/// construction from the transport config.
#[derive(Debug, Clone)]
pub struct HttpTransportClient {
    api_url: String,
    client: reqwest::Client,
}

impl HttpTransportClient {
    /// Build a client with the configured endpoint and timeouts.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error if the client cannot be built.
    pub fn new(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()?;
        Ok(Self {
            api_url: config.api_url.clone(),
            client,
        })
    }
}

#[async_trait]
impl TransportClient for HttpTransportClient {
    async fn send(&self, payload: &SmsPayload) -> SendOutcome {
        // The API accepts an array of payloads; one per call here.
        let body = match serde_json::to_string(&[payload]) {
            Ok(body) => body,
            Err(err) => {
                error!(error = %err, "failed to serialize transport payload");
                return SendOutcome::InvalidRequestBody;
            }
        };

        let url = match Url::parse(&self.api_url) {
            Ok(url) => url,
            Err(err) => {
                error!(api_url = %self.api_url, error = %err, "malformed transport URL");
                return SendOutcome::MalformedUrl;
            }
        };

        debug!(url = %url, body, "sending payload to third-party API");
        let response = match self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                error!(error = %err, "third-party API request timed out");
                return SendOutcome::Timeout;
            }
            Err(err) => {
                error!(error = %err, "third-party API request failed");
                return SendOutcome::ApiError;
            }
        };

        let status = response.status();
        // The body is read for diagnostics regardless of status but never
        // parsed for business logic.
        let response_body = match response.text().await {
            Ok(text) => text,
            Err(err) if err.is_timeout() => {
                error!(error = %err, "timed out reading third-party response body");
                return SendOutcome::Timeout;
            }
            Err(err) => {
                error!(error = %err, "failed to read third-party response body");
                return SendOutcome::ApiError;
            }
        };
        debug!(status = status.as_u16(), body = response_body, "third-party API responded");

        if status.as_u16() == 200 {
            info!("third-party API accepted the payload");
            SendOutcome::Success
        } else {
            error!(status = status.as_u16(), "third-party API returned non-200 status");
            SendOutcome::ApiError
        }
    }
}
