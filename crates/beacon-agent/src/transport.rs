//! Batch transport — the seam between the uploader and the network.
//!
//! [`Transport`] classifies every outcome into the four categories the
//! uploader's result handling needs; the HTTP implementation maps status
//! codes onto them. Tests substitute their own implementations or point
//! [`HttpTransport`] at a wiremock server.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::errors::AgentError;

/// Classified result of one batch transmission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportResult {
    /// The collector persisted the batch.
    Accepted,
    /// Transient failure (network, 5xx, throttling) — retry with backoff.
    Retriable {
        /// Server-provided wait hint, when present.
        retry_after: Option<Duration>,
    },
    /// The collector rejected this payload as malformed or oversized; the
    /// page must be dropped so it cannot poison the queue.
    PayloadRejected,
    /// Credentials or quota rejected; nothing should be deleted and the
    /// agent should degrade.
    AuthRejected,
}

/// Asynchronous request/response transport for event batches.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transmit one wire payload and classify the outcome.
    async fn send(&self, body: Value) -> TransportResult;
}

/// `reqwest`-backed transport POSTing JSON to the collector endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

/// Request timeout for one batch POST.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl HttpTransport {
    /// Build a transport for the given collector URL.
    pub fn new(url: impl Into<String>) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AgentError::TransportSetup(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn classify(status: reqwest::StatusCode, retry_after: Option<Duration>) -> TransportResult {
        if status.is_success() {
            return TransportResult::Accepted;
        }
        match status.as_u16() {
            401 | 403 => TransportResult::AuthRejected,
            408 | 429 => TransportResult::Retriable { retry_after },
            400 | 413 | 422 => TransportResult::PayloadRejected,
            _ if status.is_server_error() => TransportResult::Retriable { retry_after },
            // Remaining 4xx: treat as malformed-payload class rather than
            // retrying a request the server will keep refusing.
            _ => TransportResult::PayloadRejected,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: Value) -> TransportResult {
        let response = self.client.post(&self.url).json(&body).send().await;
        match response {
            Ok(response) => {
                let status = response.status();
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                let result = Self::classify(status, retry_after);
                if result != TransportResult::Accepted {
                    warn!(status = status.as_u16(), outcome = ?result, "batch upload rejected");
                }
                result
            }
            Err(e) => {
                warn!(error = %e, "batch upload transport error");
                TransportResult::Retriable { retry_after: None }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_classification() {
        assert_eq!(
            HttpTransport::classify(StatusCode::OK, None),
            TransportResult::Accepted
        );
        assert_eq!(
            HttpTransport::classify(StatusCode::UNAUTHORIZED, None),
            TransportResult::AuthRejected
        );
        assert_eq!(
            HttpTransport::classify(StatusCode::FORBIDDEN, None),
            TransportResult::AuthRejected
        );
        assert_eq!(
            HttpTransport::classify(StatusCode::PAYLOAD_TOO_LARGE, None),
            TransportResult::PayloadRejected
        );
        assert_eq!(
            HttpTransport::classify(StatusCode::BAD_REQUEST, None),
            TransportResult::PayloadRejected
        );
        assert_eq!(
            HttpTransport::classify(StatusCode::INTERNAL_SERVER_ERROR, None),
            TransportResult::Retriable { retry_after: None }
        );
        assert_eq!(
            HttpTransport::classify(
                StatusCode::TOO_MANY_REQUESTS,
                Some(Duration::from_secs(3))
            ),
            TransportResult::Retriable {
                retry_after: Some(Duration::from_secs(3))
            }
        );
    }
}
