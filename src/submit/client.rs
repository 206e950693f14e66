use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;

use super::{SubmissionResponse, Transport, TransportError, TransportErrorKind};

/// Blocking HTTP client for a cXML endpoint.
///
/// Every request is bounded by the configured timeout; expiry surfaces as
/// [`TransportErrorKind::Timeout`].
#[derive(Debug, Clone)]
pub struct SubmissionClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl SubmissionClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let endpoint = endpoint.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError {
                kind: TransportErrorKind::Other,
                endpoint: endpoint.clone(),
                timeout,
                detail: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    fn error(&self, e: reqwest::Error) -> TransportError {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        TransportError {
            kind,
            endpoint: self.endpoint.clone(),
            timeout: self.timeout,
            detail: e.to_string(),
        }
    }
}

impl Transport for SubmissionClient {
    fn submit(&self, body: &[u8]) -> Result<SubmissionResponse, TransportError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/xml")
            .header(ACCEPT, "*/*")
            .body(body.to_vec())
            .send()
            .map_err(|e| self.error(e))?;

        let status = resp.status().as_u16();
        let body = resp.text().map_err(|e| self.error(e))?;
        debug!(endpoint = %self.endpoint, status, bytes = body.len(), "endpoint answered");
        Ok(SubmissionResponse { status, body })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// One-shot submission: build a client for `url` and post `body`.
pub fn submit(
    body: &[u8],
    url: &str,
    timeout: Duration,
) -> Result<SubmissionResponse, TransportError> {
    SubmissionClient::new(url, timeout)?.submit(body)
}
