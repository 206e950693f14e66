//! Posting serialized documents to a cXML receiving endpoint.
//!
//! [`Transport`] is the seam the pipeline submits through. The blocking
//! HTTP implementation, [`SubmissionClient`], needs the `submit` feature.

use std::fmt;
use std::time::Duration;

#[cfg(feature = "submit")]
mod client;

#[cfg(feature = "submit")]
pub use client::*;

/// HTTP statuses that count as acceptance.
pub const ACCEPTED: [u16; 2] = [200, 201];

/// Status and raw body returned by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResponse {
    pub status: u16,
    pub body: String,
}

impl SubmissionResponse {
    /// Whether the status is one of [`ACCEPTED`].
    pub fn is_accepted(&self) -> bool {
        ACCEPTED.contains(&self.status)
    }
}

/// What went wrong on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportErrorKind {
    /// No response within the configured timeout.
    Timeout,
    /// The endpoint could not be reached.
    Connect,
    Other,
}

/// A submission that produced no HTTP status.
///
/// Carries the endpoint and timeout so a failed invoice can be retried by hand.
#[derive(Debug, Clone)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub endpoint: String,
    pub timeout: Duration,
    pub detail: String,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportErrorKind::Timeout => write!(
                f,
                "timed out after {}s posting to {}",
                self.timeout.as_secs(),
                self.endpoint
            ),
            TransportErrorKind::Connect => {
                write!(f, "cannot connect to {}: {}", self.endpoint, self.detail)
            }
            TransportErrorKind::Other => {
                write!(f, "transport error posting to {}: {}", self.endpoint, self.detail)
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// Sends one serialized document and returns the endpoint's answer.
pub trait Transport {
    fn submit(&self, body: &[u8]) -> Result<SubmissionResponse, TransportError>;

    fn endpoint(&self) -> &str;

    fn timeout(&self) -> Duration;
}
