//! fnav Networking
//!
//! Fetches page fragments for in-page navigation.
//!
//! Features:
//! - Single-flight fetches with explicit cancellation tokens
//! - Per-request timeout
//! - Capped exponential-backoff retry
//! - Offline short-circuit
//! - Pluggable transports (HTTP via reqwest, in-memory)

pub mod cancel;
pub mod client;
pub mod http;
pub mod request;
pub mod retry;
pub mod transport;

pub use cancel::CancelToken;
pub use client::{FetchClient, FetchConfig};
pub use http::HttpTransport;
pub use request::{PageRequest, RawResponse, CACHE_BUST_PARAM};
pub use retry::{with_retry, RetryPolicy};
pub use transport::{Failure, MemoryTransport, Transport};

use std::time::Duration;

/// Fetch error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Offline: request for {path} not attempted")]
    Offline { path: String },

    #[error("Request for {path} timed out after {after:?}")]
    Timeout { path: String, after: Duration },

    #[error("Request for {path} was cancelled")]
    Cancelled { path: String },

    #[error("HTTP error: {status} {status_text}")]
    Status { status: u16, status_text: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl FetchError {
    /// Whether a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout { .. } | FetchError::Status { .. } | FetchError::Transport(_)
        )
    }

    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Transport-level failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),
}
