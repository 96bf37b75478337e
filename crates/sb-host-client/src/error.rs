//! Host-side error types.

use thiserror::Error;

/// A poll that did not reach the gateway. Counted as a failure and retried
/// with backoff; never surfaced to a caller.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),
    #[error("failed to decode poll response: {0}")]
    Decode(String),
}

/// A dispatched call that could not be executed. Always posted back to the
/// gateway as the call's error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),
    #[error("{0}")]
    Procedure(String),
}
