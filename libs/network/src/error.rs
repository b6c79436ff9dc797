//! Endpoint Queue Error Types
//!
//! Errors surfaced by the endpoint queue. The queue never retries on its own;
//! callers decide whether a failure is worth another attempt via
//! [`QueueError::is_retryable`].

use thiserror::Error;

/// Boxed error produced by a queued operation
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main endpoint queue error type
#[derive(Error, Debug)]
pub enum QueueError {
    /// No budget is configured for the endpoint
    #[error("Unknown endpoint: {endpoint}")]
    UnknownEndpoint { endpoint: String },

    /// Capacity did not free up before the configured timeout
    #[error("Timeout error: {endpoint} waited {waited_ms}ms for capacity")]
    Timeout { endpoint: String, waited_ms: u64 },

    /// Endpoint is draining and accepts no new work
    #[error("Endpoint {endpoint} is draining")]
    Draining { endpoint: String },

    /// The operation itself ran and failed
    #[error("Operation on {endpoint} failed: {source}")]
    Operation {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    /// The detached operation task panicked or was aborted by the runtime
    #[error("Operation task on {endpoint} aborted: {message}")]
    TaskAborted { endpoint: String, message: String },

    /// Rejected limit configuration
    #[error("Configuration error: {endpoint}: {message}")]
    Configuration { endpoint: String, message: String },
}

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

impl QueueError {
    pub fn unknown_endpoint(endpoint: impl Into<String>) -> Self {
        Self::UnknownEndpoint {
            endpoint: endpoint.into(),
        }
    }

    pub fn timeout(endpoint: impl Into<String>, waited_ms: u64) -> Self {
        Self::Timeout {
            endpoint: endpoint.into(),
            waited_ms,
        }
    }

    pub fn draining(endpoint: impl Into<String>) -> Self {
        Self::Draining {
            endpoint: endpoint.into(),
        }
    }

    pub fn operation(endpoint: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Operation {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }

    pub fn configuration(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Timeouts may succeed if retried later with backoff; everything else is
    /// either structural or already reflects the remote outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Timeout { .. })
    }

    /// Endpoint this error relates to
    pub fn endpoint(&self) -> &str {
        match self {
            QueueError::UnknownEndpoint { endpoint }
            | QueueError::Timeout { endpoint, .. }
            | QueueError::Draining { endpoint }
            | QueueError::Operation { endpoint, .. }
            | QueueError::TaskAborted { endpoint, .. }
            | QueueError::Configuration { endpoint, .. } => endpoint,
        }
    }
}
