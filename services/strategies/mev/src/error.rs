//! Submission error types

use thiserror::Error;
use types::PrivacyLevel;

/// Failure of a single relay call, surfaced through the endpoint queue
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("HTTP error from {relay}: {source}")]
    Http {
        relay: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("RPC error from {relay}: [{code}] {message}")]
    Rpc {
        relay: String,
        code: i64,
        message: String,
    },

    #[error("Malformed response from {relay}: {message}")]
    Malformed { relay: String, message: String },

    /// Included on-chain but execution reverted
    #[error("Transaction {hash} reverted in block {block_number}")]
    Reverted { hash: String, block_number: u64 },
}

impl RelayError {
    pub fn malformed(relay: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            relay: relay.into(),
            message: message.into(),
        }
    }
}

/// Submission manager errors
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// No enabled relay can carry the payload at the requested privacy level
    #[error("No relay candidates for privacy level {privacy_level}")]
    NoCandidates { privacy_level: PrivacyLevel },

    /// Every candidate was attempted without inclusion
    #[error("All relays exhausted (attempted: {})", .chain.join(" -> "))]
    AllRelaysExhausted {
        chain: Vec<String>,
        last_error: Option<String>,
    },

    #[error("Unknown relay: {relay}")]
    UnknownRelay { relay: String },

    #[error("Bundle must contain at least one transaction")]
    EmptyBundle,

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl SubmissionError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Relays attempted before giving up, in order
    pub fn attempted_chain(&self) -> &[String] {
        match self {
            SubmissionError::AllRelaysExhausted { chain, .. } => chain,
            _ => &[],
        }
    }
}
