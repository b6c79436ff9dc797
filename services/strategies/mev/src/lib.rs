//! # Torq MEV Library - Private Transaction Submission
//!
//! ## Purpose
//!
//! Delivers signed arbitrage transactions and bundles through a prioritized,
//! fallback-capable chain of privacy-preserving relays. Every outbound relay
//! call is admitted through the shared [`network::EndpointQueue`], so relay
//! rate limits hold even when many submissions race.
//!
//! ## Integration Points
//!
//! - **Input Sources**: signed transactions and bundles from the execution coordinator
//! - **Output Destinations**: private relays, block builders, public broadcast
//! - **Relay Registry**: priority, privacy guarantee, health and rolling statistics
//! - **Privacy Policy**: maps expected profit to a required privacy level
//! - **Observability**: pull-based stats snapshot plus a bounded event channel
//!
//! ## Architecture Role
//!
//! ```text
//! Signed Tx / Bundle → [Privacy Policy] → [Relay Candidates] → [Endpoint Queue] → Relay
//!                            ↓                   ↓                    ↓
//!                      Privacy Level      Priority Ordering     Rate/Concurrency
//!                                         Public Fallback       Inclusion Wait
//! ```
//!
//! Sequential mode tries one relay at a time and advances on failure or
//! non-inclusion. Fast mode races every adequate relay and keeps the first
//! inclusion; it is only honoured up to `Basic` privacy.

pub mod bundle;
pub mod error;
pub mod protection;
pub mod relay;
pub mod submission;
pub mod transport;

pub use bundle::{create_bundle, Bundle, BundleBuilder};
pub use error::{RelayError, SubmissionError};
pub use protection::{PrivacyPolicy, PrivacyPolicyConfig};
pub use relay::{Candidates, RelayKind, RelayRegistry, RelayStats, RelayTarget};
pub use submission::{
    SubmissionEvent, SubmissionManager, SubmissionOptions, SubmissionPayload, SubmissionResult,
};
pub use transport::{JsonRpcRelay, RelayTransport};
