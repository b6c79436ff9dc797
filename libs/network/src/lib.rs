//! Network Infrastructure
//!
//! Outbound call admission for every remote endpoint the engine talks to:
//! RPC nodes, private relays and signers. Each endpoint gets its own
//! concurrency ceiling and rolling rate ceiling, so saturation on one endpoint
//! never delays calls to another.

pub mod budget;
pub mod error;
pub mod metrics;
pub mod queue;

// Re-export commonly used types
pub use budget::{EndpointBudget, EndpointConfig};
pub use error::{BoxError, QueueError, Result};
pub use metrics::{EndpointMetrics, LATENCY_EWMA_ALPHA};
pub use queue::{EndpointQueue, EndpointState};
