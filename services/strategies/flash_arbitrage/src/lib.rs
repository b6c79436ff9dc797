//! # Flash Arbitrage Strategy - Execution Engine
//!
//! ## Purpose
//!
//! Turns a discovered arbitrage opportunity into an included on-chain
//! transaction. Chooses the cheapest viable flash-loan source, rejects
//! anything that cannot clear fees and gas, asks an external signer for the
//! payload and delivers it through a privacy-ordered relay chain. Discovery,
//! pricing and key management are out of scope; they are caller inputs.
//!
//! ## Integration Points
//!
//! - **Input Sources**: `types::Opportunity` built by discovery, or raw leg quotes via [`path_builder`]
//! - **Flash Loan Providers**: Balancer, dYdX, Aave, Uniswap V3 pools, and two-source hybrids
//! - **Signing**: injected [`TransactionSigner`], [`RemoteSigner`] for an HTTP service
//! - **Submission**: `mev::SubmissionManager` over `network::EndpointQueue`
//! - **Observability**: [`ExecutionCoordinator::metrics_snapshot`] and emoji-tagged tracing
//!
//! ## Architecture Role
//!
//! ```text
//! Leg Quotes → [Path Builder] → Opportunity → [Coordinator] → Included Tx
//!                                                  │
//!                       ┌──────────────┬───────────┼─────────────┐
//!                       ▼              ▼           ▼             ▼
//!                  [Selector]    [Profit Gate]  [Signer]   [Submission]
//!                   catalog       fee + gas     plan→tx    relay fallback
//! ```
//!
//! ## Examples
//!
//! ```rust
//! use flash_arbitrage::sources::{FlashLoanSource, SourceCatalog, SourceEntry, SupportRule};
//! use flash_arbitrage::selector::SourceSelector;
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let catalog = SourceCatalog::new(
//!     vec![
//!         SourceEntry::new(FlashLoanSource::Aave { fee_bps: 9 }, SupportRule::any()),
//!         SourceEntry::new(FlashLoanSource::Balancer { fee_bps: 0 }, SupportRule::any()),
//!     ],
//!     dec!(1000000),
//! )
//! .unwrap();
//! let selector = SourceSelector::new(Arc::new(catalog));
//! let source = selector.select_for(&"WETH".into(), dec!(10)).unwrap();
//! assert!(source.is_fee_free());
//! ```

pub mod config;
pub mod coordinator;
pub mod logging;
pub mod path_builder;
pub mod selector;
pub mod signer;
pub mod sources;

pub use config::{ConfigError, EngineConfig};
pub use coordinator::{
    estimate_gas_limit, ExecutionCoordinator, ExecutionError, ExecutionOutcome, ExecutionStats,
    MetricsSnapshot, ProfitBreakdown, Quote,
};
pub use path_builder::{FeedEntry, LegQuote, QuotedOpportunity};
pub use selector::{SelectionError, SourceSelector};
pub use signer::{ExecutionPlan, RemoteSigner, SignedPayload, SignerError, TransactionSigner};
pub use sources::{FlashLoanSource, SourceCatalog, SourceEntry, SupportRule};
