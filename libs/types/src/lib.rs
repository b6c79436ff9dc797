//! # Torq Execution Types
//!
//! Shared data model for the flash-loan arbitrage execution engine.
//!
//! ## Design Philosophy
//!
//! - **Validated Construction**: `ExecutionPath` can only be built through
//!   [`ExecutionPath::try_new`], which enforces token continuity and length bounds
//! - **No Precision Loss**: amounts are `rust_decimal::Decimal`, never floats
//! - **Closed Variants**: venues and privacy levels are exhaustive enums so every
//!   consumer matches on the full set
//!
//! ## Integration Points
//!
//! - **Path Builder**: produces `ExecutionPath` from caller quotes
//! - **Source Selector**: reads `borrow_asset` / `borrow_amount`
//! - **Submission Manager**: consumes `SignedTransaction` and `PrivacyLevel`
//! - **Execution Coordinator**: consumes `Opportunity`
//!
//! ```rust
//! use types::{AssetId, PrivacyLevel};
//!
//! let weth = AssetId::new("WETH");
//! assert_eq!(weth.as_str(), "WETH");
//! assert!(PrivacyLevel::Maximum > PrivacyLevel::Basic);
//! ```

pub mod opportunity;
pub mod path;
pub mod privacy;
pub mod transaction;

pub use opportunity::Opportunity;
pub use path::{
    ExecutionPath, PathError, PathStrategy, SwapLeg, VenueKind, BPS_DENOMINATOR, MAX_PATH_LEGS,
};
pub use privacy::PrivacyLevel;
pub use transaction::{keccak256_hex, SignedTransaction};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token amounts in native units of the asset
pub type Amount = rust_decimal::Decimal;

/// Asset identifier (token symbol or contract address, chain-agnostic)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AssetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
