//! Relay privacy levels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strength of a delivery channel's guarantee against third-party visibility
/// of a pending transaction. Ordered weakest to strongest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    /// Visible in the public mempool
    Public,
    /// Private order flow, shared with a relay's searcher network
    #[default]
    Basic,
    /// Private order flow with no hint sharing
    Enhanced,
    /// Delivered straight to a block builder
    Maximum,
}

impl PrivacyLevel {
    /// Whether a channel at `self` satisfies a `required` level
    pub fn satisfies(self, required: PrivacyLevel) -> bool {
        self >= required
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrivacyLevel::Public => "public",
            PrivacyLevel::Basic => "basic",
            PrivacyLevel::Enhanced => "enhanced",
            PrivacyLevel::Maximum => "maximum",
        };
        f.write_str(name)
    }
}
