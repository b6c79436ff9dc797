//! Caller-supplied arbitrage intent

use crate::{Amount, AssetId, ExecutionPath};
use serde::{Deserialize, Serialize};

/// An arbitrage opportunity produced by a discovery component. Consumed once
/// per execution attempt and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub borrow_asset: AssetId,
    pub borrow_amount: Amount,
    pub path: ExecutionPath,
    /// Expected profit before loan fee and gas, in units of the borrow asset
    pub estimated_gross_profit: Amount,
    /// Expected gas cost, in units of the borrow asset
    pub estimated_gas_cost: Amount,
}

impl Opportunity {
    /// Whether the top-level borrow terms agree with the candidate path
    pub fn is_consistent(&self) -> bool {
        self.borrow_asset == *self.path.borrow_asset()
            && self.borrow_amount == self.path.borrow_amount()
    }
}
