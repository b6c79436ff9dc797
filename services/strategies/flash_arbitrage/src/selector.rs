//! Flash-loan source selection
//!
//! Picks the cheapest source able to serve a path's borrow. Preference order:
//!
//! 1. a single fee-free source (by reliability rank, then catalog order)
//! 2. above the hybrid threshold, a split across the two largest fee-free
//!    sources, proportional to their capacity
//! 3. a fee-bearing source, lowest fee first
//!
//! Selection is a pure function of the catalog and the request.

use crate::sources::{FlashLoanSource, SourceCatalog, SourceEntry};
use rust_decimal::RoundingStrategy;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use types::{Amount, AssetId, ExecutionPath};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("No flash-loan source supports {amount} {asset}")]
    Unsupported { asset: AssetId, amount: Amount },

    #[error("Source catalog configuration error: {message}")]
    Configuration { message: String },
}

impl SelectionError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceSelector {
    catalog: Arc<SourceCatalog>,
}

impl SourceSelector {
    pub fn new(catalog: Arc<SourceCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn select(&self, path: &ExecutionPath) -> Result<FlashLoanSource, SelectionError> {
        self.select_for(path.borrow_asset(), path.borrow_amount())
    }

    pub fn select_for(
        &self,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<FlashLoanSource, SelectionError> {
        let mut fee_free: Vec<&SourceEntry> = self
            .catalog
            .entries()
            .iter()
            .filter(|entry| entry.source.is_fee_free())
            .collect();
        // Stable sort keeps catalog order within a rank
        fee_free.sort_by_key(|entry| entry.reliability_rank);

        if let Some(entry) = fee_free
            .iter()
            .find(|entry| entry.rule.supports(asset, amount))
        {
            debug!(source = %entry.source, %asset, %amount, "Selected fee-free source");
            return Ok(entry.source.clone());
        }

        if amount > self.catalog.hybrid_threshold() {
            if let Some(hybrid) = Self::hybrid_split(&fee_free, asset, amount) {
                debug!(source = %hybrid, %asset, %amount, "Selected hybrid source");
                return Ok(hybrid);
            }
        }

        let mut fee_bearing: Vec<&SourceEntry> = self
            .catalog
            .entries()
            .iter()
            .filter(|entry| !entry.source.is_fee_free())
            .collect();
        fee_bearing.sort_by_key(|entry| entry.source.fee_bps().unwrap_or(u32::MAX));

        fee_bearing
            .iter()
            .find(|entry| entry.rule.supports(asset, amount))
            .map(|entry| {
                debug!(source = %entry.source, %asset, %amount, "Selected fee-bearing source");
                entry.source.clone()
            })
            .ok_or_else(|| SelectionError::Unsupported {
                asset: asset.clone(),
                amount,
            })
    }

    /// Split across the two largest-capacity fee-free sources. The first part
    /// is rounded toward zero at the request's scale and the second takes the
    /// remainder, so parts always sum to `amount` exactly.
    fn hybrid_split(
        fee_free: &[&SourceEntry],
        asset: &AssetId,
        amount: Amount,
    ) -> Option<FlashLoanSource> {
        let mut bounded: Vec<(&SourceEntry, Amount)> = fee_free
            .iter()
            .filter(|entry| entry.rule.allows_asset(asset))
            .filter_map(|entry| entry.rule.max_amount.map(|cap| (*entry, cap)))
            .filter(|(_, cap)| *cap > Amount::ZERO)
            .collect();
        bounded.sort_by(|(_, a), (_, b)| b.cmp(a));

        let [(first, first_cap), (second, second_cap)] = bounded.get(..2)? else {
            return None;
        };

        // Native-unit amounts overflow `amount * cap`; fall back to the ratio
        // (at most 1) so the product stays within `amount`.
        let total_cap = first_cap.checked_add(*second_cap)?;
        let proportional = match amount.checked_mul(*first_cap) {
            Some(product) => product.checked_div(total_cap)?,
            None => amount.checked_mul(first_cap.checked_div(total_cap)?)?,
        };
        let first_part =
            proportional.round_dp_with_strategy(amount.scale(), RoundingStrategy::ToZero);
        let second_part = amount - first_part;

        if first.rule.supports(asset, first_part) && second.rule.supports(asset, second_part) {
            Some(FlashLoanSource::Hybrid(vec![
                (first.source.clone(), first_part),
                (second.source.clone(), second_part),
            ]))
        } else {
            None
        }
    }

    /// Loan fee for borrowing `amount` from `source`; hybrids sum their parts
    pub fn fee_for(&self, source: &FlashLoanSource, amount: Amount) -> Amount {
        source.fee_for(amount)
    }
}
