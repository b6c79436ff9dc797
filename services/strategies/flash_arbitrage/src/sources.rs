//! Flash-loan source catalog
//!
//! Static set of loan providers loaded at startup. Each entry pairs a source
//! (with its fee rate) with the rule deciding which `(asset, amount)` requests
//! it can serve. The catalog is immutable after construction.

use crate::selector::SelectionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use types::{Amount, AssetId, BPS_DENOMINATOR};

/// Where the borrowed capital comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLoanSource {
    Balancer { fee_bps: u32 },
    DyDx { fee_bps: u32 },
    Aave { fee_bps: u32 },
    UniswapV3Pool { pool_id: String, fee_bps: u32 },
    /// Loan split across at most two underlying sources
    Hybrid(Vec<(FlashLoanSource, Amount)>),
}

impl FlashLoanSource {
    /// Fee rate of a single source; `None` for hybrids
    pub fn fee_bps(&self) -> Option<u32> {
        match self {
            FlashLoanSource::Balancer { fee_bps }
            | FlashLoanSource::DyDx { fee_bps }
            | FlashLoanSource::Aave { fee_bps }
            | FlashLoanSource::UniswapV3Pool { fee_bps, .. } => Some(*fee_bps),
            FlashLoanSource::Hybrid(_) => None,
        }
    }

    pub fn is_fee_free(&self) -> bool {
        match self {
            FlashLoanSource::Hybrid(parts) => parts.iter().all(|(source, _)| source.is_fee_free()),
            other => other.fee_bps() == Some(0),
        }
    }

    pub fn is_hybrid(&self) -> bool {
        matches!(self, FlashLoanSource::Hybrid(_))
    }

    /// Number of underlying loans the executor contract has to take
    pub fn loan_count(&self) -> usize {
        match self {
            FlashLoanSource::Hybrid(parts) => parts.len(),
            _ => 1,
        }
    }

    /// Fee owed on top of principal when borrowing `amount`
    pub fn fee_for(&self, amount: Amount) -> Amount {
        match self {
            FlashLoanSource::Hybrid(parts) => parts
                .iter()
                .map(|(source, part)| source.fee_for(*part))
                .sum(),
            single => {
                // Rate first: a rate of at most 1 keeps the product within `amount`
                let rate = Decimal::from(single.fee_bps().unwrap_or(0))
                    / Decimal::from(BPS_DENOMINATOR);
                amount.checked_mul(rate).unwrap_or(amount)
            }
        }
    }

    /// Default preference among fee-free sources, lower first
    pub fn default_reliability_rank(&self) -> u32 {
        match self {
            FlashLoanSource::Balancer { .. } => 0,
            FlashLoanSource::DyDx { .. } => 1,
            FlashLoanSource::Aave { .. } => 2,
            FlashLoanSource::UniswapV3Pool { .. } => 3,
            FlashLoanSource::Hybrid(_) => u32::MAX,
        }
    }
}

impl fmt::Display for FlashLoanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashLoanSource::Balancer { .. } => write!(f, "balancer"),
            FlashLoanSource::DyDx { .. } => write!(f, "dydx"),
            FlashLoanSource::Aave { .. } => write!(f, "aave"),
            FlashLoanSource::UniswapV3Pool { pool_id, .. } => write!(f, "uniswap_v3:{pool_id}"),
            FlashLoanSource::Hybrid(parts) => {
                write!(f, "hybrid[")?;
                for (i, (source, amount)) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{source}={amount}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Which requests a source can serve
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportRule {
    /// Allowed assets; `None` accepts any asset
    pub assets: Option<Vec<AssetId>>,
    pub min_amount: Amount,
    /// Maximum single-transaction capacity; `None` is unbounded
    pub max_amount: Option<Amount>,
}

impl SupportRule {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn for_assets(assets: impl IntoIterator<Item = AssetId>) -> Self {
        Self {
            assets: Some(assets.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, max_amount: Amount) -> Self {
        self.max_amount = Some(max_amount);
        self
    }

    pub fn with_min_amount(mut self, min_amount: Amount) -> Self {
        self.min_amount = min_amount;
        self
    }

    pub fn allows_asset(&self, asset: &AssetId) -> bool {
        self.assets
            .as_ref()
            .map_or(true, |assets| assets.contains(asset))
    }

    pub fn supports(&self, asset: &AssetId, amount: Amount) -> bool {
        self.allows_asset(asset)
            && amount > Amount::ZERO
            && amount >= self.min_amount
            && self.max_amount.map_or(true, |max| amount <= max)
    }
}

/// One configured provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub source: FlashLoanSource,
    pub rule: SupportRule,
    /// Preference among fee-free sources, lower first
    pub reliability_rank: u32,
}

impl SourceEntry {
    pub fn new(source: FlashLoanSource, rule: SupportRule) -> Self {
        let reliability_rank = source.default_reliability_rank();
        Self {
            source,
            rule,
            reliability_rank,
        }
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.reliability_rank = rank;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SourceCatalog {
    entries: Vec<SourceEntry>,
    hybrid_threshold: Amount,
}

impl SourceCatalog {
    pub fn new(entries: Vec<SourceEntry>, hybrid_threshold: Amount) -> Result<Self, SelectionError> {
        if entries.is_empty() {
            return Err(SelectionError::configuration(
                "source catalog must contain at least one source",
            ));
        }
        if let Some(entry) = entries.iter().find(|e| e.source.is_hybrid()) {
            return Err(SelectionError::configuration(format!(
                "hybrid source {} cannot be configured directly",
                entry.source
            )));
        }
        if hybrid_threshold < Amount::ZERO {
            return Err(SelectionError::configuration(
                "hybrid threshold must be non-negative",
            ));
        }
        Ok(Self {
            entries,
            hybrid_threshold,
        })
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    /// Hybrid splits are only considered strictly above this amount
    pub fn hybrid_threshold(&self) -> Amount {
        self.hybrid_threshold
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fee_for_single_and_hybrid() {
        let aave = FlashLoanSource::Aave { fee_bps: 9 };
        assert_eq!(aave.fee_for(dec!(10000)), dec!(9));

        let hybrid = FlashLoanSource::Hybrid(vec![
            (FlashLoanSource::Balancer { fee_bps: 0 }, dec!(6000)),
            (aave, dec!(4000)),
        ]);
        assert_eq!(hybrid.fee_for(dec!(10000)), dec!(3.6));
        assert!(!hybrid.is_fee_free());
        assert_eq!(hybrid.loan_count(), 2);
    }

    #[test]
    fn test_fee_for_large_native_amount() {
        let aave = FlashLoanSource::Aave { fee_bps: 9 };
        assert_eq!(
            aave.fee_for(dec!(10000000000000000000000000000)),
            dec!(9000000000000000000000000)
        );
    }

    #[test]
    fn test_support_rule_bounds() {
        let rule = SupportRule::for_assets(["WETH".into()])
            .with_min_amount(dec!(1))
            .with_capacity(dec!(100));

        assert!(rule.supports(&"WETH".into(), dec!(100)));
        assert!(!rule.supports(&"WETH".into(), dec!(100.01)));
        assert!(!rule.supports(&"WETH".into(), dec!(0.5)));
        assert!(!rule.supports(&"USDC".into(), dec!(10)));
        assert!(SupportRule::any().supports(&"USDC".into(), dec!(1)));
    }

    #[test]
    fn test_catalog_rejects_empty_and_hybrid_entries() {
        assert!(SourceCatalog::new(vec![], dec!(0)).is_err());

        let hybrid = SourceEntry::new(FlashLoanSource::Hybrid(vec![]), SupportRule::any());
        assert!(SourceCatalog::new(vec![hybrid], dec!(0)).is_err());
    }

    #[test]
    fn test_source_serde_shape() {
        let source = FlashLoanSource::UniswapV3Pool {
            pool_id: "0xpool".to_string(),
            fee_bps: 5,
        };
        let json = serde_json::to_string(&source).unwrap();
        assert_eq!(json, r#"{"uniswap_v3_pool":{"pool_id":"0xpool","fee_bps":5}}"#);
    }
}
