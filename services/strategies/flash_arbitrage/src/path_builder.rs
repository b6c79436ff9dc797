//! Path builder
//!
//! Turns caller quotes into a canonical [`ExecutionPath`] with per-leg
//! slippage floors. Pure: no I/O, no clock.
//!
//! Opportunity feeds may carry either a prebuilt path or raw leg quotes
//! ([`FeedEntry`]); quotes are built here with the configured slippage.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::{
    Amount, AssetId, ExecutionPath, Opportunity, PathError, PathStrategy, SwapLeg, VenueKind,
    BPS_DENOMINATOR, MAX_PATH_LEGS,
};

/// One quoted hop as supplied by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegQuote {
    pub pool_id: String,
    pub token_in: AssetId,
    pub token_out: AssetId,
    pub fee_tier: u32,
    pub venue_kind: VenueKind,
    pub expected_out: Amount,
}

impl LegQuote {
    pub fn new(
        pool_id: impl Into<String>,
        token_in: impl Into<AssetId>,
        token_out: impl Into<AssetId>,
        fee_tier: u32,
        venue_kind: VenueKind,
        expected_out: Amount,
    ) -> Self {
        Self {
            pool_id: pool_id.into(),
            token_in: token_in.into(),
            token_out: token_out.into(),
            fee_tier,
            venue_kind,
            expected_out,
        }
    }
}

/// Build a cyclic path (must return to `borrow_asset`)
pub fn build(
    legs: Vec<LegQuote>,
    borrow_asset: AssetId,
    borrow_amount: Amount,
    max_slippage_bps: u32,
) -> Result<ExecutionPath, PathError> {
    build_with_strategy(
        legs,
        borrow_asset,
        borrow_amount,
        max_slippage_bps,
        PathStrategy::Cyclic,
    )
}

pub fn build_with_strategy(
    legs: Vec<LegQuote>,
    borrow_asset: AssetId,
    borrow_amount: Amount,
    max_slippage_bps: u32,
    strategy: PathStrategy,
) -> Result<ExecutionPath, PathError> {
    if legs.is_empty() || legs.len() > MAX_PATH_LEGS {
        return Err(PathError::InvalidLength { len: legs.len() });
    }
    if max_slippage_bps > BPS_DENOMINATOR {
        return Err(PathError::invalid_parameter(
            "max_slippage_bps",
            format!("{max_slippage_bps} exceeds {BPS_DENOMINATOR}"),
        ));
    }
    if borrow_amount <= Amount::ZERO {
        return Err(PathError::invalid_parameter("borrow_amount", "must be positive"));
    }
    if let Some((index, _)) = legs
        .iter()
        .enumerate()
        .find(|(_, quote)| quote.expected_out <= Amount::ZERO)
    {
        return Err(PathError::invalid_parameter(
            "expected_out",
            format!("leg {index} quotes a non-positive output"),
        ));
    }

    let factor = slippage_factor(max_slippage_bps);

    let swap_legs: Vec<SwapLeg> = legs
        .into_iter()
        .map(|quote| {
            let min_out = quote.expected_out * factor;
            SwapLeg::new(
                quote.pool_id,
                quote.token_in,
                quote.token_out,
                quote.fee_tier,
                quote.venue_kind,
                quote.expected_out,
                min_out,
            )
        })
        .collect();

    // The last leg's floor, expected_final * factor, is never looser than the
    // compounded bound expected_final * factor^hops.
    let min_final_amount = swap_legs[swap_legs.len() - 1].min_out();

    ExecutionPath::try_new(
        swap_legs,
        borrow_asset,
        borrow_amount,
        min_final_amount,
        strategy,
    )
}

/// Opportunity as produced by discovery, with raw quotes instead of a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedOpportunity {
    pub id: String,
    pub borrow_asset: AssetId,
    pub borrow_amount: Amount,
    pub legs: Vec<LegQuote>,
    pub estimated_gross_profit: Amount,
    pub estimated_gas_cost: Amount,
    #[serde(default)]
    pub strategy: PathStrategy,
}

impl QuotedOpportunity {
    pub fn build(self, max_slippage_bps: u32) -> Result<Opportunity, PathError> {
        let path = build_with_strategy(
            self.legs,
            self.borrow_asset.clone(),
            self.borrow_amount,
            max_slippage_bps,
            self.strategy,
        )?;
        Ok(Opportunity {
            id: self.id,
            borrow_asset: self.borrow_asset,
            borrow_amount: self.borrow_amount,
            path,
            estimated_gross_profit: self.estimated_gross_profit,
            estimated_gas_cost: self.estimated_gas_cost,
        })
    }
}

/// One line of the opportunity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedEntry {
    Built(Opportunity),
    Quoted(QuotedOpportunity),
}

impl FeedEntry {
    pub fn id(&self) -> &str {
        match self {
            FeedEntry::Built(opportunity) => &opportunity.id,
            FeedEntry::Quoted(quoted) => &quoted.id,
        }
    }

    /// Prebuilt paths pass through; quotes are built with `max_slippage_bps`
    pub fn into_opportunity(self, max_slippage_bps: u32) -> Result<Opportunity, PathError> {
        match self {
            FeedEntry::Built(opportunity) => Ok(opportunity),
            FeedEntry::Quoted(quoted) => quoted.build(max_slippage_bps),
        }
    }
}

/// Re-check every invariant of a path that may be stale
pub fn validate(path: &ExecutionPath) -> Result<(), PathError> {
    path.validate()
}

fn slippage_factor(max_slippage_bps: u32) -> Decimal {
    Decimal::from(BPS_DENOMINATOR - max_slippage_bps) / Decimal::from(BPS_DENOMINATOR)
}
