//! Swap legs and execution paths
//!
//! An `ExecutionPath` is the canonical form of a flash-loan route: the asset
//! borrowed, the ordered swap legs it flows through, and the global output
//! floor below which the on-chain execution must revert.

use crate::{Amount, AssetId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of swap legs in a single path
pub const MAX_PATH_LEGS: usize = 5;

/// Basis point denominator (10_000 bps = 100%)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// DEX family a leg executes against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
    /// x*y=k pools (Uniswap V2, Sushiswap, ...)
    ConstantProduct,
    /// Tick-based pools (Uniswap V3, Algebra, ...)
    ConcentratedLiquidity,
    /// Curve-style invariant pools
    StableSwap,
    /// Anything else, identified by name
    Custom(String),
}

impl VenueKind {
    /// Numeric tag used when encoding legs for the executor contract
    pub fn code(&self) -> u8 {
        match self {
            VenueKind::ConstantProduct => 0,
            VenueKind::ConcentratedLiquidity => 1,
            VenueKind::StableSwap => 2,
            VenueKind::Custom(_) => 255,
        }
    }
}

/// Whether the route must return to the borrowed asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStrategy {
    /// Last leg must output the borrowed asset
    #[default]
    Cyclic,
    /// Last leg may output any asset; repayment is settled by the contract
    Open,
}

/// Structural path errors; always fatal to the attempt and never retried
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid path length {len} (must be 1..={max})", max = MAX_PATH_LEGS)]
    InvalidLength { len: usize },

    #[error("broken token continuity after leg {index}: {token_out} does not feed {token_in}")]
    BrokenContinuity {
        index: usize,
        token_out: AssetId,
        token_in: AssetId,
    },

    #[error("borrow asset {borrow_asset} does not match first leg input {first_token_in}")]
    BorrowAssetMismatch {
        borrow_asset: AssetId,
        first_token_in: AssetId,
    },

    #[error("cyclic path ends in {last_token_out}, expected {borrow_asset}")]
    OpenLoop {
        borrow_asset: AssetId,
        last_token_out: AssetId,
    },

    #[error("invalid parameter {field}: {message}")]
    InvalidParameter { field: String, message: String },
}

impl PathError {
    pub fn invalid_parameter(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// One exchange hop. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapLeg {
    pool_id: String,
    token_in: AssetId,
    token_out: AssetId,
    /// Venue-specific fee tier in basis points
    fee_tier: u32,
    expected_out: Amount,
    min_out: Amount,
    venue_kind: VenueKind,
}

impl SwapLeg {
    pub fn new(
        pool_id: impl Into<String>,
        token_in: AssetId,
        token_out: AssetId,
        fee_tier: u32,
        venue_kind: VenueKind,
        expected_out: Amount,
        min_out: Amount,
    ) -> Self {
        Self {
            pool_id: pool_id.into(),
            token_in,
            token_out,
            fee_tier,
            expected_out,
            min_out,
            venue_kind,
        }
    }

    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    pub fn token_in(&self) -> &AssetId {
        &self.token_in
    }

    pub fn token_out(&self) -> &AssetId {
        &self.token_out
    }

    pub fn fee_tier(&self) -> u32 {
        self.fee_tier
    }

    /// Quoted output the slippage floor was derived from
    pub fn expected_out(&self) -> Amount {
        self.expected_out
    }

    /// Slippage floor for this leg
    pub fn min_out(&self) -> Amount {
        self.min_out
    }

    pub fn venue_kind(&self) -> &VenueKind {
        &self.venue_kind
    }
}

/// Ordered 1..=5 swap legs plus the flash-loan terms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPath {
    legs: Vec<SwapLeg>,
    borrow_asset: AssetId,
    borrow_amount: Amount,
    min_final_amount: Amount,
    #[serde(default)]
    strategy: PathStrategy,
}

impl ExecutionPath {
    /// Construct a path, enforcing every structural invariant
    pub fn try_new(
        legs: Vec<SwapLeg>,
        borrow_asset: AssetId,
        borrow_amount: Amount,
        min_final_amount: Amount,
        strategy: PathStrategy,
    ) -> Result<Self, PathError> {
        let path = Self {
            legs,
            borrow_asset,
            borrow_amount,
            min_final_amount,
            strategy,
        };
        path.validate()?;
        Ok(path)
    }

    /// Re-check every invariant. Paths arriving from the opportunity feed were
    /// deserialized without going through `try_new` and may be stale.
    pub fn validate(&self) -> Result<(), PathError> {
        let len = self.legs.len();
        if len == 0 || len > MAX_PATH_LEGS {
            return Err(PathError::InvalidLength { len });
        }

        if self.borrow_amount <= Amount::ZERO {
            return Err(PathError::invalid_parameter(
                "borrow_amount",
                "must be positive",
            ));
        }

        let first = &self.legs[0];
        if first.token_in != self.borrow_asset {
            return Err(PathError::BorrowAssetMismatch {
                borrow_asset: self.borrow_asset.clone(),
                first_token_in: first.token_in.clone(),
            });
        }

        for (index, pair) in self.legs.windows(2).enumerate() {
            if pair[0].token_out != pair[1].token_in {
                return Err(PathError::BrokenContinuity {
                    index,
                    token_out: pair[0].token_out.clone(),
                    token_in: pair[1].token_in.clone(),
                });
            }
        }

        for (index, leg) in self.legs.iter().enumerate() {
            if leg.min_out < Amount::ZERO || leg.min_out > leg.expected_out {
                return Err(PathError::invalid_parameter(
                    "min_out",
                    format!("leg {index} floor {} outside 0..={}", leg.min_out, leg.expected_out),
                ));
            }
        }

        let last = &self.legs[len - 1];
        if self.strategy == PathStrategy::Cyclic && last.token_out != self.borrow_asset {
            return Err(PathError::OpenLoop {
                borrow_asset: self.borrow_asset.clone(),
                last_token_out: last.token_out.clone(),
            });
        }

        if self.min_final_amount < Amount::ZERO || self.min_final_amount > last.expected_out {
            return Err(PathError::invalid_parameter(
                "min_final_amount",
                format!(
                    "{} outside 0..={}",
                    self.min_final_amount, last.expected_out
                ),
            ));
        }

        Ok(())
    }

    pub fn legs(&self) -> &[SwapLeg] {
        &self.legs
    }

    pub fn borrow_asset(&self) -> &AssetId {
        &self.borrow_asset
    }

    pub fn borrow_amount(&self) -> Amount {
        self.borrow_amount
    }

    pub fn min_final_amount(&self) -> Amount {
        self.min_final_amount
    }

    pub fn strategy(&self) -> PathStrategy {
        self.strategy
    }

    pub fn hop_count(&self) -> usize {
        self.legs.len()
    }

    /// Quoted output of the last leg
    pub fn expected_final_amount(&self) -> Amount {
        self.legs
            .last()
            .map(SwapLeg::expected_out)
            .unwrap_or(Amount::ZERO)
    }

    /// Asset received at the end of the route
    pub fn final_asset(&self) -> Option<&AssetId> {
        self.legs.last().map(SwapLeg::token_out)
    }
}
