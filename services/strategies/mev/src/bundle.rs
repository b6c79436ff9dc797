//! Bundle construction for atomic multi-transaction submission

use crate::error::SubmissionError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use types::{keccak256_hex, SignedTransaction};

/// Ordered transactions that land together in `target_block` or not at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    transactions: Vec<SignedTransaction>,
    target_block: u64,
    min_timestamp: Option<u64>,
    max_timestamp: Option<u64>,
}

/// Builder for constructing bundles
pub struct BundleBuilder {
    transactions: Vec<SignedTransaction>,
    target_block: u64,
    min_timestamp: Option<u64>,
    max_timestamp: Option<u64>,
}

impl BundleBuilder {
    pub fn new(target_block: u64) -> Self {
        Self {
            transactions: Vec::new(),
            target_block,
            min_timestamp: None,
            max_timestamp: None,
        }
    }

    pub fn add_transaction(mut self, tx: SignedTransaction) -> Self {
        self.transactions.push(tx);
        self
    }

    pub fn set_timestamp_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_timestamp = min;
        self.max_timestamp = max;
        self
    }

    pub fn build(self) -> Result<Bundle, SubmissionError> {
        if self.transactions.is_empty() {
            return Err(SubmissionError::EmptyBundle);
        }
        Ok(Bundle {
            transactions: self.transactions,
            target_block: self.target_block,
            min_timestamp: self.min_timestamp,
            max_timestamp: self.max_timestamp,
        })
    }
}

/// Package `transactions` for `target_block`, preserving order
pub fn create_bundle(
    transactions: Vec<SignedTransaction>,
    target_block: u64,
) -> Result<Bundle, SubmissionError> {
    transactions
        .into_iter()
        .fold(BundleBuilder::new(target_block), BundleBuilder::add_transaction)
        .build()
}

impl Bundle {
    pub fn transactions(&self) -> &[SignedTransaction] {
        &self.transactions
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn target_block(&self) -> u64 {
        self.target_block
    }

    pub fn hashes(&self) -> Vec<String> {
        self.transactions
            .iter()
            .map(|tx| tx.hash().to_string())
            .collect()
    }

    /// Stable identifier: keccak256 over the ordered transaction hashes
    pub fn id(&self) -> String {
        let joined: String = self.transactions.iter().map(|tx| tx.hash()).collect();
        keccak256_hex(joined.as_bytes())
    }

    /// `eth_sendBundle` parameter object
    pub fn to_rpc_params(&self) -> Value {
        let mut params = json!({
            "txs": self.transactions.iter().map(SignedTransaction::raw_hex).collect::<Vec<_>>(),
            "blockNumber": format!("0x{:x}", self.target_block),
        });
        if let Some(min) = self.min_timestamp {
            params["minTimestamp"] = json!(min);
        }
        if let Some(max) = self.max_timestamp {
            params["maxTimestamp"] = json!(max);
        }
        params
    }
}
