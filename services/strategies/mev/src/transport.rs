//! Relay transport seam
//!
//! The submission manager treats every relay as an opaque "send, then await
//! inclusion" capability. [`JsonRpcRelay`] speaks the Ethereum JSON-RPC
//! dialect shared by public nodes and private relays.

use crate::bundle::Bundle;
use crate::error::RelayError;
use crate::relay::RelayTarget;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;
use types::SignedTransaction;

/// Header carrying a relay's auth credential
pub const AUTH_HEADER: &str = "X-Flashbots-Signature";

#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Hand a signed transaction to the relay; returns its tracking id
    async fn send_transaction(
        &self,
        relay: &RelayTarget,
        tx: &SignedTransaction,
    ) -> Result<String, RelayError>;

    /// Hand a bundle to the relay; returns its tracking id
    async fn send_bundle(&self, relay: &RelayTarget, bundle: &Bundle) -> Result<String, RelayError>;

    /// Wait up to `max_wait` for every hash to be included in one block.
    /// `Ok(None)` means not included in time.
    async fn await_inclusion(
        &self,
        relay: &RelayTarget,
        hashes: &[String],
        max_wait: Duration,
    ) -> Result<Option<u64>, RelayError>;

    /// Lightweight reachability round-trip
    async fn ping(&self, relay: &RelayTarget) -> Result<(), RelayError>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC over HTTP relay client
pub struct JsonRpcRelay {
    client: reqwest::Client,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl JsonRpcRelay {
    pub fn new(request_timeout: Duration, poll_interval: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| RelayError::Http {
                relay: "client".to_string(),
                source,
            })?;
        Ok(Self {
            client,
            poll_interval,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, relay: &RelayTarget, method: &str, params: Value) -> Result<Value, RelayError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut builder = self.client.post(&relay.url).json(&request);
        if let Some(credential) = &relay.auth_credential {
            builder = builder.header(AUTH_HEADER, credential);
        }

        let http_error = |source| RelayError::Http {
            relay: relay.name.clone(),
            source,
        };
        let response: RpcResponse = builder
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;

        if let Some(error) = response.error {
            return Err(RelayError::Rpc {
                relay: relay.name.clone(),
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Block the receipt landed in, or `None` while pending
    async fn receipt_block(&self, relay: &RelayTarget, hash: &str) -> Result<Option<u64>, RelayError> {
        let receipt = self
            .call(relay, "eth_getTransactionReceipt", json!([hash]))
            .await?;
        if receipt.is_null() {
            return Ok(None);
        }

        let block_number = receipt
            .get("blockNumber")
            .and_then(Value::as_str)
            .and_then(parse_quantity)
            .ok_or_else(|| RelayError::malformed(&relay.name, "receipt without blockNumber"))?;

        if receipt.get("status").and_then(Value::as_str) == Some("0x0") {
            return Err(RelayError::Reverted {
                hash: hash.to_string(),
                block_number,
            });
        }
        Ok(Some(block_number))
    }
}

fn parse_quantity(value: &str) -> Option<u64> {
    u64::from_str_radix(value.strip_prefix("0x").unwrap_or(value), 16).ok()
}

#[async_trait]
impl RelayTransport for JsonRpcRelay {
    async fn send_transaction(
        &self,
        relay: &RelayTarget,
        tx: &SignedTransaction,
    ) -> Result<String, RelayError> {
        let result = self
            .call(relay, "eth_sendRawTransaction", json!([tx.raw_hex()]))
            .await?;
        Ok(result
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| tx.hash().to_string()))
    }

    async fn send_bundle(&self, relay: &RelayTarget, bundle: &Bundle) -> Result<String, RelayError> {
        let result = self
            .call(relay, "eth_sendBundle", json!([bundle.to_rpc_params()]))
            .await?;
        Ok(result
            .get("bundleHash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| bundle.id()))
    }

    async fn await_inclusion(
        &self,
        relay: &RelayTarget,
        hashes: &[String],
        max_wait: Duration,
    ) -> Result<Option<u64>, RelayError> {
        let deadline = Instant::now() + max_wait;
        loop {
            let mut blocks = Vec::with_capacity(hashes.len());
            for hash in hashes {
                match self.receipt_block(relay, hash).await? {
                    Some(block) => blocks.push(block),
                    None => break,
                }
            }

            if blocks.len() == hashes.len() {
                if let Some(&first) = blocks.first() {
                    if blocks.iter().all(|&block| block == first) {
                        return Ok(Some(first));
                    }
                }
                debug!(relay = %relay.name, ?blocks, "Receipts span multiple blocks");
                return Ok(None);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn ping(&self, relay: &RelayTarget) -> Result<(), RelayError> {
        self.call(relay, "eth_blockNumber", json!([]))
            .await
            .map(|_| ())
    }
}
