//! Transaction signing seam
//!
//! The engine never holds keys. It hands an [`ExecutionPlan`] to an injected
//! [`TransactionSigner`] and gets back either a single signed transaction or
//! an ordered bundle for a target block.

use crate::sources::FlashLoanSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use network::{EndpointQueue, QueueError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use types::{Amount, ExecutionPath, SignedTransaction};
use uuid::Uuid;

/// Everything a signer needs to encode the flash-loan call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: Uuid,
    pub opportunity_id: String,
    pub source: FlashLoanSource,
    pub path: ExecutionPath,
    pub loan_fee: Amount,
    /// Net profit below which the contract must revert
    pub min_profit: Amount,
    pub gas_limit: u64,
    /// Unix seconds after which the transaction must not execute
    pub deadline: i64,
    pub created_at: DateTime<Utc>,
}

/// Signer output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignedPayload {
    Transaction(SignedTransaction),
    Bundle {
        transactions: Vec<SignedTransaction>,
        target_block: u64,
    },
}

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("Signer rejected plan {plan_id}: {message}")]
    Rejected { plan_id: Uuid, message: String },

    #[error("Signer unreachable: {0}")]
    Queue(#[from] QueueError),

    #[error("Malformed signer response: {message}")]
    Malformed { message: String },

    #[error("Signer HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign(&self, plan: &ExecutionPlan) -> Result<SignedPayload, SignerError>;
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(default)]
    transactions: Vec<String>,
    #[serde(default)]
    target_block: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

/// Signs by POSTing the plan to an external signing service. The call is
/// admitted through the endpoint queue like every other outbound request, and
/// each request is bounded by `request_timeout` once admitted.
pub struct RemoteSigner {
    client: reqwest::Client,
    url: String,
    endpoint: String,
    queue: Arc<EndpointQueue>,
}

impl RemoteSigner {
    pub fn new(
        url: impl Into<String>,
        endpoint: impl Into<String>,
        queue: Arc<EndpointQueue>,
        request_timeout: Duration,
    ) -> Result<Self, SignerError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            endpoint: endpoint.into(),
            queue,
        })
    }

    fn into_payload(plan_id: Uuid, response: SignResponse) -> Result<SignedPayload, SignerError> {
        if let Some(message) = response.error {
            return Err(SignerError::Rejected { plan_id, message });
        }

        let transactions = response
            .transactions
            .iter()
            .map(|raw| SignedTransaction::from_hex(raw))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SignerError::Malformed {
                message: e.to_string(),
            })?;

        if transactions.is_empty() {
            return Err(SignerError::Malformed {
                message: "no transactions returned".to_string(),
            });
        }

        match response.target_block {
            Some(target_block) => Ok(SignedPayload::Bundle {
                transactions,
                target_block,
            }),
            None => {
                let count = transactions.len();
                let mut transactions = transactions.into_iter();
                match (transactions.next(), transactions.next()) {
                    (Some(tx), None) => Ok(SignedPayload::Transaction(tx)),
                    _ => Err(SignerError::Malformed {
                        message: format!("{count} transactions returned without a target block"),
                    }),
                }
            }
        }
    }
}

#[async_trait]
impl TransactionSigner for RemoteSigner {
    async fn sign(&self, plan: &ExecutionPlan) -> Result<SignedPayload, SignerError> {
        let request = self.client.post(&self.url).json(plan);
        let response: SignResponse = self
            .queue
            .submit(&self.endpoint, move || async move {
                request.send().await?.error_for_status()?.json::<SignResponse>().await
            })
            .await?;

        debug!(plan = %plan.id, transactions = response.transactions.len(), "Plan signed");
        Self::into_payload(plan.id, response)
    }
}
