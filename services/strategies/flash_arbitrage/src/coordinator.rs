//! # Execution Coordinator - Go/No-Go and Delivery
//!
//! ## Purpose
//!
//! Composes path validation, source selection, profitability gating, signing
//! and private submission into one call per opportunity. This is the only
//! component that decides whether an opportunity is worth executing; every
//! layer below it is mechanical.
//!
//! ## Architecture Role
//!
//! ```text
//! Opportunity → [Path Check] → [Source Selection] → [Profit Gate] → [Sign] → [Submit]
//!                    ↓                ↓                   ↓            ↓         ↓
//!               PathError      SelectionError      Unprofitable    Signer   Relay chain
//!                                                  Unrepayable               (fallback)
//! ```
//!
//! Rejections (`Unprofitable`, `Unrepayable`) never touch the network.

use crate::path_builder;
use crate::selector::{SelectionError, SourceSelector};
use crate::signer::{ExecutionPlan, SignedPayload, SignerError, TransactionSigner};
use crate::sources::FlashLoanSource;
use crate::{log_execution, log_loan, log_profit, log_rejection, log_submission, log_success};
use chrono::{DateTime, Utc};
use mev::{
    create_bundle, PrivacyPolicy, RelayStats, SubmissionError, SubmissionManager,
    SubmissionOptions, SubmissionResult,
};
use network::EndpointMetrics;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, warn};
use types::{Amount, Opportunity, PathError, PathStrategy, PrivacyLevel};
use uuid::Uuid;

/// Fixed transaction overhead
pub const BASE_GAS: u64 = 100_000;
/// Per flash loan taken (hybrids take two)
pub const FLASH_LOAN_GAS: u64 = 150_000;
/// Per swap leg
pub const SWAP_STEP_GAS: u64 = 120_000;
/// Safety margin applied to the estimate, in percent
pub const GAS_BUFFER_PCT: u64 = 120;

/// Gas limit for a plan with `hops` swaps and `loans` flash loans
pub fn estimate_gas_limit(hops: usize, loans: usize) -> u64 {
    let raw = BASE_GAS + FLASH_LOAN_GAS * loans as u64 + SWAP_STEP_GAS * hops as u64;
    raw * GAS_BUFFER_PCT / 100
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),

    #[error("Opportunity {id} borrow terms disagree with its path")]
    InconsistentOpportunity { id: String },

    #[error("Source selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error("Unprofitable: net {net_profit} below margin {min_margin}")]
    Unprofitable { net_profit: Amount, min_margin: Amount },

    #[error("Unrepayable: expected {expected_final} cannot cover {owed} owed")]
    Unrepayable { expected_final: Amount, owed: Amount },

    #[error("Signing failed: {0}")]
    Signing(#[from] SignerError),

    #[error("Submission failed: {0}")]
    Submission(#[from] SubmissionError),
}

impl ExecutionError {
    /// Expected go/no-go outcomes, as opposed to failures
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ExecutionError::Unprofitable { .. } | ExecutionError::Unrepayable { .. }
        )
    }
}

/// Realized profit accounting, all in units of the borrow asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfitBreakdown {
    pub gross: Amount,
    pub loan_fee: Amount,
    pub gas: Amount,
    pub net: Amount,
}

impl ProfitBreakdown {
    pub fn new(gross: Amount, loan_fee: Amount, gas: Amount) -> Self {
        Self {
            gross,
            loan_fee,
            gas,
            net: gross - loan_fee - gas,
        }
    }
}

/// Timed pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionStep {
    pub step_name: String,
    pub duration_ms: u64,
    pub success: bool,
}

/// Dry-run result: everything decided before any network call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub opportunity_id: String,
    pub source: FlashLoanSource,
    pub breakdown: ProfitBreakdown,
    pub gas_limit: u64,
    pub privacy_level: PrivacyLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub opportunity_id: String,
    pub plan_id: Uuid,
    pub success: bool,
    pub source: FlashLoanSource,
    pub breakdown: ProfitBreakdown,
    pub submission: SubmissionResult,
    pub execution_steps: Vec<ExecutionStep>,
}

/// Per-coordinator execution counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionStats {
    pub total_attempts: u64,
    pub successful: u64,
    pub failed: u64,
    /// Rejected by the profitability or repayment gate
    pub unprofitable: u64,
    pub total_gas_cost: Amount,
    pub total_net_profit: Amount,
}

impl ExecutionStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.successful as f64 / self.total_attempts as f64
        }
    }
}

/// Pull-based view for observability collaborators
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub taken_at: DateTime<Utc>,
    pub endpoints: HashMap<String, EndpointMetrics>,
    pub relays: HashMap<String, RelayStats>,
    pub execution: ExecutionStats,
}

/// Coordinator policy knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Net profit must be at least this (and always positive)
    pub min_profit_margin: Amount,
    /// How long a signed plan stays executable
    pub deadline: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            min_profit_margin: Amount::ZERO,
            deadline: Duration::from_secs(300),
        }
    }
}

pub struct ExecutionCoordinator {
    selector: SourceSelector,
    submission: SubmissionManager,
    signer: Arc<dyn TransactionSigner>,
    policy: PrivacyPolicy,
    settings: CoordinatorSettings,
    stats: Mutex<ExecutionStats>,
}

impl ExecutionCoordinator {
    pub fn new(
        selector: SourceSelector,
        submission: SubmissionManager,
        signer: Arc<dyn TransactionSigner>,
        policy: PrivacyPolicy,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            selector,
            submission,
            signer,
            policy,
            settings,
            stats: Mutex::new(ExecutionStats::default()),
        }
    }

    pub fn submission(&self) -> &SubmissionManager {
        &self.submission
    }

    /// Validate, select and gate without side effects
    pub fn quote(&self, opportunity: &Opportunity) -> Result<Quote, ExecutionError> {
        let path = &opportunity.path;
        path_builder::validate(path)?;
        if !opportunity.is_consistent() {
            return Err(ExecutionError::InconsistentOpportunity {
                id: opportunity.id.clone(),
            });
        }

        let source = self.selector.select(path)?;
        let loan_fee = self.selector.fee_for(&source, path.borrow_amount());
        log_loan!(
            "Opportunity {} borrows {} {} from {} (fee {})",
            opportunity.id,
            path.borrow_amount(),
            path.borrow_asset(),
            source,
            loan_fee
        );

        let breakdown = ProfitBreakdown::new(
            opportunity.estimated_gross_profit,
            loan_fee,
            opportunity.estimated_gas_cost,
        );
        let min_margin = self.settings.min_profit_margin;
        if breakdown.net <= Amount::ZERO || breakdown.net < min_margin {
            return Err(ExecutionError::Unprofitable {
                net_profit: breakdown.net,
                min_margin,
            });
        }

        if path.strategy() == PathStrategy::Cyclic {
            let owed = path.borrow_amount() + loan_fee;
            let expected_final = path.expected_final_amount();
            if expected_final < owed {
                return Err(ExecutionError::Unrepayable {
                    expected_final,
                    owed,
                });
            }
        }

        Ok(Quote {
            opportunity_id: opportunity.id.clone(),
            gas_limit: estimate_gas_limit(path.hop_count(), source.loan_count()),
            privacy_level: self.policy.level_for(breakdown.net),
            source,
            breakdown,
        })
    }

    pub async fn execute(&self, opportunity: &Opportunity) -> Result<ExecutionOutcome, ExecutionError> {
        log_execution!(
            "Executing opportunity {} ({} hops, gross {})",
            opportunity.id,
            opportunity.path.hop_count(),
            opportunity.estimated_gross_profit
        );

        let result = self.run(opportunity).await;
        self.record(&result);

        match &result {
            Ok(outcome) => {
                log_success!(
                    "Opportunity {} included via {} in block {:?}",
                    outcome.opportunity_id,
                    outcome.submission.relay_used,
                    outcome.submission.block_number
                );
                log_profit!(
                    "Net {} = gross {} - fee {} - gas {}",
                    outcome.breakdown.net,
                    outcome.breakdown.gross,
                    outcome.breakdown.loan_fee,
                    outcome.breakdown.gas
                );
            }
            Err(e) if e.is_rejection() => {
                log_rejection!("Opportunity {} rejected: {}", opportunity.id, e);
            }
            Err(e @ ExecutionError::Submission(_)) => {
                error!(opportunity = %opportunity.id, error = %e, "Execution failed");
            }
            Err(e) => {
                warn!(opportunity = %opportunity.id, error = %e, "Execution failed");
            }
        }
        result
    }

    async fn run(&self, opportunity: &Opportunity) -> Result<ExecutionOutcome, ExecutionError> {
        let mut steps = Vec::with_capacity(3);

        let step_start = Instant::now();
        let quote = self.quote(opportunity);
        steps.push(step("Validation and gating", step_start, quote.is_ok()));
        let quote = quote?;

        let plan = self.plan(opportunity, &quote);
        let step_start = Instant::now();
        let signed = self.signer.sign(&plan).await;
        steps.push(step("Signing", step_start, signed.is_ok()));
        let signed = signed?;

        let options = self.policy.options_for(quote.breakdown.net);
        log_submission!(
            "Submitting plan {} at {} privacy (fast_mode={})",
            plan.id,
            options.privacy_level,
            options.fast_mode
        );

        let step_start = Instant::now();
        let submitted = self.deliver(signed, options).await;
        steps.push(step("Submission", step_start, submitted.is_ok()));
        let submission = submitted?;

        Ok(ExecutionOutcome {
            opportunity_id: opportunity.id.clone(),
            plan_id: plan.id,
            success: submission.included,
            source: quote.source,
            breakdown: quote.breakdown,
            submission,
            execution_steps: steps,
        })
    }

    fn plan(&self, opportunity: &Opportunity, quote: &Quote) -> ExecutionPlan {
        let created_at = Utc::now();
        let deadline = chrono::Duration::from_std(self.settings.deadline)
            .map(|d| created_at + d)
            .unwrap_or(created_at);

        ExecutionPlan {
            id: Uuid::new_v4(),
            opportunity_id: opportunity.id.clone(),
            source: quote.source.clone(),
            path: opportunity.path.clone(),
            loan_fee: quote.breakdown.loan_fee,
            min_profit: self.settings.min_profit_margin.max(Amount::ZERO),
            gas_limit: quote.gas_limit,
            deadline: deadline.timestamp(),
            created_at,
        }
    }

    async fn deliver(
        &self,
        payload: SignedPayload,
        options: SubmissionOptions,
    ) -> Result<SubmissionResult, ExecutionError> {
        let result = match payload {
            SignedPayload::Transaction(tx) => self.submission.submit(tx, options).await?,
            SignedPayload::Bundle {
                transactions,
                target_block,
            } => {
                let bundle = create_bundle(transactions, target_block)?;
                self.submission.submit_bundle(bundle, options).await?
            }
        };
        Ok(result)
    }

    fn record(&self, result: &Result<ExecutionOutcome, ExecutionError>) {
        let mut stats = self.stats.lock();
        stats.total_attempts += 1;
        match result {
            Ok(outcome) => {
                stats.successful += 1;
                stats.total_gas_cost += outcome.breakdown.gas;
                stats.total_net_profit += outcome.breakdown.net;
            }
            Err(e) if e.is_rejection() => stats.unprofitable += 1,
            Err(_) => stats.failed += 1,
        }
    }

    pub fn stats(&self) -> ExecutionStats {
        self.stats.lock().clone()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            taken_at: Utc::now(),
            endpoints: self.submission.queue().metrics_snapshot(),
            relays: self.submission.relay_stats(),
            execution: self.stats(),
        }
    }

    /// Per-relay reachability; unreachable relays are disabled
    pub async fn health_report(&self) -> HashMap<String, bool> {
        self.submission.check_all_health().await
    }
}

fn step(name: &str, started: Instant, success: bool) -> ExecutionStep {
    ExecutionStep {
        step_name: name.to_string(),
        duration_ms: started.elapsed().as_millis() as u64,
        success,
    }
}
