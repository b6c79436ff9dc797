//! End-to-end execution scenarios against a mock signer and relay transport

use async_trait::async_trait;
use flash_arbitrage::config::{EndpointEntry, SourceConfig, SourceKind};
use flash_arbitrage::path_builder::{self, FeedEntry, LegQuote, QuotedOpportunity};
use flash_arbitrage::{
    EngineConfig, ExecutionCoordinator, ExecutionError, ExecutionPlan, FlashLoanSource,
    SignedPayload, SignerError, SupportRule, TransactionSigner,
};
use mev::{Bundle, RelayError, RelayKind, RelayTarget, RelayTransport, SubmissionError};
use network::EndpointQueue;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use types::{Amount, AssetId, Opportunity, PrivacyLevel, SignedTransaction, VenueKind};

#[derive(Default)]
struct RecordingTransport {
    sends: Mutex<Vec<String>>,
}

impl RecordingTransport {
    fn sends(&self) -> Vec<String> {
        self.sends.lock().clone()
    }
}

#[async_trait]
impl RelayTransport for RecordingTransport {
    async fn send_transaction(
        &self,
        relay: &RelayTarget,
        tx: &SignedTransaction,
    ) -> Result<String, RelayError> {
        self.sends.lock().push(relay.name.clone());
        Ok(tx.hash().to_string())
    }

    async fn send_bundle(&self, relay: &RelayTarget, bundle: &Bundle) -> Result<String, RelayError> {
        self.sends.lock().push(relay.name.clone());
        Ok(bundle.id())
    }

    async fn await_inclusion(
        &self,
        _relay: &RelayTarget,
        _hashes: &[String],
        _max_wait: Duration,
    ) -> Result<Option<u64>, RelayError> {
        Ok(Some(100))
    }

    async fn ping(&self, _relay: &RelayTarget) -> Result<(), RelayError> {
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum SignerMode {
    Transaction,
    Bundle,
    Reject,
}

struct MockSigner {
    mode: SignerMode,
    calls: AtomicUsize,
    last_plan: Mutex<Option<ExecutionPlan>>,
}

impl MockSigner {
    fn new(mode: SignerMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
            last_plan: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    async fn sign(&self, plan: &ExecutionPlan) -> Result<SignedPayload, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_plan.lock() = Some(plan.clone());

        let tx = SignedTransaction::new(plan.id.as_bytes().to_vec());
        match self.mode {
            SignerMode::Transaction => Ok(SignedPayload::Transaction(tx)),
            SignerMode::Bundle => Ok(SignedPayload::Bundle {
                transactions: vec![SignedTransaction::new(vec![0xaa]), tx],
                target_block: 100,
            }),
            SignerMode::Reject => Err(SignerError::Rejected {
                plan_id: plan.id,
                message: "insufficient balance".to_string(),
            }),
        }
    }
}

fn source(kind: SourceKind, fee_bps: u32, support: SupportRule) -> SourceConfig {
    SourceConfig {
        kind,
        fee_bps,
        pool_id: None,
        reliability_rank: None,
        support,
    }
}

fn engine_config(sources: Vec<SourceConfig>) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.global.block_time_ms = 10;
    config.global.event_channel_capacity = 0;
    config.endpoints = ["p1", "p2", "p3", "signer"]
        .iter()
        .map(|id| EndpointEntry {
            id: id.to_string(),
            max_concurrent: 4,
            max_per_window: 100,
            window_ms: 1_000,
            timeout_ms: 1_000,
        })
        .collect();
    config.relays = vec![
        RelayTarget::new("p1", RelayKind::PrivateRelayBasic, "p1", "http://p1.invalid", 1),
        RelayTarget::new("p2", RelayKind::PrivateRelayBasic, "p2", "http://p2.invalid", 2),
    ];
    config.sources = sources;
    config
}

struct Harness {
    coordinator: ExecutionCoordinator,
    transport: Arc<RecordingTransport>,
    signer: Arc<MockSigner>,
}

fn harness(config: &EngineConfig, mode: SignerMode) -> Harness {
    let queue = Arc::new(config.build_queue().unwrap());
    let transport = Arc::new(RecordingTransport::default());
    let signer = Arc::new(MockSigner::new(mode));
    let coordinator = config
        .build_coordinator(queue, transport.clone(), signer.clone(), None)
        .unwrap();
    Harness {
        coordinator,
        transport,
        signer,
    }
}

/// Borrow `amount` X, swap X -> Y -> X ending at `final_out`
fn opportunity(id: &str, amount: Amount, final_out: Amount, gross: Amount, gas: Amount) -> Opportunity {
    let path = path_builder::build(
        vec![
            LegQuote::new("X/Y", "X", "Y", 30, VenueKind::ConstantProduct, dec!(20)),
            LegQuote::new("Y/X", "Y", "X", 5, VenueKind::ConcentratedLiquidity, final_out),
        ],
        "X".into(),
        amount,
        50,
    )
    .unwrap();

    Opportunity {
        id: id.to_string(),
        borrow_asset: "X".into(),
        borrow_amount: amount,
        path,
        estimated_gross_profit: gross,
        estimated_gas_cost: gas,
    }
}

fn standard_opportunity(gross: Amount, gas: Amount) -> Opportunity {
    opportunity("opp-1", dec!(10000), dec!(10050), gross, gas)
}

#[tokio::test]
async fn test_fee_free_source_nets_45_on_priority_one_relay() {
    let config = engine_config(vec![
        source(SourceKind::Aave, 9, SupportRule::any()),
        source(SourceKind::Balancer, 0, SupportRule::for_assets([AssetId::new("X")])),
    ]);
    let h = harness(&config, SignerMode::Transaction);

    let outcome = h
        .coordinator
        .execute(&standard_opportunity(dec!(50), dec!(5)))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.source, FlashLoanSource::Balancer { fee_bps: 0 });
    assert_eq!(outcome.breakdown.loan_fee, dec!(0));
    assert_eq!(outcome.breakdown.net, dec!(45));
    assert_eq!(outcome.submission.relay_used, "p1");
    assert_eq!(outcome.submission.block_number, Some(100));
    assert_eq!(h.transport.sends(), vec!["p1".to_string()]);
    assert_eq!(outcome.execution_steps.len(), 3);
    assert!(outcome.execution_steps.iter().all(|step| step.success));
}

#[tokio::test]
async fn test_nine_bps_source_nets_36() {
    let config = engine_config(vec![source(SourceKind::Aave, 9, SupportRule::any())]);
    let h = harness(&config, SignerMode::Transaction);

    let outcome = h
        .coordinator
        .execute(&standard_opportunity(dec!(50), dec!(5)))
        .await
        .unwrap();

    assert_eq!(outcome.source, FlashLoanSource::Aave { fee_bps: 9 });
    assert_eq!(outcome.breakdown.loan_fee, dec!(9));
    assert_eq!(outcome.breakdown.net, dec!(36));
    assert!(outcome.success);

    let plan = h.signer.last_plan.lock().clone().unwrap();
    assert_eq!(plan.loan_fee, dec!(9));
    assert_eq!(plan.gas_limit, flash_arbitrage::estimate_gas_limit(2, 1));
    assert!(plan.deadline > plan.created_at.timestamp());
}

#[tokio::test]
async fn test_unprofitable_makes_no_relay_calls() {
    let config = engine_config(vec![source(SourceKind::Balancer, 0, SupportRule::any())]);
    let h = harness(&config, SignerMode::Transaction);

    let result = h
        .coordinator
        .execute(&standard_opportunity(dec!(3), dec!(5)))
        .await;

    match result {
        Err(ExecutionError::Unprofitable { net_profit, .. }) => assert_eq!(net_profit, dec!(-2)),
        other => panic!("expected Unprofitable, got {other:?}"),
    }
    assert!(h.transport.sends().is_empty());
    assert_eq!(h.signer.calls.load(Ordering::SeqCst), 0);

    let stats = h.coordinator.stats();
    assert_eq!(stats.total_attempts, 1);
    assert_eq!(stats.unprofitable, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_min_profit_margin_gate() {
    let mut config = engine_config(vec![source(SourceKind::Aave, 9, SupportRule::any())]);
    config.global.min_profit_margin = dec!(40);
    let h = harness(&config, SignerMode::Transaction);

    let result = h
        .coordinator
        .execute(&standard_opportunity(dec!(50), dec!(5)))
        .await;

    assert!(matches!(result, Err(ExecutionError::Unprofitable { .. })));
    assert!(h.transport.sends().is_empty());
}

#[tokio::test]
async fn test_unrepayable_cyclic_path_rejected() {
    let config = engine_config(vec![source(SourceKind::Aave, 9, SupportRule::any())]);
    let h = harness(&config, SignerMode::Transaction);

    // 10005 back cannot cover 10000 + 9 owed, whatever the caller's gross estimate says
    let opp = opportunity("opp-short", dec!(10000), dec!(10005), dec!(50), dec!(5));
    let result = h.coordinator.execute(&opp).await;

    match result {
        Err(e @ ExecutionError::Unrepayable { .. }) => assert!(e.is_rejection()),
        other => panic!("expected Unrepayable, got {other:?}"),
    }
    assert!(h.transport.sends().is_empty());
}

#[tokio::test]
async fn test_hybrid_above_threshold() {
    let mut config = engine_config(vec![
        source(SourceKind::Balancer, 0, SupportRule::any().with_capacity(dec!(6000))),
        source(SourceKind::Dydx, 0, SupportRule::any().with_capacity(dec!(8000))),
        source(SourceKind::Aave, 9, SupportRule::any()),
    ]);
    config.global.hybrid_threshold_amount = dec!(5000);
    let h = harness(&config, SignerMode::Transaction);

    let quote = h
        .coordinator
        .quote(&standard_opportunity(dec!(50), dec!(5)))
        .unwrap();

    match &quote.source {
        FlashLoanSource::Hybrid(parts) => {
            assert_eq!(parts.len(), 2);
            assert_eq!(parts[0], (FlashLoanSource::DyDx { fee_bps: 0 }, dec!(5714)));
            assert_eq!(parts[1], (FlashLoanSource::Balancer { fee_bps: 0 }, dec!(4286)));
        }
        other => panic!("expected hybrid, got {other}"),
    }
    assert_eq!(quote.breakdown.net, dec!(45));
    assert_eq!(quote.gas_limit, flash_arbitrage::estimate_gas_limit(2, 2));
}

#[tokio::test]
async fn test_at_threshold_falls_back_to_fee_bearing() {
    let mut config = engine_config(vec![
        source(SourceKind::Balancer, 0, SupportRule::any().with_capacity(dec!(6000))),
        source(SourceKind::Dydx, 0, SupportRule::any().with_capacity(dec!(8000))),
        source(SourceKind::Aave, 9, SupportRule::any()),
    ]);
    config.global.hybrid_threshold_amount = dec!(10000);
    let h = harness(&config, SignerMode::Transaction);

    let quote = h
        .coordinator
        .quote(&standard_opportunity(dec!(50), dec!(5)))
        .unwrap();
    assert_eq!(quote.source, FlashLoanSource::Aave { fee_bps: 9 });
}

#[tokio::test]
async fn test_quote_is_deterministic_and_side_effect_free() {
    let config = engine_config(vec![
        source(SourceKind::Aave, 9, SupportRule::any()),
        source(SourceKind::Dydx, 0, SupportRule::any()),
        source(SourceKind::Balancer, 0, SupportRule::any()),
    ]);
    let h = harness(&config, SignerMode::Transaction);
    let opp = standard_opportunity(dec!(50), dec!(5));

    let first = h.coordinator.quote(&opp).unwrap();
    for _ in 0..10 {
        assert_eq!(h.coordinator.quote(&opp).unwrap(), first);
    }
    assert_eq!(first.privacy_level, PrivacyLevel::Basic);
    assert!(h.transport.sends().is_empty());
    assert_eq!(h.signer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.coordinator.stats().total_attempts, 0);
}

#[tokio::test]
async fn test_large_profit_requires_enhanced_relay() {
    let mut config = engine_config(vec![source(SourceKind::Balancer, 0, SupportRule::any())]);
    config.relays.push(RelayTarget::new(
        "p3",
        RelayKind::PrivateRelayEnhanced,
        "p3",
        "http://p3.invalid",
        3,
    ));
    let h = harness(&config, SignerMode::Transaction);

    let opp = opportunity("opp-big", dec!(10000), dec!(10600), dec!(600), dec!(5));
    let outcome = h.coordinator.execute(&opp).await.unwrap();

    assert_eq!(outcome.submission.relay_used, "p3");
    assert_eq!(h.transport.sends(), vec!["p3".to_string()]);
}

#[tokio::test]
async fn test_no_adequate_relay_is_a_failure() {
    let config = engine_config(vec![source(SourceKind::Balancer, 0, SupportRule::any())]);
    let h = harness(&config, SignerMode::Transaction);

    let opp = opportunity("opp-huge", dec!(10000), dec!(12000), dec!(2000), dec!(5));
    let result = h.coordinator.execute(&opp).await;

    assert!(matches!(
        result,
        Err(ExecutionError::Submission(SubmissionError::NoCandidates { .. }))
    ));
    assert_eq!(h.coordinator.stats().failed, 1);
}

#[tokio::test]
async fn test_bundle_payload_submitted() {
    let config = engine_config(vec![source(SourceKind::Balancer, 0, SupportRule::any())]);
    let h = harness(&config, SignerMode::Bundle);

    let outcome = h
        .coordinator
        .execute(&standard_opportunity(dec!(50), dec!(5)))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.submission.relay_used, "p1");
    assert_eq!(outcome.submission.block_number, Some(100));
}

#[tokio::test]
async fn test_signer_rejection_counts_as_failure() {
    let config = engine_config(vec![source(SourceKind::Balancer, 0, SupportRule::any())]);
    let h = harness(&config, SignerMode::Reject);

    let result = h
        .coordinator
        .execute(&standard_opportunity(dec!(50), dec!(5)))
        .await;

    assert!(matches!(result, Err(ExecutionError::Signing(_))));
    assert!(h.transport.sends().is_empty());
    let stats = h.coordinator.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.unprofitable, 0);
}

#[tokio::test]
async fn test_signer_rejection_reaches_no_relay() {
    let config = engine_config(vec![source(SourceKind::Balancer, 0, SupportRule::any())]);
    let queue = Arc::new(config.build_queue().unwrap());
    let transport = Arc::new(RecordingTransport::default());
    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    let coordinator = config
        .build_coordinator(
            queue,
            transport.clone(),
            Arc::new(MockSigner::new(SignerMode::Reject)),
            Some(tx),
        )
        .unwrap();

    let result = coordinator
        .execute(&standard_opportunity(dec!(50), dec!(5)))
        .await;

    assert!(matches!(result, Err(ExecutionError::Signing(_))));
    assert!(rx.try_recv().is_err());
    let snapshot = coordinator.metrics_snapshot();
    assert_eq!(snapshot.relays["p1"].total_submissions, 0);
    assert_eq!(snapshot.relays["p2"].total_submissions, 0);
    assert!(transport.sends().is_empty());
}

#[tokio::test]
async fn test_quoted_feed_entry_built_with_configured_slippage() {
    let config = engine_config(vec![source(SourceKind::Balancer, 0, SupportRule::any())]);
    let h = harness(&config, SignerMode::Transaction);

    let entry = FeedEntry::Quoted(QuotedOpportunity {
        id: "quoted-1".to_string(),
        borrow_asset: "X".into(),
        borrow_amount: dec!(10000),
        legs: vec![
            LegQuote::new("X/Y", "X", "Y", 30, VenueKind::ConstantProduct, dec!(20)),
            LegQuote::new("Y/X", "Y", "X", 5, VenueKind::ConcentratedLiquidity, dec!(10050)),
        ],
        estimated_gross_profit: dec!(50),
        estimated_gas_cost: dec!(5),
        strategy: Default::default(),
    });
    let opportunity = entry
        .into_opportunity(config.global.max_slippage_bps)
        .unwrap();
    assert_eq!(
        opportunity.path,
        standard_opportunity(dec!(50), dec!(5)).path
    );

    let outcome = h.coordinator.execute(&opportunity).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.opportunity_id, "quoted-1");
    assert_eq!(outcome.breakdown.net, dec!(45));
}

#[tokio::test]
async fn test_metrics_snapshot_and_health() {
    let config = engine_config(vec![source(SourceKind::Balancer, 0, SupportRule::any())]);
    let h = harness(&config, SignerMode::Transaction);

    h.coordinator
        .execute(&standard_opportunity(dec!(50), dec!(5)))
        .await
        .unwrap();
    let _ = h
        .coordinator
        .execute(&standard_opportunity(dec!(3), dec!(5)))
        .await;

    let snapshot = h.coordinator.metrics_snapshot();
    assert_eq!(snapshot.execution.total_attempts, 2);
    assert_eq!(snapshot.execution.successful, 1);
    assert_eq!(snapshot.execution.unprofitable, 1);
    assert_eq!(snapshot.execution.total_net_profit, dec!(45));
    assert_eq!(snapshot.relays["p1"].successful_inclusions, 1);
    assert_eq!(snapshot.relays["p2"].total_submissions, 0);
    assert_eq!(snapshot.endpoints["p1"].total, 1);
    assert!(serde_json::to_string(&snapshot).is_ok());

    let health = h.coordinator.health_report().await;
    assert_eq!(health.len(), 2);
    assert!(health.values().all(|healthy| *healthy));
}

#[tokio::test]
async fn test_misconfigured_engine_refuses_to_start() {
    let mut config = engine_config(vec![source(SourceKind::Balancer, 0, SupportRule::any())]);
    config.relays[1].endpoint = "missing".to_string();

    let queue = Arc::new(EndpointQueue::new());
    let result = config.build_coordinator(
        queue,
        Arc::new(RecordingTransport::default()),
        Arc::new(MockSigner::new(SignerMode::Transaction)),
        None,
    );
    assert!(result.is_err());
}
