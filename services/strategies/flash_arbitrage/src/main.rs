use anyhow::{Context, Result};
use clap::Parser;
use flash_arbitrage::path_builder::FeedEntry;
use flash_arbitrage::{
    log_metrics, EngineConfig, ExecutionCoordinator, ExecutionError, RemoteSigner,
    TransactionSigner,
};
use mev::{JsonRpcRelay, RelayTransport};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Executes flash-loan arbitrage opportunities read as JSON lines from stdin.
/// Each line is either a built opportunity or raw leg quotes.
#[derive(Parser, Debug)]
#[command(name = "flash_arbitrage", version)]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Quote each opportunity without signing or submitting
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("🚀 Starting Flash Arbitrage Execution Engine...");

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env_overrides();
    config.validate().context("Invalid engine configuration")?;

    let queue = Arc::new(config.build_queue()?);
    info!("✅ Endpoint queue configured for {:?}", queue.endpoints());

    let transport: Arc<dyn RelayTransport> = Arc::new(
        JsonRpcRelay::new(
            Duration::from_millis(config.global.request_timeout_ms),
            Duration::from_millis(config.global.inclusion_poll_ms),
        )
        .context("Failed to build relay HTTP client")?,
    );
    let signer: Arc<dyn TransactionSigner> = Arc::new(
        RemoteSigner::new(
            config.signer.url.clone(),
            config.signer.endpoint.clone(),
            queue.clone(),
            Duration::from_millis(config.global.request_timeout_ms),
        )
        .context("Failed to build signer HTTP client")?,
    );

    let events = if config.global.event_channel_capacity > 0 {
        let (tx, mut rx) = mpsc::channel(config.global.event_channel_capacity);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                debug!(?event, "Submission event");
            }
        });
        Some(tx)
    } else {
        None
    };

    let coordinator = Arc::new(
        config
            .build_coordinator(queue, transport, signer, events)
            .context("Failed to assemble execution engine")?,
    );
    info!(
        "✅ Engine ready: {} relays, {} flash-loan sources",
        config.relays.len(),
        config.sources.len()
    );

    let health = coordinator.health_report().await;
    for (relay, healthy) in &health {
        if *healthy {
            info!("🌐 Relay {} reachable", relay);
        } else {
            warn!("🌐 Relay {} unreachable, disabled", relay);
        }
    }

    if args.dry_run {
        info!("📝 Dry run: quoting only");
    }
    run(coordinator.clone(), config.global.max_slippage_bps, args.dry_run).await?;

    let snapshot = coordinator.metrics_snapshot();
    log_metrics!(
        "Attempts {} | success {} | failed {} | unprofitable {} | net profit {}",
        snapshot.execution.total_attempts,
        snapshot.execution.successful,
        snapshot.execution.failed,
        snapshot.execution.unprofitable,
        snapshot.execution.total_net_profit
    );
    println!("{}", serde_json::to_string(&snapshot)?);

    Ok(())
}

async fn run(
    coordinator: Arc<ExecutionCoordinator>,
    max_slippage_bps: u32,
    dry_run: bool,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let entry: FeedEntry = match serde_json::from_str(&line) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping malformed opportunity: {}", e);
                continue;
            }
        };
        let id = entry.id().to_string();
        let opportunity = match entry.into_opportunity(max_slippage_bps) {
            Ok(opportunity) => opportunity,
            Err(e) => {
                println!("{}", failure_report(&id, &ExecutionError::from(e)));
                continue;
            }
        };

        if dry_run {
            let report = match coordinator.quote(&opportunity) {
                Ok(quote) => serde_json::to_value(&quote)?,
                Err(e) => failure_report(&opportunity.id, &e),
            };
            println!("{report}");
            continue;
        }

        let coordinator = coordinator.clone();
        in_flight.spawn(async move {
            match coordinator.execute(&opportunity).await {
                Ok(outcome) => serde_json::to_value(&outcome)
                    .unwrap_or_else(|e| json!({ "opportunity_id": opportunity.id, "error": e.to_string() })),
                Err(e) => failure_report(&opportunity.id, &e),
            }
        });
    }

    while let Some(report) = in_flight.join_next().await {
        println!("{}", report.context("Execution task panicked")?);
    }
    Ok(())
}

fn failure_report(opportunity_id: &str, error: &ExecutionError) -> serde_json::Value {
    json!({
        "opportunity_id": opportunity_id,
        "success": false,
        "rejected": error.is_rejection(),
        "error": error.to_string(),
    })
}
