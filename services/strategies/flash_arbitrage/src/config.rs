//! # Engine Configuration - Static Startup Parameters
//!
//! ## Purpose
//!
//! Single source of truth for everything the engine needs at startup:
//! per-endpoint limits, relay list, flash-loan source catalog, privacy policy
//! and global profitability knobs. Loaded from TOML, optionally overridden
//! from `ARBITRAGE_*` environment variables, and validated before any
//! component is constructed. Misconfiguration is fatal.
//!
//! ## Layout
//!
//! ```toml
//! [global]
//! min_profit_margin = "1.0"
//! hybrid_threshold_amount = "1000000"
//!
//! [[endpoints]]
//! id = "flashbots"
//! max_concurrent = 4
//! max_per_window = 10
//! window_ms = 1000
//! timeout_ms = 2000
//!
//! [[relays]]
//! name = "flashbots"
//! kind = "private_relay_basic"
//! endpoint = "flashbots"
//! url = "https://relay.flashbots.net"
//! priority = 1
//!
//! [[sources]]
//! kind = "balancer"
//! fee_bps = 0
//!
//! [privacy]
//! enhanced_threshold = "100"
//! ```

use crate::coordinator::{CoordinatorSettings, ExecutionCoordinator};
use crate::selector::{SelectionError, SourceSelector};
use crate::signer::TransactionSigner;
use crate::sources::{FlashLoanSource, SourceCatalog, SourceEntry, SupportRule};
use anyhow::Context;
use mev::{
    PrivacyPolicy, PrivacyPolicyConfig, RelayKind, RelayRegistry, RelayTarget, RelayTransport,
    SubmissionError, SubmissionEvent, SubmissionManager,
};
use network::{EndpointConfig, EndpointQueue, QueueError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use types::BPS_DENOMINATOR;

/// Startup misconfiguration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("At least one relay must be configured")]
    NoRelays,

    #[error("Source catalog is empty")]
    EmptyCatalog,

    #[error("{owner} references unknown endpoint {endpoint}")]
    UnknownEndpoint { owner: String, endpoint: String },

    #[error("Duplicate {kind} {name}")]
    Duplicate { kind: &'static str, name: String },

    #[error("Invalid {field}: {message}")]
    Invalid { field: String, message: String },

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub endpoints: Vec<EndpointEntry>,
    #[serde(default)]
    pub relays: Vec<RelayTarget>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub privacy: PrivacyPolicyConfig,
    #[serde(default)]
    pub signer: SignerConfig,
}

/// Global profitability and timing knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Minimum net profit, in borrow-asset units
    pub min_profit_margin: Decimal,
    /// Hybrid loans are considered strictly above this amount
    pub hybrid_threshold_amount: Decimal,
    /// Slippage tolerance used when building paths from quotes
    pub max_slippage_bps: u32,
    pub block_time_ms: u64,
    /// Signed plans expire after this many seconds
    pub deadline_secs: u64,
    pub request_timeout_ms: u64,
    pub inclusion_poll_ms: u64,
    pub health_timeout_ms: u64,
    /// Capacity of the submission event channel; 0 disables events
    pub event_channel_capacity: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            min_profit_margin: dec!(0),
            hybrid_threshold_amount: dec!(1000000),
            max_slippage_bps: 50, // 0.5%
            block_time_ms: 12_000,
            deadline_secs: 300,
            request_timeout_ms: 5_000,
            inclusion_poll_ms: 1_000,
            health_timeout_ms: 2_000,
            event_channel_capacity: 256,
        }
    }
}

/// Limits for one outbound endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointEntry {
    pub id: String,
    pub max_concurrent: usize,
    pub max_per_window: u32,
    pub window_ms: u64,
    pub timeout_ms: u64,
}

impl EndpointEntry {
    pub fn to_config(&self) -> EndpointConfig {
        EndpointConfig::new(
            self.max_concurrent,
            self.max_per_window,
            Duration::from_millis(self.window_ms),
            Duration::from_millis(self.timeout_ms),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Balancer,
    Dydx,
    Aave,
    UniswapV3Pool,
}

/// One catalog entry as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub fee_bps: u32,
    #[serde(default)]
    pub pool_id: Option<String>,
    #[serde(default)]
    pub reliability_rank: Option<u32>,
    #[serde(default)]
    pub support: SupportRule,
}

impl SourceConfig {
    pub fn to_entry(&self) -> Result<SourceEntry, ConfigError> {
        if self.fee_bps > BPS_DENOMINATOR {
            return Err(ConfigError::invalid(
                "sources.fee_bps",
                format!("{} exceeds {BPS_DENOMINATOR}", self.fee_bps),
            ));
        }

        let fee_bps = self.fee_bps;
        let source = match self.kind {
            SourceKind::Balancer => FlashLoanSource::Balancer { fee_bps },
            SourceKind::Dydx => FlashLoanSource::DyDx { fee_bps },
            SourceKind::Aave => FlashLoanSource::Aave { fee_bps },
            SourceKind::UniswapV3Pool => FlashLoanSource::UniswapV3Pool {
                pool_id: self.pool_id.clone().ok_or_else(|| {
                    ConfigError::invalid("sources.pool_id", "required for uniswap_v3_pool")
                })?,
                fee_bps,
            },
        };

        let entry = SourceEntry::new(source, self.support.clone());
        Ok(match self.reliability_rank {
            Some(rank) => entry.with_rank(rank),
            None => entry,
        })
    }
}

/// External signing service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    pub url: String,
    /// Endpoint queue id signing calls are admitted through
    pub endpoint: String,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8645/sign".to_string(),
            endpoint: "signer".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            endpoints: vec![
                EndpointEntry {
                    id: "flashbots".to_string(),
                    max_concurrent: 4,
                    max_per_window: 10,
                    window_ms: 1_000,
                    timeout_ms: 2_000,
                },
                EndpointEntry {
                    id: "signer".to_string(),
                    max_concurrent: 8,
                    max_per_window: 100,
                    window_ms: 1_000,
                    timeout_ms: 1_000,
                },
            ],
            relays: vec![RelayTarget::new(
                "flashbots",
                RelayKind::PrivateRelayBasic,
                "flashbots",
                "https://relay.flashbots.net",
                1,
            )],
            sources: vec![
                SourceConfig {
                    kind: SourceKind::Balancer,
                    fee_bps: 0,
                    pool_id: None,
                    reliability_rank: None,
                    support: SupportRule::any(),
                },
                SourceConfig {
                    kind: SourceKind::Aave,
                    fee_bps: 9, // 0.09%
                    pool_id: None,
                    reliability_rank: None,
                    support: SupportRule::any(),
                },
            ],
            privacy: PrivacyPolicyConfig::default(),
            signer: SignerConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_parse::<Decimal>("ARBITRAGE_MIN_PROFIT_MARGIN") {
            self.global.min_profit_margin = value;
        }
        if let Some(value) = env_parse::<Decimal>("ARBITRAGE_HYBRID_THRESHOLD") {
            self.global.hybrid_threshold_amount = value;
        }
        if let Some(value) = env_parse::<u32>("ARBITRAGE_MAX_SLIPPAGE_BPS") {
            self.global.max_slippage_bps = value;
        }
        if let Some(value) = env_parse::<u64>("ARBITRAGE_BLOCK_TIME_MS") {
            self.global.block_time_ms = value;
        }
        if let Ok(url) = std::env::var("ARBITRAGE_SIGNER_URL") {
            self.signer.url = url;
        }
        if let Ok(fast_mode) = std::env::var("ARBITRAGE_FAST_MODE") {
            self.privacy.fast_mode = fast_mode.to_lowercase() == "true";
        }
        if let Ok(fallback) = std::env::var("ARBITRAGE_ALLOW_PUBLIC_FALLBACK") {
            self.privacy.allow_public_fallback = fallback.to_lowercase() == "true";
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global.min_profit_margin < Decimal::ZERO {
            return Err(ConfigError::invalid(
                "global.min_profit_margin",
                "must be non-negative",
            ));
        }
        if self.global.hybrid_threshold_amount < Decimal::ZERO {
            return Err(ConfigError::invalid(
                "global.hybrid_threshold_amount",
                "must be non-negative",
            ));
        }
        if self.global.max_slippage_bps > BPS_DENOMINATOR {
            return Err(ConfigError::invalid(
                "global.max_slippage_bps",
                format!("must be <= {BPS_DENOMINATOR}"),
            ));
        }
        if self.global.block_time_ms == 0 {
            return Err(ConfigError::invalid("global.block_time_ms", "must be positive"));
        }

        let mut endpoint_ids = HashSet::new();
        for endpoint in &self.endpoints {
            if !endpoint_ids.insert(endpoint.id.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "endpoint",
                    name: endpoint.id.clone(),
                });
            }
            endpoint
                .to_config()
                .validate()
                .map_err(|message| ConfigError::invalid(format!("endpoints.{}", endpoint.id), message))?;
        }

        if self.relays.is_empty() {
            return Err(ConfigError::NoRelays);
        }
        let mut relay_names = HashSet::new();
        for relay in &self.relays {
            if !relay_names.insert(relay.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "relay",
                    name: relay.name.clone(),
                });
            }
            if !endpoint_ids.contains(relay.endpoint.as_str()) {
                return Err(ConfigError::UnknownEndpoint {
                    owner: format!("relay {}", relay.name),
                    endpoint: relay.endpoint.clone(),
                });
            }
        }
        if !endpoint_ids.contains(self.signer.endpoint.as_str()) {
            return Err(ConfigError::UnknownEndpoint {
                owner: "signer".to_string(),
                endpoint: self.signer.endpoint.clone(),
            });
        }

        if self.sources.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        for source in &self.sources {
            source.to_entry()?;
        }

        self.privacy
            .validate()
            .map_err(|message| ConfigError::invalid("privacy", message))?;

        Ok(())
    }

    pub fn build_queue(&self) -> Result<EndpointQueue, ConfigError> {
        let queue = EndpointQueue::with_endpoints(
            self.endpoints
                .iter()
                .map(|endpoint| (endpoint.id.clone(), endpoint.to_config())),
        )?;
        Ok(queue)
    }

    pub fn build_catalog(&self) -> Result<SourceCatalog, ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        let entries = self
            .sources
            .iter()
            .map(SourceConfig::to_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SourceCatalog::new(entries, self.global.hybrid_threshold_amount)?)
    }

    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.global.block_time_ms)
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            min_profit_margin: self.global.min_profit_margin,
            deadline: Duration::from_secs(self.global.deadline_secs),
        }
    }

    /// Assemble the engine around a shared queue and injected collaborators
    pub fn build_coordinator(
        &self,
        queue: Arc<EndpointQueue>,
        transport: Arc<dyn RelayTransport>,
        signer: Arc<dyn TransactionSigner>,
        events: Option<mpsc::Sender<SubmissionEvent>>,
    ) -> Result<ExecutionCoordinator, ConfigError> {
        self.validate()?;

        let registry = Arc::new(RelayRegistry::new(self.relays.clone())?);
        let mut submission = SubmissionManager::new(registry, queue, transport, self.block_time())?
            .with_health_timeout(Duration::from_millis(self.global.health_timeout_ms));
        if let Some(events) = events {
            submission = submission.with_events(events);
        }

        let selector = SourceSelector::new(Arc::new(self.build_catalog()?));
        Ok(ExecutionCoordinator::new(
            selector,
            submission,
            signer,
            PrivacyPolicy::new(self.privacy.clone()),
            self.coordinator_settings(),
        ))
    }
}
