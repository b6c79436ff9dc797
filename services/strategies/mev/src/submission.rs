//! Submission manager
//!
//! Delivers a signed transaction or bundle through the relay registry with
//! fallback. Every relay call is admitted through the shared endpoint queue,
//! and every attempt updates the statistics of the relay it used.
//!
//! ```text
//! Building → Submitting(relay) → {Included | Rejected | TimedOut}
//!                                        ↓ (not included)
//!                                  next candidate → … → Exhausted
//! ```

use crate::bundle::Bundle;
use crate::error::{RelayError, SubmissionError};
use crate::relay::{RelayRegistry, RelayStats, RelayTarget};
use crate::transport::RelayTransport;
use futures::stream::{FuturesUnordered, StreamExt};
use network::{EndpointQueue, QueueError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use types::{PrivacyLevel, SignedTransaction};

/// Upper bound on a single health-check round trip
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-submission delivery options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOptions {
    pub privacy_level: PrivacyLevel,
    /// Try relays weaker than `privacy_level` after every adequate one failed
    pub allow_public_fallback: bool,
    /// Race all adequate relays at once (only honoured up to `Basic` privacy)
    pub fast_mode: bool,
    /// Blocks to wait for inclusion on each attempt
    pub max_block_wait: u64,
}

impl Default for SubmissionOptions {
    fn default() -> Self {
        Self {
            privacy_level: PrivacyLevel::Basic,
            allow_public_fallback: false,
            fast_mode: false,
            max_block_wait: 3,
        }
    }
}

/// What is being delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPayload {
    Transaction(SignedTransaction),
    Bundle(Bundle),
}

impl SubmissionPayload {
    pub fn id(&self) -> String {
        match self {
            SubmissionPayload::Transaction(tx) => tx.hash().to_string(),
            SubmissionPayload::Bundle(bundle) => bundle.id(),
        }
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, SubmissionPayload::Bundle(_))
    }

    fn hashes(&self) -> Vec<String> {
        match self {
            SubmissionPayload::Transaction(tx) => vec![tx.hash().to_string()],
            SubmissionPayload::Bundle(bundle) => bundle.hashes(),
        }
    }
}

/// Outcome of a delivery that reached inclusion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResult {
    pub relay_used: String,
    pub transaction_or_bundle_id: String,
    pub included: bool,
    pub block_number: Option<u64>,
    pub latency: Duration,
    /// Every relay attempted, in attempt order
    pub fallback_chain_followed: Vec<String>,
}

/// Push notification for observability collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SubmissionEvent {
    AttemptStarted {
        relay: String,
        payload_id: String,
    },
    AttemptFinished {
        relay: String,
        payload_id: String,
        included: bool,
        block_number: Option<u64>,
        error: Option<String>,
    },
    Exhausted {
        payload_id: String,
        chain: Vec<String>,
    },
}

struct Inclusion {
    relay: String,
    tracking_id: String,
    block_number: u64,
}

#[derive(Clone)]
pub struct SubmissionManager {
    registry: Arc<RelayRegistry>,
    queue: Arc<EndpointQueue>,
    transport: Arc<dyn RelayTransport>,
    block_time: Duration,
    health_timeout: Duration,
    events: Option<mpsc::Sender<SubmissionEvent>>,
}

impl SubmissionManager {
    /// Fails if any relay references an endpoint the queue does not know
    pub fn new(
        registry: Arc<RelayRegistry>,
        queue: Arc<EndpointQueue>,
        transport: Arc<dyn RelayTransport>,
        block_time: Duration,
    ) -> Result<Self, SubmissionError> {
        for target in registry.targets() {
            if !queue.contains(&target.endpoint) {
                return Err(SubmissionError::configuration(format!(
                    "relay {} references unknown endpoint {}",
                    target.name, target.endpoint
                )));
            }
        }

        Ok(Self {
            registry,
            queue,
            transport,
            block_time,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            events: None,
        })
    }

    /// Publish [`SubmissionEvent`]s on a bounded channel
    pub fn with_events(mut self, events: mpsc::Sender<SubmissionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<RelayRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<EndpointQueue> {
        &self.queue
    }

    pub fn relay_stats(&self) -> HashMap<String, RelayStats> {
        self.registry.stats_snapshot()
    }

    pub async fn submit(
        &self,
        tx: SignedTransaction,
        options: SubmissionOptions,
    ) -> Result<SubmissionResult, SubmissionError> {
        self.submit_payload(SubmissionPayload::Transaction(tx), options)
            .await
    }

    /// Same ordering and fallback rules as [`submit`](Self::submit); the bundle
    /// is included as a whole or reported as not included.
    pub async fn submit_bundle(
        &self,
        bundle: Bundle,
        options: SubmissionOptions,
    ) -> Result<SubmissionResult, SubmissionError> {
        self.submit_payload(SubmissionPayload::Bundle(bundle), options)
            .await
    }

    pub async fn submit_payload(
        &self,
        payload: SubmissionPayload,
        options: SubmissionOptions,
    ) -> Result<SubmissionResult, SubmissionError> {
        let started = Instant::now();
        let candidates = self.registry.candidates(
            options.privacy_level,
            options.allow_public_fallback,
            payload.is_bundle(),
        );
        if candidates.is_empty() {
            return Err(SubmissionError::NoCandidates {
                privacy_level: options.privacy_level,
            });
        }

        let payload = Arc::new(payload);
        let payload_id = payload.id();
        let blocks = u32::try_from(options.max_block_wait.max(1)).unwrap_or(u32::MAX);
        let max_wait = self.block_time.saturating_mul(blocks);
        let mut chain = Vec::with_capacity(candidates.len());
        let mut last_error = None;

        let sequential = if options.fast_mode && options.privacy_level <= PrivacyLevel::Basic {
            match self
                .race(&candidates.adequate, &payload, max_wait, &mut chain)
                .await
            {
                Ok(inclusion) => return Ok(self.finish(inclusion, chain, started)),
                Err(error) => last_error = error,
            }
            candidates.fallback
        } else {
            if options.fast_mode {
                warn!(
                    privacy = %options.privacy_level,
                    "Fast mode requested above basic privacy, submitting sequentially"
                );
            }
            let mut ordered = candidates.adequate;
            ordered.extend(candidates.fallback);
            ordered
        };

        for relay in &sequential {
            chain.push(relay.name.clone());
            match self.attempt(relay.clone(), Arc::clone(&payload), max_wait).await {
                Ok(inclusion) => return Ok(self.finish(inclusion, chain, started)),
                Err(error) => {
                    warn!(relay = %relay.name, payload = %payload_id, %error, "Relay attempt failed, advancing");
                    last_error = Some(error);
                }
            }
        }

        warn!(payload = %payload_id, chain = ?chain, "All relays exhausted");
        self.emit(SubmissionEvent::Exhausted {
            payload_id,
            chain: chain.clone(),
        });
        Err(SubmissionError::AllRelaysExhausted { chain, last_error })
    }

    /// Concurrent round over `relays`; first inclusion wins. Losing attempts
    /// keep running on their own tasks and still record their statistics.
    async fn race(
        &self,
        relays: &[RelayTarget],
        payload: &Arc<SubmissionPayload>,
        max_wait: Duration,
        chain: &mut Vec<String>,
    ) -> Result<Inclusion, Option<String>> {
        let mut in_flight: FuturesUnordered<_> = relays
            .iter()
            .map(|relay| {
                chain.push(relay.name.clone());
                let manager = self.clone();
                let relay = relay.clone();
                let payload = Arc::clone(payload);
                tokio::spawn(async move { manager.attempt(relay, payload, max_wait).await })
            })
            .collect();

        let mut last_error = None;
        while let Some(joined) = in_flight.next().await {
            match joined {
                Ok(Ok(inclusion)) => {
                    debug!(relay = %inclusion.relay, superseded = in_flight.len(), "Fast-mode winner");
                    return Ok(inclusion);
                }
                Ok(Err(error)) => last_error = Some(error),
                Err(join_error) => last_error = Some(join_error.to_string()),
            }
        }
        Err(last_error)
    }

    /// One relay attempt: a single queued operation covering send and the
    /// bounded inclusion wait.
    async fn attempt(
        &self,
        relay: RelayTarget,
        payload: Arc<SubmissionPayload>,
        max_wait: Duration,
    ) -> Result<Inclusion, String> {
        let payload_id = payload.id();
        self.emit(SubmissionEvent::AttemptStarted {
            relay: relay.name.clone(),
            payload_id: payload_id.clone(),
        });

        let transport = Arc::clone(&self.transport);
        let registry = Arc::clone(&self.registry);
        let target = relay.clone();
        let result = self
            .queue
            .submit(&relay.endpoint, move || async move {
                let sent_at = Instant::now();
                let outcome = deliver(transport.as_ref(), &target, &payload, max_wait).await;
                let included = matches!(outcome, Ok((_, Some(_))));
                // Stats update lives inside the queued operation so superseded
                // attempts are still recorded.
                let _ = registry.record_attempt(&target.name, included, sent_at.elapsed());
                outcome
            })
            .await;

        let outcome = match result {
            Ok((tracking_id, Some(block_number))) => Ok(Inclusion {
                relay: relay.name.clone(),
                tracking_id,
                block_number,
            }),
            Ok((_, None)) => Err(format!(
                "not included within {}ms",
                max_wait.as_millis()
            )),
            Err(QueueError::Operation { source, .. }) => Err(source.to_string()),
            Err(other) => {
                // Never reached the relay; still counts as a failed attempt
                if !matches!(other, QueueError::TaskAborted { .. }) {
                    let _ = self
                        .registry
                        .record_attempt(&relay.name, false, Duration::ZERO);
                }
                Err(other.to_string())
            }
        };

        self.emit(SubmissionEvent::AttemptFinished {
            relay: relay.name.clone(),
            payload_id,
            included: outcome.is_ok(),
            block_number: outcome.as_ref().ok().map(|i| i.block_number),
            error: outcome.as_ref().err().cloned(),
        });
        outcome
    }

    fn finish(&self, inclusion: Inclusion, chain: Vec<String>, started: Instant) -> SubmissionResult {
        info!(
            relay = %inclusion.relay,
            id = %inclusion.tracking_id,
            block = inclusion.block_number,
            attempts = chain.len(),
            "Submission included"
        );
        SubmissionResult {
            relay_used: inclusion.relay,
            transaction_or_bundle_id: inclusion.tracking_id,
            included: true,
            block_number: Some(inclusion.block_number),
            latency: started.elapsed(),
            fallback_chain_followed: chain,
        }
    }

    fn emit(&self, event: SubmissionEvent) {
        if let Some(events) = &self.events {
            match events.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(event)) => {
                    warn!(?event, "Submission event channel full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Submission event receiver closed");
                }
            }
        }
    }

    /// Round trip to `relay` through the endpoint queue
    pub async fn check_health(&self, relay: &str) -> Result<bool, SubmissionError> {
        let target = self
            .registry
            .get(relay)
            .ok_or_else(|| SubmissionError::UnknownRelay {
                relay: relay.to_string(),
            })?;
        let endpoint = target.endpoint.clone();
        let transport = Arc::clone(&self.transport);
        let timeout = self.health_timeout;

        let reachable = self
            .queue
            .submit(&endpoint, move || async move {
                match tokio::time::timeout(timeout, transport.ping(&target)).await {
                    Ok(result) => result,
                    Err(_) => Err(RelayError::malformed(&target.name, "health check timed out")),
                }
            })
            .await;

        if let Err(error) = &reachable {
            debug!(relay, %error, "Health check failed");
        }
        Ok(reachable.is_ok())
    }

    /// Check every relay and set `enabled` to the observed reachability
    pub async fn check_all_health(&self) -> HashMap<String, bool> {
        let targets = self.registry.targets();
        let checks = targets.iter().map(|target| async move {
            let reachable = self.check_health(&target.name).await.unwrap_or(false);
            (target.name.clone(), reachable)
        });
        let report: HashMap<String, bool> = futures::future::join_all(checks)
            .await
            .into_iter()
            .collect();

        for (name, reachable) in &report {
            let _ = self.registry.set_enabled(name, *reachable);
        }
        report
    }
}

/// Send the payload and wait for inclusion. Returns the relay's tracking id and
/// the inclusion block, if any.
async fn deliver(
    transport: &dyn RelayTransport,
    relay: &RelayTarget,
    payload: &SubmissionPayload,
    max_wait: Duration,
) -> Result<(String, Option<u64>), RelayError> {
    let tracking_id = match payload {
        SubmissionPayload::Transaction(tx) => transport.send_transaction(relay, tx).await?,
        SubmissionPayload::Bundle(bundle) => transport.send_bundle(relay, bundle).await?,
    };
    let block = transport
        .await_inclusion(relay, &payload.hashes(), max_wait)
        .await?;
    Ok((tracking_id, block))
}
