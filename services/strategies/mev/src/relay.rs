//! Relay registry
//!
//! Static set of delivery channels loaded at startup. Relays are never
//! removed at runtime; health checks only toggle `enabled`. Statistics live
//! behind a per-relay lock so concurrent fast-mode attempts on different
//! relays never contend.

use crate::error::SubmissionError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;
use types::PrivacyLevel;

/// Delivery channel family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayKind {
    PublicBroadcast,
    PrivateRelayBasic,
    PrivateRelayEnhanced,
    BuilderDirect,
}

impl RelayKind {
    pub fn default_privacy(self) -> PrivacyLevel {
        match self {
            RelayKind::PublicBroadcast => PrivacyLevel::Public,
            RelayKind::PrivateRelayBasic => PrivacyLevel::Basic,
            RelayKind::PrivateRelayEnhanced => PrivacyLevel::Enhanced,
            RelayKind::BuilderDirect => PrivacyLevel::Maximum,
        }
    }

    /// Public broadcast cannot guarantee all-or-nothing inclusion
    pub fn supports_bundles(self) -> bool {
        !matches!(self, RelayKind::PublicBroadcast)
    }
}

fn default_enabled() -> bool {
    true
}

/// One configured delivery channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTarget {
    pub name: String,
    pub kind: RelayKind,
    /// Endpoint queue id every call to this relay is admitted through
    pub endpoint: String,
    pub url: String,
    #[serde(default, skip_serializing)]
    pub auth_credential: Option<String>,
    /// Lower is tried first
    pub priority: u32,
    /// Overrides the kind's default guarantee
    #[serde(default)]
    pub privacy_level: Option<PrivacyLevel>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl RelayTarget {
    pub fn new(
        name: impl Into<String>,
        kind: RelayKind,
        endpoint: impl Into<String>,
        url: impl Into<String>,
        priority: u32,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            endpoint: endpoint.into(),
            url: url.into(),
            auth_credential: None,
            priority,
            privacy_level: None,
            enabled: true,
        }
    }

    pub fn with_auth(mut self, credential: impl Into<String>) -> Self {
        self.auth_credential = Some(credential.into());
        self
    }

    pub fn with_privacy(mut self, level: PrivacyLevel) -> Self {
        self.privacy_level = Some(level);
        self
    }

    pub fn privacy(&self) -> PrivacyLevel {
        self.privacy_level
            .unwrap_or_else(|| self.kind.default_privacy())
    }
}

/// Rolling per-relay submission statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelayStats {
    pub total_submissions: u64,
    pub successful_inclusions: u64,
    pub failed_submissions: u64,
    /// Mean send-to-inclusion latency over successful inclusions
    pub average_inclusion_latency: Duration,
}

impl RelayStats {
    fn record(&mut self, included: bool, latency: Duration) {
        self.total_submissions += 1;
        if included {
            self.successful_inclusions += 1;
            let n = u128::from(self.successful_inclusions);
            let total = self.average_inclusion_latency.as_nanos() * (n - 1) + latency.as_nanos();
            self.average_inclusion_latency = Duration::from_nanos((total / n) as u64);
        } else {
            self.failed_submissions += 1;
        }
    }

    pub fn inclusion_rate(&self) -> f64 {
        if self.total_submissions == 0 {
            0.0
        } else {
            self.successful_inclusions as f64 / self.total_submissions as f64
        }
    }
}

struct RelayEntry {
    target: RelayTarget,
    enabled: AtomicBool,
    stats: Mutex<RelayStats>,
}

/// Candidate relays for one submission, in attempt order
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    /// Relays meeting the requested privacy level
    pub adequate: Vec<RelayTarget>,
    /// Weaker relays, populated only when public fallback is allowed
    pub fallback: Vec<RelayTarget>,
}

impl Candidates {
    pub fn is_empty(&self) -> bool {
        self.adequate.is_empty() && self.fallback.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adequate.len() + self.fallback.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelayTarget> {
        self.adequate.iter().chain(self.fallback.iter())
    }
}

pub struct RelayRegistry {
    relays: Vec<RelayEntry>,
    index: HashMap<String, usize>,
}

impl RelayRegistry {
    pub fn new(targets: Vec<RelayTarget>) -> Result<Self, SubmissionError> {
        if targets.is_empty() {
            return Err(SubmissionError::configuration(
                "at least one relay must be configured",
            ));
        }

        let mut index = HashMap::with_capacity(targets.len());
        let mut relays = Vec::with_capacity(targets.len());
        for (position, target) in targets.into_iter().enumerate() {
            if index.insert(target.name.clone(), position).is_some() {
                return Err(SubmissionError::configuration(format!(
                    "duplicate relay name {}",
                    target.name
                )));
            }
            relays.push(RelayEntry {
                enabled: AtomicBool::new(target.enabled),
                target,
                stats: Mutex::new(RelayStats::default()),
            });
        }

        Ok(Self { relays, index })
    }

    fn entry(&self, name: &str) -> Result<&RelayEntry, SubmissionError> {
        self.index
            .get(name)
            .map(|&position| &self.relays[position])
            .ok_or_else(|| SubmissionError::UnknownRelay {
                relay: name.to_string(),
            })
    }

    /// Static configuration of a relay, with the current `enabled` flag
    pub fn get(&self, name: &str) -> Option<RelayTarget> {
        self.entry(name).ok().map(|entry| {
            let mut target = entry.target.clone();
            target.enabled = entry.enabled.load(Ordering::SeqCst);
            target
        })
    }

    pub fn targets(&self) -> Vec<RelayTarget> {
        self.relays
            .iter()
            .filter_map(|entry| self.get(&entry.target.name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    /// Enabled relays able to carry a submission at `privacy_level`.
    ///
    /// Each group is ordered by priority ascending, then higher historical
    /// inclusion rate, then name.
    pub fn candidates(
        &self,
        privacy_level: PrivacyLevel,
        allow_public_fallback: bool,
        bundles_only: bool,
    ) -> Candidates {
        let mut adequate = Vec::new();
        let mut fallback = Vec::new();

        for entry in &self.relays {
            if !entry.enabled.load(Ordering::SeqCst) {
                continue;
            }
            if bundles_only && !entry.target.kind.supports_bundles() {
                continue;
            }
            let rate = entry.stats.lock().inclusion_rate();
            if entry.target.privacy().satisfies(privacy_level) {
                adequate.push((entry.target.clone(), rate));
            } else if allow_public_fallback {
                fallback.push((entry.target.clone(), rate));
            }
        }

        Candidates {
            adequate: Self::order(adequate),
            fallback: Self::order(fallback),
        }
    }

    fn order(mut ranked: Vec<(RelayTarget, f64)>) -> Vec<RelayTarget> {
        ranked.sort_by(|(a, rate_a), (b, rate_b)| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| rate_b.partial_cmp(rate_a).unwrap_or(CmpOrdering::Equal))
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked.into_iter().map(|(target, _)| target).collect()
    }

    pub fn record_attempt(
        &self,
        name: &str,
        included: bool,
        latency: Duration,
    ) -> Result<(), SubmissionError> {
        self.entry(name)?.stats.lock().record(included, latency);
        Ok(())
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<bool, SubmissionError> {
        let previous = self.entry(name)?.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(relay = name, enabled, "Relay availability changed");
        }
        Ok(previous)
    }

    pub fn is_enabled(&self, name: &str) -> Result<bool, SubmissionError> {
        Ok(self.entry(name)?.enabled.load(Ordering::SeqCst))
    }

    pub fn stats(&self, name: &str) -> Result<RelayStats, SubmissionError> {
        Ok(self.entry(name)?.stats.lock().clone())
    }

    pub fn stats_snapshot(&self) -> HashMap<String, RelayStats> {
        self.relays
            .iter()
            .map(|entry| (entry.target.name.clone(), entry.stats.lock().clone()))
            .collect()
    }

    /// Operator action; statistics are otherwise never cleared
    pub fn reset_stats(&self, name: &str) -> Result<(), SubmissionError> {
        *self.entry(name)?.stats.lock() = RelayStats::default();
        info!(relay = name, "Relay statistics reset");
        Ok(())
    }
}
