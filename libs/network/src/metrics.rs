//! Per-endpoint operation metrics
//!
//! Counters plus an exponentially-weighted latency average. Each endpoint owns
//! its own tracker behind its own lock, so recording on one endpoint never
//! contends with another.

use serde::Serialize;
use std::time::Duration;

/// Smoothing factor for the latency average
pub const LATENCY_EWMA_ALPHA: f64 = 0.2;

/// Snapshot of one endpoint's metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndpointMetrics {
    /// Operations that ran or timed out waiting
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub timeout: u64,
    /// EWMA of operation latency in microseconds (executed operations only)
    pub avg_latency_us: f64,
}

impl EndpointMetrics {
    pub(crate) fn record_completion(&mut self, latency: Duration, success: bool) {
        self.total += 1;
        if success {
            self.success += 1;
        } else {
            self.failure += 1;
        }

        let sample = latency.as_secs_f64() * 1_000_000.0;
        let executed = self.success + self.failure;
        self.avg_latency_us = if executed == 1 {
            sample
        } else {
            LATENCY_EWMA_ALPHA * sample + (1.0 - LATENCY_EWMA_ALPHA) * self.avg_latency_us
        };
    }

    pub(crate) fn record_timeout(&mut self) {
        self.total += 1;
        self.timeout += 1;
    }

    pub fn avg_latency(&self) -> Duration {
        Duration::from_secs_f64(self.avg_latency_us / 1_000_000.0)
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64
        }
    }
}
