//! Endpoint limits and rolling admission window

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Static limits for one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Maximum simultaneously in-flight operations
    pub max_concurrent: usize,
    /// Maximum admissions within any rolling `window`
    pub max_per_window: u32,
    /// Length of the rolling window
    pub window: Duration,
    /// Maximum time a caller waits for capacity
    pub timeout: Duration,
}

impl EndpointConfig {
    pub fn new(max_concurrent: usize, max_per_window: u32, window: Duration, timeout: Duration) -> Self {
        Self {
            max_concurrent,
            max_per_window,
            window,
            timeout,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be positive".to_string());
        }
        if self.max_per_window == 0 {
            return Err("max_per_window must be positive".to_string());
        }
        if self.window.is_zero() {
            return Err("window must be non-zero".to_string());
        }
        Ok(())
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            max_per_window: 50,
            window: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Point-in-time view of an endpoint's rate-limit state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointBudget {
    pub max_concurrent: usize,
    pub max_per_window: u32,
    pub window_duration: Duration,
    pub in_flight: usize,
    pub window_count: usize,
}

/// Sliding log of admission instants. Holds at most `max_per_window` entries.
#[derive(Debug, Default)]
pub(crate) struct SlidingWindow {
    admissions: VecDeque<Instant>,
}

impl SlidingWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.admissions.front() {
            if now.duration_since(*oldest) >= window {
                self.admissions.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record an admission at `now` if the window has room, otherwise return
    /// how long until the oldest admission leaves the window.
    pub(crate) fn try_admit(
        &mut self,
        now: Instant,
        max_per_window: u32,
        window: Duration,
    ) -> Option<Duration> {
        self.prune(now, window);
        if self.admissions.len() < max_per_window as usize {
            self.admissions.push_back(now);
            return None;
        }
        let oldest = *self.admissions.front()?;
        Some((oldest + window).saturating_duration_since(now))
    }

    pub(crate) fn count(&mut self, now: Instant, window: Duration) -> usize {
        self.prune(now, window);
        self.admissions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_admits_up_to_limit() {
        let mut window = SlidingWindow::default();
        let start = Instant::now();
        let span = Duration::from_millis(100);

        assert!(window.try_admit(start, 2, span).is_none());
        assert!(window.try_admit(start, 2, span).is_none());

        let wait = window.try_admit(start + Duration::from_millis(40), 2, span);
        assert_eq!(wait, Some(Duration::from_millis(60)));
        assert_eq!(window.count(start + Duration::from_millis(40), span), 2);
    }

    #[test]
    fn test_window_rolls_over() {
        let mut window = SlidingWindow::default();
        let start = Instant::now();
        let span = Duration::from_millis(100);

        assert!(window.try_admit(start, 1, span).is_none());
        assert!(window.try_admit(start + span, 1, span).is_none());
        assert_eq!(window.count(start + span, span), 1);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = EndpointConfig::default();
        assert!(config.validate().is_ok());
        config.max_per_window = 0;
        assert!(config.validate().is_err());
    }
}
