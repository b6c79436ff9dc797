//! Endpoint Queue
//!
//! Wraps every outbound call with two independent per-endpoint limits: a
//! concurrency ceiling (semaphore) and a rate ceiling (sliding window of
//! admissions). Callers that would exceed either limit suspend until capacity
//! frees up or the endpoint timeout elapses.
//!
//! Admission and execution are split. Waiting for capacity happens
//! on the caller's task, so dropping the caller's future removes queued work
//! immediately. Once admitted, the operation runs on a detached task that owns
//! the permit; dropping the caller no longer aborts it, and its outcome is
//! still recorded in the endpoint metrics.

use crate::budget::{EndpointBudget, EndpointConfig, SlidingWindow};
use crate::error::{BoxError, QueueError, Result};
use crate::metrics::EndpointMetrics;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Admission state of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndpointState {
    /// Accepting work
    Active,
    /// New work waits (bounded by the endpoint timeout); in-flight work continues
    Paused,
    /// New work is rejected; in-flight work finishes
    Draining,
}

struct EndpointSlot {
    id: String,
    config: RwLock<EndpointConfig>,
    semaphore: Arc<Semaphore>,
    /// Permits still to retire after a shrink that found them checked out
    shrink_debt: Mutex<usize>,
    window: Mutex<SlidingWindow>,
    state: watch::Sender<EndpointState>,
    in_flight: AtomicUsize,
    idle: Notify,
    metrics: Mutex<EndpointMetrics>,
}

impl EndpointSlot {
    fn new(id: String, config: EndpointConfig) -> Self {
        let (state, _) = watch::channel(EndpointState::Active);
        Self {
            id,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            shrink_debt: Mutex::new(0),
            config: RwLock::new(config),
            window: Mutex::new(SlidingWindow::default()),
            state,
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            metrics: Mutex::new(EndpointMetrics::default()),
        }
    }

    /// Resizes the one semaphore in place. Permits held by in-flight work
    /// count against the new ceiling; a shrink that cannot retire enough idle
    /// permits retires the rest as in-flight work releases them.
    fn reconfigure(&self, config: EndpointConfig) {
        let mut current = self.config.write();
        let (old, new) = (current.max_concurrent, config.max_concurrent);
        let mut debt = self.shrink_debt.lock();
        if new > old {
            let grow = new - old;
            let repaid = grow.min(*debt);
            *debt -= repaid;
            self.semaphore.add_permits(grow - repaid);
        } else if new < old {
            let shrink = old - new;
            let retired = self.semaphore.forget_permits(shrink);
            *debt += shrink - retired;
        }
        drop(debt);
        *current = config;
    }

    /// Return a permit, or retire it if a shrink is still outstanding
    fn release(&self, permit: OwnedSemaphorePermit) {
        let mut debt = self.shrink_debt.lock();
        if *debt > 0 {
            *debt -= 1;
            permit.forget();
        } else {
            drop(permit);
        }
    }

    async fn wait_until_active(&self) -> Result<()> {
        let mut state = self.state.subscribe();
        loop {
            let current = *state.borrow_and_update();
            match current {
                EndpointState::Active => return Ok(()),
                EndpointState::Draining => return Err(QueueError::draining(&self.id)),
                EndpointState::Paused => {}
            }
            if state.changed().await.is_err() {
                return Err(QueueError::draining(&self.id));
            }
        }
    }

    async fn admit(&self) -> Result<OwnedSemaphorePermit> {
        self.wait_until_active().await?;

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| QueueError::draining(&self.id))?;

        loop {
            let (max_per_window, window) = {
                let config = self.config.read();
                (config.max_per_window, config.window)
            };
            let wait = self
                .window
                .lock()
                .try_admit(Instant::now(), max_per_window, window);
            match wait {
                None => break,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }

        if *self.state.borrow() == EndpointState::Draining {
            return Err(QueueError::draining(&self.id));
        }
        Ok(permit)
    }

    fn budget(&self) -> EndpointBudget {
        let config = self.config.read().clone();
        let window_count = self.window.lock().count(Instant::now(), config.window);
        EndpointBudget {
            max_concurrent: config.max_concurrent,
            max_per_window: config.max_per_window,
            window_duration: config.window,
            in_flight: self.in_flight.load(Ordering::SeqCst),
            window_count,
        }
    }
}

/// Tracks one admitted operation. Records a failure if the operation never
/// reports completion (panic or runtime shutdown) and wakes drainers when the
/// endpoint goes idle.
struct InFlightGuard {
    slot: Arc<EndpointSlot>,
    permit: Option<OwnedSemaphorePermit>,
    started: Instant,
    completed: bool,
}

impl InFlightGuard {
    fn new(slot: Arc<EndpointSlot>, permit: OwnedSemaphorePermit) -> Self {
        slot.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            slot,
            permit: Some(permit),
            started: Instant::now(),
            completed: false,
        }
    }

    fn complete(mut self, success: bool) {
        self.slot
            .metrics
            .lock()
            .record_completion(self.started.elapsed(), success);
        self.completed = true;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.slot
                .metrics
                .lock()
                .record_completion(self.started.elapsed(), false);
        }
        if let Some(permit) = self.permit.take() {
            self.slot.release(permit);
        }
        if self.slot.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.slot.idle.notify_waiters();
        }
    }
}

/// Per-endpoint concurrency and rate limiter shared by every outbound caller
pub struct EndpointQueue {
    endpoints: DashMap<String, Arc<EndpointSlot>>,
}

impl EndpointQueue {
    pub fn new() -> Self {
        Self {
            endpoints: DashMap::new(),
        }
    }

    /// Build a queue from static configuration, rejecting invalid limits
    pub fn with_endpoints<I, K>(endpoints: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, EndpointConfig)>,
        K: Into<String>,
    {
        let queue = Self::new();
        for (endpoint, config) in endpoints {
            queue.configure(endpoint, config)?;
        }
        Ok(queue)
    }

    /// Add an endpoint or replace the limits of an existing one
    pub fn configure(&self, endpoint: impl Into<String>, config: EndpointConfig) -> Result<()> {
        let endpoint = endpoint.into();
        config
            .validate()
            .map_err(|message| QueueError::configuration(&endpoint, message))?;

        match self.endpoints.entry(endpoint.clone()) {
            Entry::Occupied(entry) => {
                info!(endpoint = %endpoint, ?config, "Reconfiguring endpoint limits");
                entry.get().reconfigure(config);
            }
            Entry::Vacant(entry) => {
                debug!(endpoint = %endpoint, ?config, "Registering endpoint");
                entry.insert(Arc::new(EndpointSlot::new(endpoint, config)));
            }
        }
        Ok(())
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.endpoints.contains_key(endpoint)
    }

    pub fn endpoints(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.endpoints.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn slot(&self, endpoint: &str) -> Result<Arc<EndpointSlot>> {
        self.endpoints
            .get(endpoint)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or_else(|| QueueError::unknown_endpoint(endpoint))
    }

    /// Run `operation` against `endpoint` once both limits allow it.
    ///
    /// Fails with [`QueueError::Timeout`] if capacity does not free up within
    /// the endpoint timeout. The queue never retries.
    pub async fn submit<T, E, F, Fut>(&self, endpoint: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let slot = self.slot(endpoint)?;
        let timeout = slot.config.read().timeout;
        let wait_started = Instant::now();

        let permit = match tokio::time::timeout(timeout, slot.admit()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                slot.metrics.lock().record_timeout();
                let waited_ms = wait_started.elapsed().as_millis() as u64;
                debug!(endpoint, waited_ms, "Endpoint capacity wait timed out");
                return Err(QueueError::timeout(endpoint, waited_ms));
            }
        };

        let guard = InFlightGuard::new(Arc::clone(&slot), permit);
        let future = operation();
        let handle = tokio::spawn(async move {
            let result = future.await;
            guard.complete(result.is_ok());
            result.map_err(Into::into)
        });

        match handle.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(QueueError::Operation {
                endpoint: endpoint.to_string(),
                source,
            }),
            Err(join_error) => {
                warn!(endpoint, error = %join_error, "Queued operation task aborted");
                Err(QueueError::TaskAborted {
                    endpoint: endpoint.to_string(),
                    message: join_error.to_string(),
                })
            }
        }
    }

    /// Hold new work until [`resume`](Self::resume); in-flight work continues
    pub fn pause(&self, endpoint: &str) -> Result<()> {
        let slot = self.slot(endpoint)?;
        slot.state.send_replace(EndpointState::Paused);
        info!(endpoint, "Endpoint paused");
        Ok(())
    }

    /// Reopen a paused or drained endpoint
    pub fn resume(&self, endpoint: &str) -> Result<()> {
        let slot = self.slot(endpoint)?;
        slot.state.send_replace(EndpointState::Active);
        info!(endpoint, "Endpoint resumed");
        Ok(())
    }

    /// Reject new work and wait up to `wait` for in-flight work to finish
    pub async fn drain(&self, endpoint: &str, wait: Duration) -> Result<()> {
        let slot = self.slot(endpoint)?;
        slot.state.send_replace(EndpointState::Draining);
        info!(
            endpoint,
            in_flight = slot.in_flight.load(Ordering::SeqCst),
            "Draining endpoint"
        );

        let idle = async {
            loop {
                let notified = slot.idle.notified();
                if slot.in_flight.load(Ordering::SeqCst) == 0 {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(wait, idle)
            .await
            .map_err(|_| QueueError::timeout(endpoint, wait.as_millis() as u64))
    }

    pub fn state(&self, endpoint: &str) -> Result<EndpointState> {
        Ok(*self.slot(endpoint)?.state.borrow())
    }

    pub fn budget(&self, endpoint: &str) -> Result<EndpointBudget> {
        Ok(self.slot(endpoint)?.budget())
    }

    pub fn metrics(&self, endpoint: &str) -> Result<EndpointMetrics> {
        Ok(self.slot(endpoint)?.metrics.lock().clone())
    }

    /// Metrics for every endpoint, polled by observability collaborators
    pub fn metrics_snapshot(&self) -> HashMap<String, EndpointMetrics> {
        self.endpoints
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().metrics.lock().clone()))
            .collect()
    }

    pub fn reset_metrics(&self, endpoint: &str) -> Result<()> {
        *self.slot(endpoint)?.metrics.lock() = EndpointMetrics::default();
        Ok(())
    }
}

impl Default for EndpointQueue {
    fn default() -> Self {
        Self::new()
    }
}
