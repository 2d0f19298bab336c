//! # Bounded Forwarder
//! Best-effort side channel copying raw call records to a secondary store.
//!
//! - At most `max_in_flight` store requests are outstanding at once; a
//!   semaphore permit is held for the lifetime of each request.
//! - `submit` waits for a free permit when at capacity (blocking
//!   backpressure), then spawns the request and returns.
//! - Each request runs under `timeout`. Timeouts and failures are counted,
//!   logged and dropped. No retries.
//! - Completions arrive in whatever order the store answers.

pub mod store;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::record::CallEvent;

pub use store::{NullStore, RestStore, SecondaryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardOutcome {
    Success,
    Timeout,
    Failure,
}

#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub payload: CallEvent,
    pub submitted_at: Instant,
}

#[derive(Debug, Clone)]
pub struct ForwardResult {
    pub cell_id: String,
    pub outcome: ForwardOutcome,
    /// Time from submission to completion, including any wait for capacity.
    pub latency: Duration,
}

/// Counters shared between the forwarder and its request tasks.
#[derive(Debug, Default)]
pub struct ForwardStats {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    timed_out: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForwardStatsSnapshot {
    pub submitted: u64,
    pub succeeded: u64,
    pub timed_out: u64,
    pub failed: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

impl ForwardStats {
    fn enter(&self) -> usize {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        now
    }

    fn leave(&self, outcome: ForwardOutcome) -> usize {
        match outcome {
            ForwardOutcome::Success => self.succeeded.fetch_add(1, Ordering::SeqCst),
            ForwardOutcome::Timeout => self.timed_out.fetch_add(1, Ordering::SeqCst),
            ForwardOutcome::Failure => self.failed.fetch_add(1, Ordering::SeqCst),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn snapshot(&self) -> ForwardStatsSnapshot {
        ForwardStatsSnapshot {
            submitted: self.submitted.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            timed_out: self.timed_out.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
        }
    }
}

/// Holds a request's slot. If the request task unwinds before `settle`, the
/// request is counted as a failure before the slot is released.
struct InFlight {
    stats: Arc<ForwardStats>,
    settled: bool,
    _permit: OwnedSemaphorePermit,
}

impl InFlight {
    fn settle(&mut self, outcome: ForwardOutcome) -> usize {
        self.settled = true;
        self.stats.leave(outcome)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let in_flight = self.stats.leave(ForwardOutcome::Failure);
        counter!("forward_failure_total").increment(1);
        gauge!("forward_in_flight").set(in_flight as f64);
        tracing::error!(target: "forwarder", "forward task aborted; counted as failure");
    }
}

pub struct BoundedForwarder {
    store: Arc<dyn SecondaryStore>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    timeout: Duration,
    stats: Arc<ForwardStats>,
    completions: Option<mpsc::Sender<ForwardResult>>,
}

impl BoundedForwarder {
    /// `max_in_flight` is clamped to `1..=Semaphore::MAX_PERMITS`.
    pub fn new(store: Arc<dyn SecondaryStore>, max_in_flight: usize, timeout: Duration) -> Self {
        let max_in_flight = max_in_flight.clamp(1, Semaphore::MAX_PERMITS.min(u32::MAX as usize));
        Self {
            store,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            timeout,
            stats: Arc::new(ForwardStats::default()),
            completions: None,
        }
    }

    /// Report each completion on `tx`. Results are dropped if the channel is full.
    pub fn with_completions(mut self, tx: mpsc::Sender<ForwardResult>) -> Self {
        self.completions = Some(tx);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn in_flight(&self) -> usize {
        self.stats.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.stats.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ForwardStatsSnapshot {
        self.stats.snapshot()
    }

    /// Hand `event` to the store. Waits only while the forwarder is at capacity.
    pub async fn submit(&self, event: CallEvent) {
        let request = ForwardRequest {
            payload: event,
            submitted_at: Instant::now(),
        };

        let permit = match self.permits.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!(target: "forwarder", cell_id = %request.payload.cell_id, "forwarder closed; record dropped");
                return;
            }
        };

        let in_flight = self.stats.enter();
        counter!("forward_submitted_total").increment(1);
        gauge!("forward_in_flight").set(in_flight as f64);

        let mut slot = InFlight {
            stats: self.stats.clone(),
            settled: false,
            _permit: permit,
        };
        let store = self.store.clone();
        let timeout = self.timeout;
        let completions = self.completions.clone();

        tokio::spawn(async move {
            let ForwardRequest {
                payload,
                submitted_at,
            } = request;

            let outcome = match tokio::time::timeout(timeout, store.store(&payload)).await {
                Ok(Ok(())) => ForwardOutcome::Success,
                Ok(Err(e)) => {
                    tracing::warn!(target: "forwarder", store = store.name(), cell_id = %payload.cell_id, "forward failed: {e:#}");
                    ForwardOutcome::Failure
                }
                Err(_) => {
                    tracing::warn!(target: "forwarder", store = store.name(), cell_id = %payload.cell_id, timeout_ms = timeout.as_millis() as u64, "forward timed out");
                    ForwardOutcome::Timeout
                }
            };
            let latency = submitted_at.elapsed();

            let in_flight = slot.settle(outcome);
            match outcome {
                ForwardOutcome::Success => counter!("forward_success_total").increment(1),
                ForwardOutcome::Timeout => counter!("forward_timeout_total").increment(1),
                ForwardOutcome::Failure => counter!("forward_failure_total").increment(1),
            }
            gauge!("forward_in_flight").set(in_flight as f64);
            histogram!("forward_latency_ms").record(latency.as_secs_f64() * 1000.0);

            if let Some(tx) = completions {
                let _ = tx.try_send(ForwardResult {
                    cell_id: payload.cell_id,
                    outcome,
                    latency,
                });
            }

            // the completion is out before the slot goes to the next request
            drop(slot);
        });
    }

    /// Wait until every outstanding request has completed.
    pub async fn drain(&self) {
        match self.permits.acquire_many(self.max_in_flight as u32).await {
            Ok(all) => drop(all),
            Err(_) => tracing::debug!(target: "forwarder", "drain on closed forwarder"),
        }
    }
}
