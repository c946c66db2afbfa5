//! Accounting for handler calls that outlive their deadline.
//!
//! When a handler ignores cancellation, the caller still receives a timely
//! `TimeoutError` but the handler keeps running in the background. Those calls
//! are tracked here rather than forgotten, so operators can see how many are
//! still holding resources.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::warn;

/// A handler call that was detached after its deadline expired.
#[derive(Debug, Clone)]
pub struct OrphanedCall {
    /// The request id of the timed-out dispatch.
    pub request_id: String,
    /// The handler still running.
    pub handler_name: String,
    /// When the call was detached.
    pub orphaned_at: Instant,
}

/// Tracks detached handler calls until they finish.
#[derive(Debug, Default)]
pub struct OrphanTracker {
    in_flight: DashMap<u64, OrphanedCall>,
    next_key: AtomicU64,
    total_orphaned: AtomicU64,
    total_settled: AtomicU64,
}

impl OrphanTracker {
    /// Creates a new tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Detaches a timed-out call and watches it until it finishes.
    ///
    /// The join handle is moved into a watcher task; the call is removed from
    /// the in-flight set when the handler eventually returns or panics. Each
    /// adoption is tracked separately, so retries of one request never share
    /// an entry.
    pub fn adopt<T>(
        self: &Arc<Self>,
        request_id: impl Into<String>,
        handler_name: impl Into<String>,
        call: JoinHandle<T>,
    ) where
        T: Send + 'static,
    {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let orphan = OrphanedCall {
            request_id: request_id.into(),
            handler_name: handler_name.into(),
            orphaned_at: Instant::now(),
        };
        self.in_flight.insert(key, orphan);
        self.total_orphaned.fetch_add(1, Ordering::SeqCst);

        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let _ = call.await;
            tracker.settle(key);
        });
    }

    fn settle(&self, key: u64) {
        if let Some((_, orphan)) = self.in_flight.remove(&key) {
            self.total_settled.fetch_add(1, Ordering::SeqCst);
            warn!(
                request_id = %orphan.request_id,
                handler = %orphan.handler_name,
                overrun_ms = orphan.orphaned_at.elapsed().as_millis() as u64,
                "Timed-out handler finished after its deadline"
            );
        }
    }

    /// Returns the number of detached calls still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns the number of calls ever detached.
    #[must_use]
    pub fn total_orphaned(&self) -> u64 {
        self.total_orphaned.load(Ordering::SeqCst)
    }

    /// Returns the number of detached calls that have since finished.
    #[must_use]
    pub fn total_settled(&self) -> u64 {
        self.total_settled.load(Ordering::SeqCst)
    }

    /// Returns detached calls that have been running longer than `age`.
    #[must_use]
    pub fn older_than(&self, age: Duration) -> Vec<OrphanedCall> {
        self.in_flight
            .iter()
            .filter(|entry| entry.orphaned_at.elapsed() >= age)
            .map(|entry| entry.value().clone())
            .collect()
    }
}
