//! Dispatch metrics.
//!
//! Every dispatch produces one [`DispatchRecord`], whether or not it was
//! sampled for tracing. Sinks are fallible; the observability stage discards
//! their errors so metrics can never change a response.

use crate::core::ErrorKind;
use crate::errors::ObservabilityError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The handler returned a payload.
    Success,
    /// The dispatch failed with the given kind.
    Error(ErrorKind),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Error(kind) => write!(f, "{kind}"),
        }
    }
}

/// One completed dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    /// The request id.
    pub request_id: String,
    /// The correlation id.
    pub trace_id: String,
    /// The requested handler name.
    pub handler_name: String,
    /// How the dispatch ended.
    pub outcome: Outcome,
    /// Time spent in the rest of the chain.
    pub duration: Duration,
    /// Whether the dispatch was traced.
    pub sampled: bool,
}

/// Destination for dispatch metrics.
pub trait MetricsSink: Send + Sync {
    /// Records a completed dispatch.
    fn record(&self, record: &DispatchRecord) -> Result<(), ObservabilityError>;
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetricsSink;

impl MetricsSink for NoOpMetricsSink {
    fn record(&self, _record: &DispatchRecord) -> Result<(), ObservabilityError> {
        Ok(())
    }
}

/// Point-in-time copy of [`InMemoryMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Total dispatches recorded.
    pub total: u64,
    /// Dispatches that succeeded.
    pub succeeded: u64,
    /// Dispatches that failed, by kind.
    pub failed_by_kind: Vec<(ErrorKind, u64)>,
    /// Dispatches that were sampled for tracing.
    pub sampled: u64,
    /// Sum of all dispatch durations in microseconds.
    pub total_duration_us: u64,
}

impl MetricsSnapshot {
    /// Returns the failure count for a kind.
    #[must_use]
    pub fn failed(&self, kind: ErrorKind) -> u64 {
        self.failed_by_kind
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, count)| *count)
    }
}

/// Per-handler bucket for dispatches whose name the registry did not know.
pub const UNRESOLVED_HANDLER: &str = "<unresolved>";

/// Lock-free in-process counters.
///
/// Per-handler counts are kept only for names that resolved; routing misses
/// share the [`UNRESOLVED_HANDLER`] bucket so arbitrary caller input cannot
/// grow the map.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    total: AtomicU64,
    succeeded: AtomicU64,
    sampled: AtomicU64,
    total_duration_us: AtomicU64,
    failed: DashMap<ErrorKind, u64>,
    per_handler: DashMap<String, u64>,
}

impl InMemoryMetrics {
    /// Creates empty counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many dispatches named `handler_name`.
    ///
    /// Pass [`UNRESOLVED_HANDLER`] for the number of routing misses.
    #[must_use]
    pub fn count_for(&self, handler_name: &str) -> u64 {
        self.per_handler.get(handler_name).map_or(0, |count| *count)
    }

    /// Returns a copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut failed_by_kind: Vec<(ErrorKind, u64)> =
            self.failed.iter().map(|e| (*e.key(), *e.value())).collect();
        failed_by_kind.sort_by_key(|(kind, _)| kind.to_string());

        MetricsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed_by_kind,
            sampled: self.sampled.load(Ordering::Relaxed),
            total_duration_us: self.total_duration_us.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record(&self, record: &DispatchRecord) -> Result<(), ObservabilityError> {
        self.total.fetch_add(1, Ordering::Relaxed);
        match record.outcome {
            Outcome::Success => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Error(kind) => *self.failed.entry(kind).or_insert(0) += 1,
        }
        if record.sampled {
            self.sampled.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(record.duration.as_micros()).unwrap_or(u64::MAX);
        self.total_duration_us.fetch_add(micros, Ordering::Relaxed);
        let bucket = match record.outcome {
            Outcome::Error(ErrorKind::NotFound) => UNRESOLVED_HANDLER,
            _ => record.handler_name.as_str(),
        };
        *self.per_handler.entry(bucket.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(handler: &str, outcome: Outcome, sampled: bool) -> DispatchRecord {
        DispatchRecord {
            request_id: "req".to_string(),
            trace_id: "trace".to_string(),
            handler_name: handler.to_string(),
            outcome,
            duration: Duration::from_micros(250),
            sampled,
        }
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Success.to_string(), "success");
        assert_eq!(Outcome::Error(ErrorKind::Timeout).to_string(), "timeout");
    }

    #[test]
    fn test_in_memory_counts() {
        let metrics = InMemoryMetrics::new();
        metrics.record(&record("echo", Outcome::Success, true)).unwrap();
        metrics.record(&record("echo", Outcome::Error(ErrorKind::Validation), false)).unwrap();
        metrics.record(&record("other", Outcome::Error(ErrorKind::Validation), false)).unwrap();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.sampled, 1);
        assert_eq!(snapshot.failed(ErrorKind::Validation), 2);
        assert_eq!(snapshot.failed(ErrorKind::Timeout), 0);
        assert_eq!(snapshot.total_duration_us, 750);
        assert_eq!(metrics.count_for("echo"), 2);
        assert_eq!(metrics.count_for("missing"), 0);
    }

    #[test]
    fn test_routing_misses_share_one_bucket() {
        let metrics = InMemoryMetrics::new();
        for i in 0..100 {
            let name = format!("missing-{i}");
            metrics
                .record(&record(&name, Outcome::Error(ErrorKind::NotFound), false))
                .unwrap();
        }
        metrics.record(&record("echo", Outcome::Success, false)).unwrap();

        assert_eq!(metrics.per_handler.len(), 2);
        assert_eq!(metrics.count_for(UNRESOLVED_HANDLER), 100);
        assert_eq!(metrics.count_for("missing-7"), 0);
        assert_eq!(metrics.count_for("echo"), 1);
        assert_eq!(metrics.snapshot().failed(ErrorKind::NotFound), 100);
    }

    #[test]
    fn test_noop_sink() {
        assert!(NoOpMetricsSink.record(&record("x", Outcome::Success, false)).is_ok());
    }
}
