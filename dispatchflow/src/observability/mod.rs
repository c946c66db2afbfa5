//! Observability utilities.
//!
//! This module provides:
//! - Logging initialization for `tracing-subscriber`
//! - The metrics sink contract and an in-memory implementation
//! - A wall-clock span timer

pub mod logging;
mod metrics;
mod timer;

pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{
    DispatchRecord, InMemoryMetrics, MetricsSink, MetricsSnapshot, NoOpMetricsSink, Outcome,
    UNRESOLVED_HANDLER,
};
pub use timer::SpanTimer;
