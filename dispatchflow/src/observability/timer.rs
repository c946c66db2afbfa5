//! Wall-clock timing for a dispatch.

use crate::utils::{now, Timestamp};
use std::time::{Duration, Instant};

/// Measures how long a named operation takes.
#[derive(Debug, Clone)]
pub struct SpanTimer {
    name: String,
    started_at: Timestamp,
    start: Instant,
}

impl SpanTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started_at: now(),
            start: Instant::now(),
        }
    }

    /// Returns the operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns when the timer was started.
    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Returns the elapsed time.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns the elapsed time in fractional milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Stops the timer and returns the duration.
    #[must_use]
    pub fn finish(self) -> Duration {
        self.elapsed()
    }
}
