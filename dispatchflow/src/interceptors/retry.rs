//! Retry interceptor with backoff strategies.

use super::{Interceptor, Next};
use crate::context::{keys, RequestContext, ResponseContext};
use crate::core::ErrorKind;
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant(Duration),
    /// Linear increase: delay * attempt.
    Linear(Duration),
    /// Exponential: delay * 2^(attempt - 1).
    Exponential(Duration),
}

impl BackoffStrategy {
    /// Calculates the delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Constant(d) => *d,
            Self::Linear(d) => d.saturating_mul(attempt),
            Self::Exponential(d) => {
                let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                d.saturating_mul(factor)
            }
        }
    }
}

/// Jitter strategy for adding randomness to delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// No jitter.
    None,
    /// Full jitter: [0, delay].
    Full,
    /// Equal jitter: [delay/2, delay].
    Equal,
}

impl JitterStrategy {
    /// Applies jitter to a delay.
    #[must_use]
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match self {
            Self::None => delay,
            Self::Full => Duration::from_millis(rand::thread_rng().gen_range(0..=millis)),
            Self::Equal => {
                let half = millis / 2;
                Duration::from_millis(half + rand::thread_rng().gen_range(0..=millis - half))
            }
        }
    }
}

/// Re-runs the rest of the chain when it fails with a retryable kind.
///
/// Not part of the standard chain. Place it before the execution stage so each
/// attempt gets a fresh deadline. Routing and validation failures are never
/// retried; every attempt reuses the same request.
#[derive(Debug, Clone)]
pub struct RetryInterceptor {
    max_attempts: u32,
    backoff: BackoffStrategy,
    jitter: JitterStrategy,
    retry_on: Vec<ErrorKind>,
}

impl RetryInterceptor {
    /// Creates a retry interceptor. `max_attempts` counts the first try.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: BackoffStrategy, jitter: JitterStrategy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            jitter,
            retry_on: vec![ErrorKind::Execution, ErrorKind::Timeout],
        }
    }

    /// Creates a retry interceptor with constant delay and no jitter.
    #[must_use]
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, BackoffStrategy::Constant(delay), JitterStrategy::None)
    }

    /// Creates an exponential backoff retry interceptor with full jitter.
    #[must_use]
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self::new(
            max_attempts,
            BackoffStrategy::Exponential(base_delay),
            JitterStrategy::Full,
        )
    }

    /// Restricts which kinds are retried. Only retryable kinds are kept.
    #[must_use]
    pub fn retry_on(mut self, kinds: &[ErrorKind]) -> Self {
        self.retry_on = kinds.iter().copied().filter(ErrorKind::is_retryable).collect();
        self
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn should_retry(&self, response: &ResponseContext) -> bool {
        response
            .error_kind()
            .is_some_and(|kind| self.retry_on.contains(&kind))
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.backoff.delay(attempt))
    }
}

#[async_trait]
impl Interceptor for RetryInterceptor {
    fn name(&self) -> &str {
        "retry"
    }

    async fn intercept(&self, ctx: RequestContext, next: Next<'_>) -> ResponseContext {
        let mut attempt = 1;
        let mut response = next.run(ctx.clone()).await;

        while attempt < self.max_attempts && self.should_retry(&response) {
            let delay = self.calculate_delay(attempt);
            debug!(
                request_id = %ctx.id(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error_kind = ?response.error_kind(),
                "retrying dispatch"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
            response = next.run(ctx.clone()).await;
        }

        response.with_metadata(keys::ATTEMPTS, Value::from(attempt))
    }
}
