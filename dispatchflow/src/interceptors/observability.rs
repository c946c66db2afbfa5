//! Correlation, timing and metrics around the rest of the chain.

use super::{Interceptor, Next};
use crate::context::{keys, RequestContext, ResponseContext};
use crate::errors::ObservabilityError;
use crate::observability::{DispatchRecord, MetricsSink, Outcome, SpanTimer};
use crate::utils::{generate_uuid, panic_message};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

/// Wraps the chain with a trace id, a timer and a metrics record.
///
/// Only a `sampling_rate` fraction of dispatches get a tracing span; every
/// dispatch is recorded in the metrics sink. Sink failures are logged and
/// dropped. The response is returned unchanged apart from its metadata.
pub struct ObservabilityInterceptor {
    sampling_rate: f64,
    sink: Arc<dyn MetricsSink>,
}

impl ObservabilityInterceptor {
    /// Creates the stage. `sampling_rate` is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(sampling_rate: f64, sink: Arc<dyn MetricsSink>) -> Self {
        let sampling_rate = if sampling_rate.is_nan() {
            0.0
        } else {
            sampling_rate.clamp(0.0, 1.0)
        };
        Self {
            sampling_rate,
            sink,
        }
    }

    /// Returns the sampling rate.
    #[must_use]
    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    fn should_sample(&self) -> bool {
        rand::thread_rng().gen_bool(self.sampling_rate)
    }

    fn record(&self, record: &DispatchRecord) {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| self.sink.record(record)));
        let error = match result {
            Ok(Ok(())) => return,
            Ok(Err(error)) => error,
            Err(payload) => ObservabilityError::new(format!(
                "metrics sink panicked: {}",
                panic_message(payload.as_ref())
            )),
        };
        debug!(
            request_id = %record.request_id,
            error = %error,
            "dropping metrics record"
        );
    }
}

#[async_trait]
impl Interceptor for ObservabilityInterceptor {
    fn name(&self) -> &str {
        "observability"
    }

    async fn intercept(&self, ctx: RequestContext, next: Next<'_>) -> ResponseContext {
        let ctx = match ctx.trace_id() {
            Some(_) => ctx,
            None => {
                let trace_id = generate_uuid().to_string();
                ctx.with_metadata(keys::TRACE_ID, Value::String(trace_id))
            }
        };
        let trace_id = ctx.trace_id().unwrap_or_default().to_string();
        let request_id = ctx.id().to_string();
        let handler_name = ctx.handler_name().to_string();
        let sampled = self.should_sample();
        let timer = SpanTimer::start("dispatch");

        let response = if sampled {
            let span = info_span!(
                "dispatch",
                request_id = %request_id,
                trace_id = %trace_id,
                handler = %handler_name,
            );
            async {
                debug!("dispatch started");
                let response = next.run(ctx).await;
                debug!(status = ?response.status(), "dispatch finished");
                response
            }
            .instrument(span)
            .await
        } else {
            next.run(ctx).await
        };

        let duration = timer.finish();
        let outcome = response.error_kind().map_or(Outcome::Success, Outcome::Error);
        self.record(&DispatchRecord {
            request_id,
            trace_id: trace_id.clone(),
            handler_name,
            outcome,
            duration,
            sampled,
        });

        response
            .with_metadata(keys::TRACE_ID, Value::String(trace_id))
            .with_metadata(keys::DURATION_MS, Value::from(duration.as_secs_f64() * 1000.0))
            .with_metadata(keys::OUTCOME, Value::String(outcome.to_string()))
            .with_metadata(keys::SAMPLED, Value::Bool(sampled))
    }
}

impl std::fmt::Debug for ObservabilityInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservabilityInterceptor")
            .field("sampling_rate", &self.sampling_rate)
            .finish_non_exhaustive()
    }
}
