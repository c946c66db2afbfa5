//! The terminal stage: invokes the resolved handler under a deadline.

use super::{Interceptor, Next};
use crate::cancellation::{CancellationToken, OrphanTracker};
use crate::context::{keys, RequestContext, ResponseContext};
use crate::errors::ResponseError;
use crate::handlers::HandlerResult;
use crate::utils::panic_message;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

/// Invokes the resolved handler and converts its outcome into a response.
///
/// Each call runs as its own task raced against the deadline. When the
/// deadline wins, the call's token is cancelled and the task is handed to the
/// [`OrphanTracker`]; the response does not wait for it. The same happens when
/// the dispatch future itself is dropped before the call finishes.
#[derive(Debug)]
pub struct ExecutionInterceptor {
    timeout: Duration,
    orphans: Arc<OrphanTracker>,
}

impl ExecutionInterceptor {
    /// Creates an execution stage with the given per-call timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            orphans: Arc::new(OrphanTracker::new()),
        }
    }

    /// Returns the configured per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the tracker of timed-out calls still running.
    #[must_use]
    pub fn orphans(&self) -> Arc<OrphanTracker> {
        Arc::clone(&self.orphans)
    }

    /// The configured timeout, tightened by any per-request deadline.
    fn deadline_for(&self, ctx: &RequestContext) -> Duration {
        ctx.deadline()
            .map_or(self.timeout, |deadline| deadline.min(self.timeout))
    }
}

/// A spawned handler call owned by one dispatch.
///
/// Until [`disarm`](Self::disarm) or [`abandon`](Self::abandon) is called,
/// dropping the guard cancels the call's token and adopts the task.
struct InFlightCall {
    call: Option<JoinHandle<HandlerResult>>,
    token: CancellationToken,
    orphans: Arc<OrphanTracker>,
    request_id: String,
    handler_name: String,
}

impl InFlightCall {
    /// Releases the task once it has produced its result.
    fn disarm(&mut self) {
        self.call = None;
    }

    /// Cancels the call and hands the still-running task to the tracker.
    fn abandon(&mut self, reason: impl Into<String>) {
        self.token.cancel(reason);
        if let Some(call) = self.call.take() {
            if !call.is_finished() {
                self.orphans
                    .adopt(self.request_id.clone(), self.handler_name.clone(), call);
            }
        }
    }
}

impl Future for InFlightCall {
    type Output = Result<HandlerResult, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Never polled after the task is released.
        match self.call.as_mut() {
            Some(call) => Pin::new(call).poll(cx),
            None => Poll::Pending,
        }
    }
}

impl Drop for InFlightCall {
    fn drop(&mut self) {
        if self.call.is_none() {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            self.token.cancel("dispatch dropped before completion");
            return;
        }
        warn!(
            request_id = %self.request_id,
            handler = %self.handler_name,
            "dispatch dropped before handler finished"
        );
        self.abandon("dispatch dropped before completion");
    }
}

fn cause_chain(error: &anyhow::Error) -> Value {
    Value::Array(
        error
            .chain()
            .map(|cause| Value::String(cause.to_string()))
            .collect(),
    )
}

#[async_trait]
impl Interceptor for ExecutionInterceptor {
    fn name(&self) -> &str {
        "execution"
    }

    fn is_terminal(&self) -> bool {
        true
    }

    fn orphan_tracker(&self) -> Option<Arc<OrphanTracker>> {
        Some(self.orphans())
    }

    async fn intercept(&self, ctx: RequestContext, _next: Next<'_>) -> ResponseContext {
        let Some(descriptor) = ctx.resolved_handler().cloned() else {
            return ResponseContext::failure(
                ctx.id(),
                ResponseError::execution("no resolved handler to invoke", None),
            );
        };

        let deadline = self.deadline_for(&ctx);
        let convention = Value::String(descriptor.calling_convention().to_string());
        let token = CancellationToken::new();
        let invoker = descriptor.invoker();
        let parameters = ctx.parameters().clone();
        let call_token = token.clone();

        debug!(
            request_id = %ctx.id(),
            handler = %descriptor.name(),
            deadline_ms = deadline.as_millis() as u64,
            "invoking handler"
        );

        let mut call = InFlightCall {
            call: Some(tokio::spawn(async move {
                invoker.invoke(parameters, call_token).await
            })),
            token,
            orphans: Arc::clone(&self.orphans),
            request_id: ctx.id().to_string(),
            handler_name: descriptor.name().to_string(),
        };

        let outcome = tokio::time::timeout(deadline, &mut call).await;
        if outcome.is_ok() {
            call.disarm();
        }

        let response = match outcome {
            Ok(Ok(Ok(payload))) => ResponseContext::success(ctx.id(), payload),
            Ok(Ok(Err(error))) => {
                debug!(
                    request_id = %ctx.id(),
                    handler = %descriptor.name(),
                    error = %error,
                    "handler failed"
                );
                let chain = cause_chain(&error);
                ResponseContext::failure(
                    ctx.id(),
                    ResponseError::execution(error.to_string(), Some(format!("{error:#}"))),
                )
                .with_metadata(keys::CAUSE, chain)
            }
            Ok(Err(join_error)) if join_error.is_panic() => {
                let message = panic_message(join_error.into_panic().as_ref());
                warn!(
                    request_id = %ctx.id(),
                    handler = %descriptor.name(),
                    panic = %message,
                    "handler panicked"
                );
                ResponseContext::failure(
                    ctx.id(),
                    ResponseError::execution(
                        format!("handler '{}' panicked", descriptor.name()),
                        Some(message),
                    ),
                )
            }
            Ok(Err(join_error)) => ResponseContext::failure(
                ctx.id(),
                ResponseError::execution(
                    format!("handler '{}' was aborted", descriptor.name()),
                    Some(join_error.to_string()),
                ),
            ),
            Err(_elapsed) => {
                call.abandon(format!("deadline of {}ms exceeded", deadline.as_millis()));
                warn!(
                    request_id = %ctx.id(),
                    handler = %descriptor.name(),
                    deadline_ms = deadline.as_millis() as u64,
                    "handler timed out"
                );
                ResponseContext::failure(
                    ctx.id(),
                    ResponseError::timeout(descriptor.name(), deadline),
                )
            }
        };

        response.with_metadata(keys::CALLING_CONVENTION, convention)
    }
}
