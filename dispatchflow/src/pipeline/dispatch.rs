//! The built pipeline and its single entry point.

use crate::cancellation::OrphanTracker;
use crate::config::PipelineConfig;
use crate::context::{keys, RequestContext, ResponseContext};
use crate::core::DispatchState;
use crate::errors::ResponseError;
use crate::interceptors::InterceptorChain;
use crate::utils::panic_message;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, warn};

/// An immutable, validated interceptor chain.
///
/// Cloning is cheap and every clone shares the same interceptors, so one
/// pipeline can serve any number of concurrent dispatches.
#[derive(Debug, Clone)]
pub struct Pipeline {
    chain: InterceptorChain,
    config: Arc<PipelineConfig>,
    orphans: Option<Arc<OrphanTracker>>,
}

impl Pipeline {
    pub(crate) fn new(
        chain: InterceptorChain,
        config: PipelineConfig,
        orphans: Option<Arc<OrphanTracker>>,
    ) -> Self {
        Self {
            chain,
            config: Arc::new(config),
            orphans,
        }
    }

    /// Runs a request through the chain and returns its response.
    ///
    /// Never fails: routing, validation and handler failures come back as
    /// error responses, and a panicking interceptor becomes an execution
    /// error. The response always carries the request's id.
    pub async fn dispatch(&self, ctx: RequestContext) -> ResponseContext {
        let request_id = ctx.id().to_string();
        let handler_name = ctx.handler_name().to_string();

        let response = match AssertUnwindSafe(self.chain.entry().run(ctx))
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    request_id = %request_id,
                    handler = %handler_name,
                    panic = %message,
                    "interceptor panicked during dispatch"
                );
                ResponseContext::failure(
                    request_id.as_str(),
                    ResponseError::execution("interceptor panicked", Some(message)),
                )
            }
        };

        let response = if response.request_id() == request_id {
            response
        } else {
            warn!(
                request_id = %request_id,
                returned = %response.request_id(),
                "response carried a foreign request id"
            );
            response.with_request_id(request_id)
        };

        match response.error_kind() {
            Some(kind) => {
                let stage = kind.failing_state();
                debug_assert!(
                    stage.can_transition_to(DispatchState::Failed),
                    "{kind} errors are produced in terminal state {stage}"
                );
                response.with_metadata(keys::FAILED_STAGE, Value::String(stage.to_string()))
            }
            None => response,
        }
    }

    /// Returns the configuration the pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the interceptor names in execution order.
    #[must_use]
    pub fn interceptor_names(&self) -> Vec<String> {
        self.chain.names()
    }

    /// Returns the tracker of timed-out handlers, when the terminal stage keeps one.
    #[must_use]
    pub fn orphans(&self) -> Option<Arc<OrphanTracker>> {
        self.orphans.clone()
    }
}
