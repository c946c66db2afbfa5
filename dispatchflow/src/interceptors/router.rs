//! Resolves the requested handler name.

use super::{Interceptor, Next};
use crate::context::{keys, RequestContext, ResponseContext};
use crate::errors::ResponseError;
use crate::handlers::HandlerRegistry;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Looks the handler up in the registry and attaches its descriptor.
///
/// An unknown name short-circuits with a routing error; nothing downstream runs.
pub struct RouterInterceptor {
    registry: Arc<dyn HandlerRegistry>,
}

impl RouterInterceptor {
    /// Creates a router over the given registry.
    #[must_use]
    pub fn new(registry: Arc<dyn HandlerRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Interceptor for RouterInterceptor {
    fn name(&self) -> &str {
        "router"
    }

    async fn intercept(&self, ctx: RequestContext, next: Next<'_>) -> ResponseContext {
        let Some(descriptor) = self.registry.lookup(ctx.handler_name()) else {
            debug!(
                request_id = %ctx.id(),
                handler = %ctx.handler_name(),
                "no handler registered"
            );
            return ResponseContext::failure(ctx.id(), ResponseError::not_found(ctx.handler_name()));
        };

        let resolved = descriptor.name().to_string();
        debug!(
            request_id = %ctx.id(),
            handler = %ctx.handler_name(),
            resolved = %resolved,
            "handler resolved"
        );

        next.run(ctx.with_resolved_handler(descriptor))
            .await
            .with_metadata(keys::RESOLVED_HANDLER, Value::String(resolved))
    }
}

impl std::fmt::Debug for RouterInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterInterceptor").finish_non_exhaustive()
    }
}
