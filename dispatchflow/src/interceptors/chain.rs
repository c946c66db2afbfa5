//! The interceptor contract and the continuation that links a chain.

use crate::cancellation::OrphanTracker;
use crate::context::{RequestContext, ResponseContext};
use crate::errors::ResponseError;
use async_trait::async_trait;
use std::sync::Arc;

/// A pipeline stage.
///
/// Each call must do exactly one of: forward to `next` (possibly with a derived
/// context) and return or transform its result; return a response without
/// calling `next`; or wrap the call to `next` with work before and after it.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Name used in logs and build errors.
    fn name(&self) -> &str;

    /// Returns true if this stage ends the chain and never calls `next`.
    fn is_terminal(&self) -> bool {
        false
    }

    /// The tracker of timed-out calls this stage detaches, if it runs handlers.
    fn orphan_tracker(&self) -> Option<Arc<OrphanTracker>> {
        None
    }

    /// Handles the request, optionally delegating to the rest of the chain.
    async fn intercept(&self, ctx: RequestContext, next: Next<'_>) -> ResponseContext;
}

/// The rest of the chain after the current interceptor.
///
/// `Next` is `Copy`, so a stage may call it more than once (e.g. for retries).
#[derive(Clone, Copy)]
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Interceptor>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(remaining: &'a [Arc<dyn Interceptor>]) -> Self {
        Self { remaining }
    }

    /// Runs the rest of the chain.
    ///
    /// Running past the end yields an execution error rather than a panic.
    /// A validated pipeline never gets there.
    pub async fn run(self, ctx: RequestContext) -> ResponseContext {
        match self.remaining.split_first() {
            Some((head, rest)) => head.intercept(ctx, Next::new(rest)).await,
            None => ResponseContext::failure(
                ctx.id(),
                ResponseError::execution("interceptor chain ended without a response", None),
            ),
        }
    }

    /// Returns the number of interceptors left in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    /// Returns true if nothing is left in the chain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field(
                "remaining",
                &self.remaining.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// An immutable, ordered chain of interceptors.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
}

impl InterceptorChain {
    pub(crate) fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptors: interceptors.into(),
        }
    }

    /// Returns the continuation that enters the first interceptor.
    #[must_use]
    pub fn entry(&self) -> Next<'_> {
        Next::new(&self.interceptors)
    }

    /// Returns the interceptor names in configured order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.interceptors.iter().map(|i| i.name().to_string()).collect()
    }

    /// Returns the number of interceptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Returns true if the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.names())
            .finish()
    }
}
