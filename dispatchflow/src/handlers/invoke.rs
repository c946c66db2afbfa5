//! The single invocation contract and its per-convention adapters.
//!
//! Execution only ever sees [`Invoke`]. Blocking functions, async functions and
//! stateful objects are each wrapped by an adapter so that the calling
//! convention never leaks past the descriptor.

use super::CallingConvention;
use crate::cancellation::CancellationToken;
use crate::context::Parameters;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Result of a handler call. The error keeps its full cause chain.
pub type HandlerResult = anyhow::Result<Value>;

/// Uniform invocation capability behind every handler.
#[async_trait]
pub trait Invoke: Send + Sync {
    /// The convention of the wrapped handler, for diagnostics only.
    fn calling_convention(&self) -> CallingConvention;

    /// Starts the call. Implementations should observe `cancellation`.
    async fn invoke(&self, parameters: Parameters, cancellation: CancellationToken) -> HandlerResult;
}

/// Adapter for plain synchronous functions.
///
/// The function runs on tokio's blocking pool so it never stalls the runtime.
/// A blocking function cannot be preempted: on timeout it keeps running until
/// it checks the token or returns.
pub struct BlockingHandler<F> {
    function: Arc<F>,
}

impl<F> BlockingHandler<F>
where
    F: Fn(Parameters, CancellationToken) -> HandlerResult + Send + Sync + 'static,
{
    /// Wraps a synchronous function.
    #[must_use]
    pub fn new(function: F) -> Self {
        Self {
            function: Arc::new(function),
        }
    }
}

#[async_trait]
impl<F> Invoke for BlockingHandler<F>
where
    F: Fn(Parameters, CancellationToken) -> HandlerResult + Send + Sync + 'static,
{
    fn calling_convention(&self) -> CallingConvention {
        CallingConvention::Blocking
    }

    async fn invoke(&self, parameters: Parameters, cancellation: CancellationToken) -> HandlerResult {
        let function = Arc::clone(&self.function);
        match tokio::task::spawn_blocking(move || function(parameters, cancellation)).await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                std::panic::resume_unwind(join_error.into_panic())
            }
            Err(join_error) => Err(anyhow::anyhow!("blocking handler was cancelled: {join_error}")),
        }
    }
}

/// Adapter for async functions.
pub struct AsyncHandler<F> {
    function: F,
}

impl<F, Fut> AsyncHandler<F>
where
    F: Fn(Parameters, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Wraps an async function.
    #[must_use]
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

#[async_trait]
impl<F, Fut> Invoke for AsyncHandler<F>
where
    F: Fn(Parameters, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn calling_convention(&self) -> CallingConvention {
        CallingConvention::Suspendable
    }

    async fn invoke(&self, parameters: Parameters, cancellation: CancellationToken) -> HandlerResult {
        (self.function)(parameters, cancellation).await
    }
}

/// A long-lived object that handles calls through `&self`.
///
/// Implementors own their state and must guard it for concurrent calls.
#[async_trait]
pub trait StatefulInvoke: Send + Sync + 'static {
    /// Handles one call.
    async fn call(&self, parameters: Parameters, cancellation: CancellationToken) -> HandlerResult;
}

/// Adapter for stateful objects.
pub struct StatefulHandler<T> {
    target: Arc<T>,
}

impl<T: StatefulInvoke> StatefulHandler<T> {
    /// Wraps a shared stateful object.
    #[must_use]
    pub fn new(target: Arc<T>) -> Self {
        Self { target }
    }

    /// Returns the wrapped object.
    #[must_use]
    pub fn target(&self) -> &Arc<T> {
        &self.target
    }
}

#[async_trait]
impl<T: StatefulInvoke> Invoke for StatefulHandler<T> {
    fn calling_convention(&self) -> CallingConvention {
        CallingConvention::StatefulObject
    }

    async fn invoke(&self, parameters: Parameters, cancellation: CancellationToken) -> HandlerResult {
        self.target.call(parameters, cancellation).await
    }
}
