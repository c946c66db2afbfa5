//! Interceptors: the stages a dispatch passes through.
//!
//! The standard chain is observability, router, validation, execution.
//! [`RetryInterceptor`] is optional and goes just before execution.

mod chain;
mod execution;
mod observability;
mod retry;
mod router;
mod validation;

pub use chain::{Interceptor, InterceptorChain, Next};
pub use execution::ExecutionInterceptor;
pub use observability::ObservabilityInterceptor;
pub use retry::{BackoffStrategy, JitterStrategy, RetryInterceptor};
pub use router::RouterInterceptor;
pub use validation::{validate_parameters, ValidationInterceptor, HANDLER_FIELD};
