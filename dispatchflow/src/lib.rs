//! # Dispatchflow
//!
//! An interceptor pipeline that mediates every invocation of a named handler.
//!
//! Each request passes through an ordered chain of stages:
//!
//! - **Observability**: correlation id, timing, sampled tracing and metrics
//! - **Routing**: resolves the handler name through an injected registry
//! - **Validation**: checks parameters against the handler's schema
//! - **Execution**: invokes the handler under a deadline with cooperative cancellation
//!
//! Blocking functions, async functions and stateful objects are all invoked
//! through one contract. Every dispatch returns exactly one response; failures
//! are reported inside it rather than as `Err`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dispatchflow::prelude::*;
//!
//! let registry = InMemoryHandlerRegistry::new();
//! registry.register(HandlerDescriptor::blocking(
//!     "echo",
//!     ParameterSchema::new().required("text", ParamType::String),
//!     |params, _| Ok(params["text"].clone()),
//! ));
//!
//! let pipeline = PipelineBuilder::standard(PipelineConfig::default(), Arc::new(registry))
//!     .build()?;
//!
//! let response = pipeline.dispatch(RequestContext::new("echo", params)?).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod interceptors;
pub mod observability;
pub mod pipeline;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancellationToken, OrphanTracker};
    pub use crate::config::PipelineConfig;
    pub use crate::context::{keys, Metadata, Parameters, RequestContext, ResponseContext};
    pub use crate::core::{DispatchState, ErrorKind, ResponseStatus};
    pub use crate::errors::{
        ConfigError, ContextError, ContractErrorInfo, DispatchflowError, FieldViolation,
        ObservabilityError, PipelineValidationError, RegistryError, ResponseError,
    };
    pub use crate::handlers::{
        CallingConvention, HandlerDescriptor, HandlerRegistry, HandlerResult,
        InMemoryHandlerRegistry, Invoke, ParamType, ParameterSchema, StatefulInvoke,
    };
    pub use crate::interceptors::{
        validate_parameters, BackoffStrategy, ExecutionInterceptor, Interceptor, JitterStrategy,
        Next, ObservabilityInterceptor, RetryInterceptor, RouterInterceptor, ValidationInterceptor,
    };
    pub use crate::observability::{
        init_default_logging, init_logging, InMemoryMetrics, LogFormat, MetricsSink,
        NoOpMetricsSink,
    };
    pub use crate::pipeline::{Pipeline, PipelineBuilder};
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
