//! Handlers and their resolution.
//!
//! This module provides:
//! - Handler descriptors and parameter schemas
//! - The uniform `Invoke` contract with blocking, async and stateful adapters
//! - The `HandlerRegistry` interface and an in-memory implementation

mod descriptor;
mod invoke;
mod registry;

pub use descriptor::{CallingConvention, HandlerDescriptor, ParamSpec, ParamType, ParameterSchema};
pub use invoke::{
    AsyncHandler, BlockingHandler, HandlerResult, Invoke, StatefulHandler, StatefulInvoke,
};
#[cfg(test)]
pub use registry::MockHandlerRegistry;
pub use registry::{HandlerRegistry, InMemoryHandlerRegistry};
