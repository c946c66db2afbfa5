//! Pipeline building and dispatch.
//!
//! This module provides:
//! - The builder, which validates the interceptor chain
//! - The built pipeline and its `dispatch` entry point

mod builder;
mod dispatch;
mod integration_tests;

pub use builder::PipelineBuilder;
pub use dispatch::Pipeline;
