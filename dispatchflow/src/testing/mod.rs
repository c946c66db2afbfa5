//! Testing utilities for dispatchflow pipelines.
//!
//! This module provides:
//! - Mock handlers covering each calling convention and failure mode
//! - Assertions for responses

mod assertions;
mod mocks;

pub use assertions::{assert_error_kind, assert_metadata, assert_success, assert_violations};
pub use mocks::{echo_handler, FailingHandler, RecordingHandler, SlowHandler};
