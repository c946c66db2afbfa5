//! Core domain enums for dispatchflow.
//!
//! This module contains:
//! - Response status and error kinds
//! - The per-dispatch state machine

mod status;

pub use status::{DispatchState, ErrorKind, ResponseStatus};
