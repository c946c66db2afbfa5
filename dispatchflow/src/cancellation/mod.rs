//! Cooperative cancellation for handler calls.
//!
//! This module provides:
//! - CancellationToken, the signal handed to every handler invocation
//! - OrphanTracker, accounting for calls that ignore the signal

mod orphans;
mod token;

pub use orphans::{OrphanTracker, OrphanedCall};
pub use token::{CancelCallback, CancellationToken};
