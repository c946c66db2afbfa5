//! Utility functions for id generation, timestamps and panic payloads.

pub mod timestamps;
mod uuid_utils;

pub use timestamps::{iso_timestamp, now, Timestamp};
pub use uuid_utils::{generate_uuid, generate_uuid_v7};

use std::any::Any;

/// Extracts a readable message from a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
