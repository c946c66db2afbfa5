//! UUID generation utilities.

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates a new UUID v7 (time-ordered).
///
/// Used for request ids so that ids sort roughly by ingress time.
#[must_use]
pub fn generate_uuid_v7() -> Uuid {
    Uuid::now_v7()
}
