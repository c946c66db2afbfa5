//! Timestamp helpers.

use chrono::{DateTime, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Returns the current UTC time as an RFC3339 string with microseconds:
/// `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}
