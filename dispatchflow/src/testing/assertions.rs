//! Test assertions for responses.

use crate::context::ResponseContext;
use crate::core::ErrorKind;
use serde_json::Value;

/// Asserts that the response is a success and returns its payload.
pub fn assert_success(response: &ResponseContext) -> &Value {
    match response.payload() {
        Some(payload) if response.is_success() => payload,
        _ => panic!("Expected success, got error: {:?}", response.error()),
    }
}

/// Asserts that the response failed with `kind`.
pub fn assert_error_kind(response: &ResponseContext, kind: ErrorKind) {
    assert_eq!(
        response.error_kind(),
        Some(kind),
        "Expected {kind} error, got {:?}",
        response.status()
    );
}

/// Asserts that a validation error cites exactly `fields`, in order.
pub fn assert_violations(response: &ResponseContext, fields: &[&str]) {
    assert_error_kind(response, ErrorKind::Validation);
    let actual: Vec<&str> = response
        .error()
        .map(|e| e.violations.iter().map(|v| v.field.as_str()).collect())
        .unwrap_or_default();
    assert_eq!(actual, fields, "Unexpected violated fields");
}

/// Asserts that the response carries a metadata entry.
pub fn assert_metadata(response: &ResponseContext, key: &str) {
    assert!(
        response.metadata_value(key).is_some(),
        "Expected metadata to contain key '{key}'. Keys: {:?}",
        response.metadata().keys().collect::<Vec<_>>()
    );
}
