//! The immutable response context.

use super::{keys, Metadata};
use crate::core::{DispatchState, ErrorKind, ResponseStatus};
use crate::errors::ResponseError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The single response produced for a request.
///
/// `payload` is present iff the status is success and `error` iff it is an
/// error; the constructors are the only way to build one, so the two can never
/// disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseContext {
    request_id: String,
    status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ResponseError>,
    #[serde(default)]
    metadata: Metadata,
}

impl ResponseContext {
    /// Creates a success response.
    #[must_use]
    pub fn success(request_id: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id: request_id.into(),
            status: ResponseStatus::Success,
            payload: Some(payload),
            error: None,
            metadata: Metadata::new(),
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn failure(request_id: impl Into<String>, error: ResponseError) -> Self {
        Self {
            request_id: request_id.into(),
            status: ResponseStatus::Error,
            payload: None,
            error: Some(error),
            metadata: Metadata::new(),
        }
    }

    /// Returns the id of the originating request.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the status.
    #[must_use]
    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// Returns true for a success response.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// Returns the payload of a success response.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Consumes the response and returns its payload.
    #[must_use]
    pub fn into_payload(self) -> Option<Value> {
        self.payload
    }

    /// Returns the error of an error response.
    #[must_use]
    pub fn error(&self) -> Option<&ResponseError> {
        self.error.as_ref()
    }

    /// Returns the error kind of an error response.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Returns the terminal dispatch state this response represents.
    #[must_use]
    pub fn state(&self) -> DispatchState {
        match self.status {
            ResponseStatus::Success => DispatchState::Completed,
            ResponseStatus::Error => DispatchState::Failed,
        }
    }

    /// Returns the diagnostic metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns a single metadata entry.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Returns the correlation id assigned during the dispatch, if any.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.metadata.get(keys::TRACE_ID).and_then(Value::as_str)
    }

    /// Returns a copy with one metadata entry set.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns a copy addressed to `request_id`.
    ///
    /// Only the pipeline boundary uses this, to restore the id invariant when a
    /// custom interceptor answered with the wrong one.
    #[must_use]
    pub(crate) fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}
