//! The immutable request context.

use super::{keys, Metadata, Parameters};
use crate::errors::ContextError;
use crate::handlers::HandlerDescriptor;
use crate::utils::{generate_uuid_v7, now, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// A single handler invocation request.
///
/// Fields are private; every change goes through a `with_*` method that
/// consumes the value and returns a new one, so no two stages can observe each
/// other's changes through a shared reference. The `id` is fixed at
/// construction and never altered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    id: String,
    handler_name: String,
    parameters: Parameters,
    #[serde(default)]
    metadata: Metadata,
    created_at: Timestamp,
    #[serde(skip)]
    resolved_handler: Option<Arc<HandlerDescriptor>>,
}

impl RequestContext {
    /// Creates a request with a freshly generated id.
    pub fn new(handler_name: impl Into<String>, parameters: Parameters) -> Result<Self, ContextError> {
        Self::from_parts(
            generate_uuid_v7().to_string(),
            handler_name,
            parameters,
            Metadata::new(),
            now(),
        )
    }

    /// Creates a request from all of its fields.
    ///
    /// Rejects an empty `id` or `handler_name`.
    pub fn from_parts(
        id: impl Into<String>,
        handler_name: impl Into<String>,
        parameters: Parameters,
        metadata: Metadata,
        created_at: Timestamp,
    ) -> Result<Self, ContextError> {
        let id = id.into();
        let handler_name = handler_name.into();
        if id.trim().is_empty() {
            return Err(ContextError::MissingId);
        }
        if handler_name.trim().is_empty() {
            return Err(ContextError::MissingHandlerName);
        }
        Ok(Self {
            id,
            handler_name,
            parameters,
            metadata,
            created_at,
            resolved_handler: None,
        })
    }

    /// Returns the request id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the name of the handler to resolve.
    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    /// Returns the parameters.
    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Returns a single parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Returns the metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns a single metadata entry.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Returns when the request was created.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns the descriptor attached by the router, if any.
    #[must_use]
    pub fn resolved_handler(&self) -> Option<&Arc<HandlerDescriptor>> {
        self.resolved_handler.as_ref()
    }

    /// Returns the correlation id, if one has been assigned.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.metadata.get(keys::TRACE_ID).and_then(Value::as_str)
    }

    /// Returns the caller-supplied deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.metadata
            .get(keys::DEADLINE_MS)
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
    }

    /// Returns the caller identity, if any.
    #[must_use]
    pub fn caller(&self) -> Option<&str> {
        self.metadata.get(keys::CALLER).and_then(Value::as_str)
    }

    /// Returns a copy with one metadata entry set.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns a copy with one parameter set.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Returns a copy with the given parameters merged in.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Returns a copy carrying a per-request deadline.
    ///
    /// The execution stage uses the smaller of this and its configured timeout.
    #[must_use]
    pub fn with_deadline(self, deadline: Duration) -> Self {
        let millis = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
        self.with_metadata(keys::DEADLINE_MS, Value::from(millis))
    }

    /// Returns a copy carrying the caller identity.
    #[must_use]
    pub fn with_caller(self, caller: impl Into<String>) -> Self {
        self.with_metadata(keys::CALLER, Value::String(caller.into()))
    }

    /// Returns a copy with the resolved descriptor attached.
    ///
    /// Also records the descriptor name under `resolved_handler` in metadata.
    #[must_use]
    pub fn with_resolved_handler(mut self, descriptor: Arc<HandlerDescriptor>) -> Self {
        self.metadata.insert(
            keys::RESOLVED_HANDLER.to_string(),
            Value::String(descriptor.name().to_string()),
        );
        self.resolved_handler = Some(descriptor);
        self
    }
}

impl PartialEq for RequestContext {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.handler_name == other.handler_name
            && self.parameters == other.parameters
            && self.metadata == other.metadata
            && self.created_at == other.created_at
            && self.resolved_handler.as_ref().map(|d| d.name())
                == other.resolved_handler.as_ref().map(|d| d.name())
    }
}
