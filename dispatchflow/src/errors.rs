//! Error types for the dispatchflow pipeline.
//!
//! Two families live here. Construction-time errors (`PipelineValidationError`,
//! `ConfigError`, `ContextError`, `RegistryError`) are returned as `Err` to the
//! assembler. Dispatch-time failures never escape as `Err`: they are carried
//! inside a response as a [`ResponseError`].

use crate::core::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// The main error type for dispatchflow construction-time operations.
#[derive(Debug, Error)]
pub enum DispatchflowError {
    /// The pipeline failed validation at build time.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// The configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A context could not be constructed.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// The handler registry rejected an operation.
    #[error("{0}")]
    Registry(#[from] RegistryError),
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PIPELINE-NO-TERMINAL").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline fails validation in `build()`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The interceptors involved in the error.
    pub interceptors: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            interceptors: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the interceptors involved.
    #[must_use]
    pub fn with_interceptors(mut self, interceptors: Vec<String>) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Invalid pipeline configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// The per-call deadline must be positive.
    #[error("timeout_ms must be greater than zero")]
    ZeroTimeout,

    /// The sampling rate must be within `[0.0, 1.0]`.
    #[error("sampling_rate must be within [0.0, 1.0], got {0}")]
    SamplingRateOutOfRange(f64),

    /// An environment override could not be parsed.
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv {
        /// The environment variable name.
        var: String,
        /// The raw value.
        value: String,
    },

    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// A context could not be constructed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    /// The request id was empty.
    #[error("request context requires a non-empty id")]
    MissingId,

    /// The handler name was empty.
    #[error("request context requires a non-empty handler name")]
    MissingHandlerName,
}

/// The handler registry rejected a registration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// An alias or pattern pointed at a handler that is not registered.
    #[error("'{alias}' refers to unknown handler '{target}'")]
    UnknownTarget {
        /// The alias or pattern being registered.
        alias: String,
        /// The missing handler name.
        target: String,
    },

    /// A pattern could not be compiled.
    #[error("invalid handler pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern source.
        pattern: String,
        /// The compile error.
        reason: String,
    },
}

/// Internal observability failure, e.g. an unreachable metrics sink.
///
/// Always swallowed by the observability interceptor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("observability failure: {message}")]
pub struct ObservabilityError {
    /// Description of the failure.
    pub message: String,
}

impl ObservabilityError {
    /// Creates a new observability error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// The offending parameter name.
    pub field: String,
    /// Why the parameter was rejected.
    pub reason: String,
}

impl FieldViolation {
    /// Creates a new field violation.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// The structured error carried by an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    /// The error kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// The original cause, if any, rendered with its full chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Every violated field for validation errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

impl ResponseError {
    /// Creates a new response error.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            violations: Vec::new(),
        }
    }

    /// Creates a routing error for an unresolved handler name.
    #[must_use]
    pub fn not_found(handler_name: &str) -> Self {
        Self::new(
            ErrorKind::NotFound,
            format!("no handler registered for '{handler_name}'"),
        )
    }

    /// Creates a validation error listing every violation.
    #[must_use]
    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        let message = format!("invalid parameters: {}", fields.join(", "));
        Self {
            violations,
            ..Self::new(ErrorKind::Validation, message)
        }
    }

    /// Creates an execution error with an optional cause.
    #[must_use]
    pub fn execution(message: impl Into<String>, cause: Option<String>) -> Self {
        Self {
            cause,
            ..Self::new(ErrorKind::Execution, message)
        }
    }

    /// Creates a timeout error for the given deadline.
    #[must_use]
    pub fn timeout(handler_name: &str, deadline: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!(
                "handler '{handler_name}' did not complete within {}ms",
                deadline.as_millis()
            ),
        )
    }

    /// Returns the taxonomy name (e.g. `ValidationError`).
    #[must_use]
    pub const fn error_name(&self) -> &'static str {
        self.kind.error_name()
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.error_name()));
        map.insert("kind".to_string(), serde_json::json!(self.kind));
        map.insert("message".to_string(), serde_json::json!(self.message));
        if let Some(ref cause) = self.cause {
            map.insert("cause".to_string(), serde_json::json!(cause));
        }
        if !self.violations.is_empty() {
            map.insert("violations".to_string(), serde_json::json!(self.violations));
        }
        map
    }
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_name(), self.message)
    }
}
