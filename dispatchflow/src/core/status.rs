//! Response status, error kinds and the per-dispatch state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome status carried by a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// The handler ran and produced a payload.
    Success,
    /// Some stage produced a structured error.
    Error,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The kind of error carried by an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The handler name could not be resolved by the registry.
    NotFound,
    /// One or more parameters violated the handler schema.
    Validation,
    /// The handler failed or panicked.
    Execution,
    /// The handler did not finish before its deadline.
    Timeout,
    /// Internal observability failure. Never placed on a response.
    Observability,
}

impl ErrorKind {
    /// Returns the taxonomy name of this kind (e.g. `RoutingError`).
    #[must_use]
    pub const fn error_name(&self) -> &'static str {
        match self {
            Self::NotFound => "RoutingError",
            Self::Validation => "ValidationError",
            Self::Execution => "ExecutionError",
            Self::Timeout => "TimeoutError",
            Self::Observability => "ObservabilityError",
        }
    }

    /// Returns true if a failed dispatch of this kind may succeed when retried.
    ///
    /// Routing and validation failures are deterministic for a given request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Execution | Self::Timeout)
    }

    /// Returns the dispatch state in which this kind of error is produced.
    #[must_use]
    pub const fn failing_state(&self) -> DispatchState {
        match self {
            Self::NotFound => DispatchState::Routing,
            Self::Validation => DispatchState::Validating,
            Self::Execution | Self::Timeout | Self::Observability => DispatchState::Executing,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Validation => write!(f, "validation"),
            Self::Execution => write!(f, "execution"),
            Self::Timeout => write!(f, "timeout"),
            Self::Observability => write!(f, "observability"),
        }
    }
}

/// Lifecycle of a single dispatch.
///
/// `Created -> Routing -> Validating -> Executing -> {Completed | Failed}`.
/// Any non-terminal state may move straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// The request context exists but has not entered the pipeline.
    Created,
    /// The router is resolving the handler.
    Routing,
    /// Parameters are being checked against the schema.
    Validating,
    /// The handler is running.
    Executing,
    /// The handler produced a payload.
    Completed,
    /// Some stage produced an error response.
    Failed,
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::Created
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Routing => write!(f, "routing"),
            Self::Validating => write!(f, "validating"),
            Self::Executing => write!(f, "executing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl DispatchState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Completed | Self::Failed, _) => false,
            (_, Self::Failed) => true,
            (Self::Created, Self::Routing)
            | (Self::Routing, Self::Validating)
            | (Self::Validating, Self::Executing)
            | (Self::Executing, Self::Completed) => true,
            _ => false,
        }
    }
}
