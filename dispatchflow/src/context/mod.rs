//! Request and response contexts.
//!
//! This module provides:
//! - The immutable `RequestContext` created at the pipeline boundary
//! - The immutable `ResponseContext` returned to the caller
//! - Well-known metadata keys shared by the standard interceptors

mod request;
mod response;

pub use request::RequestContext;
pub use response::ResponseContext;

/// Ordered parameter mapping with unique keys.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Auxiliary key/value annotations on a context.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Well-known metadata keys.
pub mod keys {
    /// Correlation id shared by every stage of a dispatch.
    pub const TRACE_ID: &str = "trace_id";
    /// Per-request deadline in milliseconds.
    pub const DEADLINE_MS: &str = "deadline_ms";
    /// Caller identity.
    pub const CALLER: &str = "caller";
    /// Name of the descriptor the router resolved.
    pub const RESOLVED_HANDLER: &str = "resolved_handler";
    /// Validation report.
    pub const VALIDATION: &str = "validation";
    /// Total dispatch duration in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";
    /// `success` or the error kind.
    pub const OUTCOME: &str = "outcome";
    /// Whether the dispatch was fully traced.
    pub const SAMPLED: &str = "sampled";
    /// Cause chain of an execution error.
    pub const CAUSE: &str = "cause";
    /// Number of attempts made by the retry interceptor.
    pub const ATTEMPTS: &str = "attempts";
    /// Dispatch state in which an error response was produced.
    pub const FAILED_STAGE: &str = "failed_stage";
    /// Calling convention of the executed handler.
    pub const CALLING_CONVENTION: &str = "calling_convention";
}
