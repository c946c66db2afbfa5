//! Structured logging setup using `tracing-subscriber`.
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: ERROR, WARN, INFO, DEBUG or TRACE. Defaults to INFO.
//! - `LOG_FORMAT`: json, pretty or compact. Defaults to json.
//! - `RUST_LOG`: overrides filtering entirely (env-filter syntax).
//!
//! Initialization is idempotent: if a global subscriber is already installed
//! (by the host application or an earlier call) the call is a no-op.

use std::env;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line, human-readable output.
    Pretty,
    /// Single-line terminal output.
    Compact,
}

impl LogFormat {
    /// Parses a format name. Unknown names fall back to JSON.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }
}

/// Parses a level name. Unknown names fall back to INFO.
#[must_use]
pub fn parse_level(s: &str) -> Level {
    match s.to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

fn filter_for(level: Level) -> EnvFilter {
    if let Ok(rust_log) = env::var("RUST_LOG") {
        return EnvFilter::new(rust_log);
    }
    let filter = EnvFilter::new(level.to_string());
    match "tokio=warn".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Installs a global subscriber with the given format and level.
///
/// Returns false if a subscriber was already installed.
pub fn init_logging(format: LogFormat, level: Level) -> bool {
    let registry = tracing_subscriber::registry().with(filter_for(level));

    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
    };
    result.is_ok()
}

/// Installs a global subscriber configured from the environment.
pub fn init_default_logging() -> bool {
    let level = env::var("LOG_LEVEL").map_or(Level::INFO, |value| parse_level(&value));
    let format = env::var("LOG_FORMAT").map_or(LogFormat::Json, |value| LogFormat::parse(&value));
    init_logging(format, level)
}
