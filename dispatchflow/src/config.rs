//! Pipeline configuration.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding [`PipelineConfig::timeout_ms`].
pub const ENV_TIMEOUT_MS: &str = "DISPATCHFLOW_TIMEOUT_MS";
/// Environment variable overriding [`PipelineConfig::sampling_rate`].
pub const ENV_SAMPLING_RATE: &str = "DISPATCHFLOW_SAMPLING_RATE";
/// Environment variable overriding [`PipelineConfig::strict_validation`].
pub const ENV_STRICT_VALIDATION: &str = "DISPATCHFLOW_STRICT_VALIDATION";

/// Configuration recognized by the standard interceptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Per-call handler deadline in milliseconds. There is no "no timeout" value.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Fraction of requests that get a full tracing span.
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    /// Reject parameters the handler schema does not declare.
    #[serde(default)]
    pub strict_validation: bool,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_sampling_rate() -> f64 {
    1.0
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            sampling_rate: default_sampling_rate(),
            strict_validation: false,
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-call deadline in milliseconds.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the sampling rate.
    #[must_use]
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate;
        self
    }

    /// Enables or disables strict validation.
    #[must_use]
    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    /// Returns the per-call deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Checks the configured values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(ConfigError::SamplingRateOutOfRange(self.sampling_rate));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|var| std::env::var(var).ok())
    }

    /// Applies overrides from a variable lookup, then validates.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = parse_env(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SAMPLING_RATE) {
            self.sampling_rate = parse_env(ENV_SAMPLING_RATE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STRICT_VALIDATION) {
            self.strict_validation = match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: ENV_STRICT_VALIDATION.to_string(),
                        value: raw,
                    })
                }
            };
        }
        self.validate()?;
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: raw.to_string(),
    })
}
