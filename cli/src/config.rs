//! Configuration file loading and command-line overrides.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use nlq_resilience::acquisition::{
    CircuitBreakerConfig, ConfigError, OrchestratorOptions, RetryConfig,
};
use serde::{Deserialize, Serialize};

/// Everything the binary needs to build an orchestrator.
///
/// Every section is optional in the file; missing fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Retry policy.
    pub retry: RetryConfig,
    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Orchestrator options.
    pub options: OrchestratorOptions,
}

/// Per-field overrides taken from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replaces `retry.max_retries`.
    pub max_retries: Option<u32>,
    /// Replaces `retry.retry_delay`.
    pub retry_delay_ms: Option<u64>,
    /// Replaces `retry.confidence_threshold`.
    pub confidence_threshold: Option<f64>,
    /// Enables re-prompting with the default template.
    pub reprompt: bool,
    /// Replaces `options.max_raw_length`.
    pub max_raw_length: Option<usize>,
    /// Disables the fallback synthesizer.
    pub no_fallback: bool,
}

impl AppConfig {
    /// Loads `path` if given, otherwise returns defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Could not parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Applies command-line overrides on top of the loaded values.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(max) = overrides.max_retries {
            self.retry.max_retries = max;
        }
        if let Some(delay) = overrides.retry_delay_ms {
            self.retry.retry_delay = Duration::from_millis(delay);
        }
        if let Some(threshold) = overrides.confidence_threshold {
            self.retry.confidence_threshold = threshold;
        }
        if overrides.reprompt && !self.retry.enable_reprompting {
            self.retry = self.retry.with_default_reprompting();
        }
        if let Some(max) = overrides.max_raw_length {
            self.options.max_raw_length = max;
        }
        if overrides.no_fallback {
            self.options.enable_fallback = false;
        }
        self
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.circuit_breaker.validate()
    }
}
