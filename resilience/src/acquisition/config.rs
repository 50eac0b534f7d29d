//! Configuration for retry, circuit-breaker and orchestrator behavior.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Template used by [`RetryConfig::with_default_reprompting`]. `{query}` is
/// replaced with the user's original question.
pub const DEFAULT_REPROMPT_TEMPLATE: &str = r"Your previous answer could not be turned into an audit-log query with enough confidence.

Answer again with ONLY a JSON object describing the query. Use the fields
log_source, verb, resource, namespace, user, timeframe, limit, response_status.

Question: {query}";

/// Retry behavior for a single acquisition call.
///
/// Immutable once validated; the orchestrator replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra passes over the strategy chain after the first (default: 2).
    pub max_retries: u32,
    /// Pause between passes (default: 500ms).
    #[serde(rename = "retry_delay_ms", with = "duration_ms")]
    pub retry_delay: Duration,
    /// Minimum confidence for immediate acceptance (default: 0.7).
    pub confidence_threshold: f64,
    /// Whether low-confidence results trigger a re-prompt (default: false).
    pub enable_reprompting: bool,
    /// Re-prompt template with a single `{query}` placeholder.
    pub reprompt_template: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            confidence_threshold: 0.7,
            enable_reprompting: false,
            reprompt_template: String::new(),
        }
    }
}

impl RetryConfig {
    /// Builds a config from signed inputs, rejecting negative counts and delays.
    pub fn from_signed(
        max_retries: i64,
        retry_delay_ms: i64,
        confidence_threshold: f64,
        enable_reprompting: bool,
        reprompt_template: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let max_retries = u32::try_from(max_retries).map_err(|_| ConfigError::Negative {
            field: "max_retries",
            value: max_retries,
        })?;
        let retry_delay = u64::try_from(retry_delay_ms).map_err(|_| ConfigError::Negative {
            field: "retry_delay",
            value: retry_delay_ms,
        })?;
        let config = Self {
            max_retries,
            retry_delay: Duration::from_millis(retry_delay),
            confidence_threshold,
            enable_reprompting,
            reprompt_template: reprompt_template.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the threshold range and the re-prompt template requirement.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err(ConfigError::ThresholdOutOfRange(self.confidence_threshold));
        }
        if self.enable_reprompting && self.reprompt_template.trim().is_empty() {
            return Err(ConfigError::MissingRepromptTemplate);
        }
        Ok(())
    }

    /// Total passes over the strategy chain.
    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Set the number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the delay between attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the acceptance threshold.
    #[must_use]
    pub const fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Enable re-prompting with the given template.
    #[must_use]
    pub fn with_reprompting(mut self, template: impl Into<String>) -> Self {
        self.enable_reprompting = true;
        self.reprompt_template = template.into();
        self
    }

    /// Enable re-prompting with [`DEFAULT_REPROMPT_TEMPLATE`].
    #[must_use]
    pub fn with_default_reprompting(self) -> Self {
        self.with_reprompting(DEFAULT_REPROMPT_TEMPLATE)
    }
}

/// Thresholds driving the circuit breaker's state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures while closed before the breaker opens (default: 5).
    pub failure_threshold: u32,
    /// How long the breaker stays open before probing (default: 30s).
    #[serde(rename = "recovery_timeout_ms", with = "duration_ms")]
    pub recovery_timeout: Duration,
    /// Minimum requests observed before the breaker may open (default: 10).
    pub request_volume_threshold: u32,
    /// Consecutive half-open successes needed to close (default: 3).
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            request_volume_threshold: 10,
            success_threshold: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Rejects zero-valued thresholds and timeouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Zero {
                field: "failure_threshold",
            });
        }
        if self.recovery_timeout.is_zero() {
            return Err(ConfigError::Zero {
                field: "recovery_timeout",
            });
        }
        if self.request_volume_threshold == 0 {
            return Err(ConfigError::Zero {
                field: "request_volume_threshold",
            });
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::Zero {
                field: "success_threshold",
            });
        }
        Ok(())
    }

    /// Set the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the recovery timeout.
    #[must_use]
    pub const fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Set the request volume threshold.
    #[must_use]
    pub const fn with_request_volume_threshold(mut self, threshold: u32) -> Self {
        self.request_volume_threshold = threshold;
        self
    }

    /// Set the half-open success threshold.
    #[must_use]
    pub const fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }
}

/// Orchestrator-wide knobs that are not part of the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorOptions {
    /// Truncate raw content to this many characters before parsing (0 = unlimited).
    pub max_raw_length: usize,
    /// Whether the fallback synthesizer runs when every strategy fails (default: true).
    pub enable_fallback: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_raw_length: 0,
            enable_fallback: true,
        }
    }
}

impl OrchestratorOptions {
    /// Set the maximum raw content length.
    #[must_use]
    pub const fn with_max_raw_length(mut self, max: usize) -> Self {
        self.max_raw_length = max;
        self
    }

    /// Enable or disable the fallback path.
    #[must_use]
    pub const fn with_fallback(mut self, enabled: bool) -> Self {
        self.enable_fallback = enabled;
        self
    }
}

/// Serializes a [`Duration`] as whole milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
