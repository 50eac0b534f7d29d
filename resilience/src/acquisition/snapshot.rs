//! Serializable view of an orchestrator for telemetry export.

use serde::Serialize;

use super::circuit_breaker::CircuitBreakerStats;
use super::config::{OrchestratorOptions, RetryConfig};
use super::metrics::RetryMetrics;
use super::types::Strategy;

/// Echoed configuration, live metrics and breaker state at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    /// Retry policy in force.
    pub retry_config: RetryConfig,
    /// Orchestrator options in force.
    pub options: OrchestratorOptions,
    /// Strategies with a registered parser, in chain order.
    pub registered_strategies: Vec<Strategy>,
    /// Metrics accumulated since start or last reset.
    pub metrics: RetryMetrics,
    /// Breaker state and thresholds.
    pub circuit_breaker: CircuitBreakerStats,
}

impl TelemetrySnapshot {
    /// Renders the snapshot as a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
