//! Three-state circuit breaker guarding the acquisition pipeline.
//!
//! ```text
//! Closed   -> Open     : requests >= request_volume_threshold and failures >= failure_threshold
//! Open     -> HalfOpen : recovery_timeout elapsed since the last failure or the trip,
//!                       whichever is later (checked lazily)
//! HalfOpen -> Closed   : successes >= success_threshold
//! HalfOpen -> Open     : any failure
//! ```
//!
//! Counters reset on every transition.

use std::fmt;
use std::time::Duration;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::Serialize;
use tokio::time::Instant;

use super::config::CircuitBreakerConfig;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected until the recovery timeout elapses.
    Open,
    /// Requests are admitted as probes.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        })
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    requests: u32,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
    lifetime_requests: u64,
}

impl BreakerState {
    const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            requests: 0,
            last_failure: None,
            opened_at: None,
            lifetime_requests: 0,
        }
    }

    /// Start of the current recovery window.
    fn recovery_start(&self) -> Option<Instant> {
        self.last_failure.max(self.opened_at)
    }

    fn recovery_elapsed(&self, timeout: Duration) -> bool {
        self.recovery_start()
            .is_none_or(|at| at.elapsed() >= timeout)
    }

    fn transition(&mut self, to: CircuitState) {
        let from = self.state;
        self.state = to;
        self.failures = 0;
        self.successes = 0;
        self.requests = 0;
        if to == CircuitState::Open {
            self.opened_at = Some(Instant::now());
        }
        tracing::info!(
            event = "circuit_state_changed",
            from = %from,
            to = %to,
            "circuit_state_changed"
        );
    }
}

/// Point-in-time copy of the breaker's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerStats {
    /// Current state.
    pub state: CircuitState,
    /// Failures since the last transition.
    pub failures: u32,
    /// Successes since the last transition.
    pub successes: u32,
    /// Requests since the last transition.
    pub requests: u32,
    /// Requests recorded since construction or reset.
    pub lifetime_requests: u64,
    /// Milliseconds since the most recent failure.
    pub last_failure_age_ms: Option<u64>,
    /// Thresholds in force.
    pub config: CircuitBreakerConfig,
}

/// Circuit breaker owned by one orchestrator.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(BreakerState::new()),
        }
    }

    /// Thresholds in force.
    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a new call may proceed.
    ///
    /// In `Open`, returns `true` only once the recovery timeout has elapsed,
    /// moving the breaker to `HalfOpen` as a side effect.
    pub fn allow_request(&self) -> bool {
        let guard = self.state.upgradable_read();
        match guard.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if !guard.recovery_elapsed(self.config.recovery_timeout) {
                    return false;
                }
                let mut state = RwLockUpgradableReadGuard::upgrade(guard);
                state.transition(CircuitState::HalfOpen);
                true
            }
        }
    }

    /// Records a handled outcome.
    pub fn record_success(&self) {
        let mut state = self.state.write();
        state.successes = state.successes.saturating_add(1);
        state.requests = state.requests.saturating_add(1);
        state.lifetime_requests = state.lifetime_requests.saturating_add(1);

        match state.state {
            CircuitState::HalfOpen if state.successes >= self.config.success_threshold => {
                state.transition(CircuitState::Closed);
            }
            CircuitState::Closed => self.maybe_trip(&mut state),
            _ => {}
        }
    }

    /// Records a failed outcome.
    pub fn record_failure(&self) {
        let mut state = self.state.write();
        state.failures = state.failures.saturating_add(1);
        state.requests = state.requests.saturating_add(1);
        state.lifetime_requests = state.lifetime_requests.saturating_add(1);
        state.last_failure = Some(Instant::now());

        match state.state {
            CircuitState::HalfOpen => state.transition(CircuitState::Open),
            CircuitState::Closed => self.maybe_trip(&mut state),
            CircuitState::Open => {}
        }
    }

    fn maybe_trip(&self, state: &mut BreakerState) {
        if state.requests >= self.config.request_volume_threshold
            && state.failures >= self.config.failure_threshold
        {
            tracing::warn!(
                event = "circuit_tripped",
                failures = state.failures,
                requests = state.requests,
                "circuit_tripped"
            );
            state.transition(CircuitState::Open);
        }
    }

    /// Current state. Does not perform the lazy `Open -> HalfOpen` transition.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state.read().state
    }

    /// Time left before an open breaker admits a probe.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        let state = self.state.read();
        if state.state != CircuitState::Open {
            return None;
        }
        state
            .recovery_start()
            .map(|at| self.config.recovery_timeout.saturating_sub(at.elapsed()))
    }

    /// Copy of the current counters.
    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let state = self.state.read();
        CircuitBreakerStats {
            state: state.state,
            failures: state.failures,
            successes: state.successes,
            requests: state.requests,
            lifetime_requests: state.lifetime_requests,
            last_failure_age_ms: state
                .last_failure
                .map(|at| u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX)),
            config: self.config.clone(),
        }
    }

    /// Returns the breaker to a fresh closed state.
    pub fn reset(&self) {
        *self.state.write() = BreakerState::new();
        tracing::info!(event = "circuit_reset", "circuit_reset");
    }
}
