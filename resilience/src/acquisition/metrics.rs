//! Metrics accumulated across acquisition calls.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use super::config::duration_ms;
use super::types::{RetryResult, Strategy};

/// Number of most recent latencies kept for percentile estimates.
pub const LATENCY_WINDOW: usize = 1000;

/// Snapshot of the collector, detached from live state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryMetrics {
    /// Parser and re-prompt outcomes recorded.
    pub total_attempts: u64,
    /// Calls that returned a parsed query (immediate or best-so-far).
    pub successes: u64,
    /// Attempts that produced no query.
    pub failures: u64,
    /// Calls answered by the fallback synthesizer.
    pub fallback_used: u64,
    /// Calls refused by the circuit breaker.
    pub breaker_rejections: u64,
    /// Parser invocations per strategy.
    pub strategy_usage: BTreeMap<Strategy, u64>,
    /// Accepted results divided by invocations, per strategy.
    pub strategy_success_rate: BTreeMap<Strategy, f64>,
    /// Mean latency over every recorded attempt.
    #[serde(rename = "average_latency_ms", with = "duration_ms")]
    pub average_latency: Duration,
    /// 95th percentile over the rolling window.
    #[serde(rename = "p95_latency_ms", with = "duration_ms")]
    pub p95_latency: Duration,
    /// 99th percentile over the rolling window.
    #[serde(rename = "p99_latency_ms", with = "duration_ms")]
    pub p99_latency: Duration,
    /// Samples currently in the rolling window.
    pub latency_samples: usize,
    /// Attempts per second since start or last reset.
    pub throughput_per_sec: f64,
    /// Failure tally per distinct error message.
    pub error_counts: BTreeMap<String, u64>,
    /// Failure tally per model type.
    pub model_type_failures: BTreeMap<String, u64>,
}

#[derive(Debug)]
struct MetricsState {
    total_attempts: u64,
    successes: u64,
    failures: u64,
    fallback_used: u64,
    breaker_rejections: u64,
    strategy_usage: HashMap<Strategy, u64>,
    strategy_successes: HashMap<Strategy, u64>,
    latencies: VecDeque<Duration>,
    total_latency: Duration,
    error_counts: HashMap<String, u64>,
    model_type_failures: HashMap<String, u64>,
    started_at: Instant,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            total_attempts: 0,
            successes: 0,
            failures: 0,
            fallback_used: 0,
            breaker_rejections: 0,
            strategy_usage: HashMap::new(),
            strategy_successes: HashMap::new(),
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
            total_latency: Duration::ZERO,
            error_counts: HashMap::new(),
            model_type_failures: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    fn push_latency(&mut self, latency: Duration) {
        self.total_latency = self.total_latency.saturating_add(latency);
        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency);
    }
}

/// Thread-safe metrics collector owned by one orchestrator.
#[derive(Debug)]
pub struct MetricsCollector {
    state: Mutex<MetricsState>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Creates an empty collector; throughput is measured from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MetricsState::new()),
        }
    }

    /// Counts one parser invocation for `strategy`.
    pub fn record_strategy_use(&self, strategy: Strategy) {
        *self.state.lock().strategy_usage.entry(strategy).or_default() += 1;
    }

    /// Records one parser or re-prompt outcome.
    ///
    /// Failed outcomes are tallied by error message and by `model_type`.
    pub fn record_attempt(&self, result: &RetryResult, model_type: &str) {
        let mut state = self.state.lock();
        state.total_attempts += 1;
        state.push_latency(result.duration);
        if result.success {
            return;
        }
        state.failures += 1;
        let message = result
            .error
            .as_ref()
            .map_or_else(|| "unknown error".to_string(), |error| error.message.clone());
        *state.error_counts.entry(message).or_default() += 1;
        *state
            .model_type_failures
            .entry(model_type.to_string())
            .or_default() += 1;
    }

    /// Records a call that returned a parsed query from `strategy`.
    pub fn record_success(&self, strategy: Strategy) {
        let mut state = self.state.lock();
        state.successes += 1;
        *state.strategy_successes.entry(strategy).or_default() += 1;
    }

    /// Records a call answered by the fallback synthesizer.
    pub fn record_fallback(&self) {
        self.state.lock().fallback_used += 1;
    }

    /// Records a call refused by the circuit breaker.
    pub fn record_breaker_rejection(&self) {
        self.state.lock().breaker_rejections += 1;
    }

    /// Detached copy with derived averages, percentiles and throughput.
    #[must_use]
    pub fn snapshot(&self) -> RetryMetrics {
        let state = self.state.lock();

        let mut window: Vec<Duration> = state.latencies.iter().copied().collect();
        window.sort_unstable();

        let average_latency = if state.total_attempts == 0 {
            Duration::ZERO
        } else {
            let nanos = state.total_latency.as_nanos() / u128::from(state.total_attempts);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        };

        let elapsed = state.started_at.elapsed().as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let throughput_per_sec = if elapsed > 0.0 {
            state.total_attempts as f64 / elapsed
        } else {
            0.0
        };

        #[allow(clippy::cast_precision_loss)]
        let strategy_success_rate = state
            .strategy_usage
            .iter()
            .map(|(strategy, &used)| {
                let accepted = state.strategy_successes.get(strategy).copied().unwrap_or(0);
                let rate = if used == 0 {
                    0.0
                } else {
                    (accepted as f64 / used as f64).min(1.0)
                };
                (*strategy, rate)
            })
            .collect();

        RetryMetrics {
            total_attempts: state.total_attempts,
            successes: state.successes,
            failures: state.failures,
            fallback_used: state.fallback_used,
            breaker_rejections: state.breaker_rejections,
            strategy_usage: state.strategy_usage.iter().map(|(k, v)| (*k, *v)).collect(),
            strategy_success_rate,
            average_latency,
            p95_latency: percentile(&window, 95),
            p99_latency: percentile(&window, 99),
            latency_samples: window.len(),
            throughput_per_sec,
            error_counts: state.error_counts.clone().into_iter().collect(),
            model_type_failures: state.model_type_failures.clone().into_iter().collect(),
        }
    }

    /// Clears every counter and restarts the throughput clock.
    pub fn reset(&self) {
        *self.state.lock() = MetricsState::new();
    }
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}
