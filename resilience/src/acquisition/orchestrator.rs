//! Top-level retry driver composing parsers, breaker, re-prompting and fallback.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::Instant;

use super::circuit_breaker::CircuitBreaker;
use super::collaborators::{ContextManager, FallbackHandler, GenerationEngine, QueryParser};
use super::config::{CircuitBreakerConfig, OrchestratorOptions, RetryConfig};
use super::context::CallContext;
use super::error::{AcquisitionError, ParsingError};
use super::fallback::synthesize_fallback;
use super::feedback::exhaustion_suggestions;
use super::metrics::MetricsCollector;
use super::registry::StrategyRegistry;
use super::reprompt::{RepromptCoordinator, RepromptRequest};
use super::snapshot::TelemetrySnapshot;
use super::truncate_content;
use super::types::{RawResponse, RetryResult, Strategy, StructuredQuery};

/// How an accepted query was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionTier {
    /// A strategy (or re-prompt) cleared the confidence threshold.
    Accepted,
    /// No result cleared the threshold; the best one was used.
    Degraded,
    /// Every strategy failed; the fallback synthesizer answered.
    Fallback,
}

/// A successful acquisition with its provenance.
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// The query handed back to the caller.
    pub query: StructuredQuery,
    /// How it was obtained.
    pub tier: AcquisitionTier,
    /// Strategy behind the query; `None` for fallback results.
    pub strategy: Option<Strategy>,
    /// Confidence of the query; zero for fallback results.
    pub confidence: f64,
    /// Every strategy and re-prompt outcome of the call, in order.
    pub history: Vec<RetryResult>,
    /// Wall time of the call.
    pub elapsed: Duration,
}

/// Resilient parser driver.
///
/// Safe to share across tasks: per-call state lives on the stack of
/// [`parse_with_retry`](Self::parse_with_retry); the breaker and metrics are
/// internally synchronized.
pub struct RetryOrchestrator {
    registry: RwLock<StrategyRegistry>,
    config: RwLock<RetryConfig>,
    options: OrchestratorOptions,
    breaker: CircuitBreaker,
    metrics: MetricsCollector,
    reprompter: Option<RepromptCoordinator>,
    fallback_handler: Option<Arc<dyn FallbackHandler>>,
}

impl fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("registry", &*self.registry.read())
            .field("config", &*self.config.read())
            .field("options", &self.options)
            .field("breaker", &self.breaker)
            .field("reprompter", &self.reprompter)
            .field("has_fallback_handler", &self.fallback_handler.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for RetryOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryOrchestrator {
    /// Orchestrator with default configuration and no parsers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(StrategyRegistry::new()),
            config: RwLock::new(RetryConfig::default()),
            options: OrchestratorOptions::default(),
            breaker: CircuitBreaker::default(),
            metrics: MetricsCollector::new(),
            reprompter: None,
            fallback_handler: None,
        }
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder() -> RetryOrchestratorBuilder {
        RetryOrchestratorBuilder::default()
    }

    /// Registers `parser` for `strategy`, replacing any previous one.
    pub fn register_parser(&self, strategy: Strategy, parser: Arc<dyn QueryParser>) {
        self.registry.write().register(strategy, parser);
    }

    /// Replaces the retry configuration wholesale. Calls already running keep
    /// the configuration they started with.
    pub fn update_config(&self, config: RetryConfig) -> Result<(), AcquisitionError> {
        config.validate()?;
        *self.config.write() = config;
        Ok(())
    }

    /// Copy of the active retry configuration.
    #[must_use]
    pub fn config(&self) -> RetryConfig {
        self.config.read().clone()
    }

    /// The orchestrator's circuit breaker.
    #[must_use]
    pub const fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The orchestrator's metrics collector.
    #[must_use]
    pub const fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Clears accumulated metrics.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Configuration, metrics and breaker state for telemetry export.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            retry_config: self.config(),
            options: self.options.clone(),
            registered_strategies: self.registry.read().registered(),
            metrics: self.metrics.snapshot(),
            circuit_breaker: self.breaker.stats(),
        }
    }

    /// Parses `raw` into a structured query, retrying and degrading as needed.
    ///
    /// `None` for `raw` is a caller error and fails immediately.
    ///
    /// # Errors
    ///
    /// - [`AcquisitionError::MissingResponse`] when `raw` is `None`.
    /// - [`AcquisitionError::ServiceUnavailable`] when the breaker is open.
    /// - [`AcquisitionError::Cancelled`] / [`AcquisitionError::DeadlineExceeded`]
    ///   when `ctx` interrupts the call.
    /// - [`AcquisitionError::Parsing`] or [`AcquisitionError::Exhausted`] when
    ///   nothing succeeded and the fallback path is disabled.
    pub async fn parse_with_retry(
        &self,
        ctx: &CallContext,
        raw: Option<&RawResponse>,
        model_type: &str,
        original_query: &str,
        session_id: &str,
    ) -> Result<StructuredQuery, AcquisitionError> {
        self.acquire(ctx, raw, model_type, original_query, session_id)
            .await
            .map(|acquisition| acquisition.query)
    }

    /// Like [`parse_with_retry`](Self::parse_with_retry) but also reports the
    /// tier, confidence and per-attempt history.
    #[tracing::instrument(
        name = "parse_with_retry",
        skip_all,
        fields(model_type = %model_type, session_id = %session_id)
    )]
    pub async fn acquire(
        &self,
        ctx: &CallContext,
        raw: Option<&RawResponse>,
        model_type: &str,
        original_query: &str,
        session_id: &str,
    ) -> Result<Acquisition, AcquisitionError> {
        let start = Instant::now();

        let Some(raw) = raw else {
            tracing::warn!(event = "missing_response", "missing_response");
            return Err(AcquisitionError::MissingResponse);
        };

        if !self.breaker.allow_request() {
            self.metrics.record_breaker_rejection();
            let retry_after = self.breaker.retry_after();
            tracing::warn!(
                event = "breaker_rejected",
                retry_after_ms = retry_after.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                "breaker_rejected"
            );
            return Err(AcquisitionError::ServiceUnavailable { retry_after });
        }

        let config = self.config();
        let registry = self.registry.read().clone();
        let content = truncate_content(&raw.content, self.options.max_raw_length);
        if content.len() < raw.content.len() {
            tracing::debug!(
                event = "content_truncated",
                original_len = raw.content.len(),
                truncated_len = content.len(),
                "content_truncated"
            );
        }

        let mut state = CallState::default();
        let total_attempts = config.total_attempts();

        'attempts: for attempt in 1..=total_attempts {
            for strategy in Strategy::ORDERED {
                let Some(parser) = registry.get(strategy) else {
                    state.skip(ParsingError::unregistered(strategy, attempt));
                    continue;
                };
                if !strategy.is_model_agnostic() && !parser.can_handle(model_type) {
                    state.skip(ParsingError::incompatible(strategy, attempt, model_type));
                    continue;
                }

                ctx.check()?;
                self.metrics.record_strategy_use(strategy);
                let result = run_parser(&**parser, strategy, content, model_type, attempt);
                self.metrics.record_attempt(&result, model_type);
                tracing::debug!(
                    event = "strategy_attempted",
                    strategy = %strategy,
                    attempt,
                    success = result.success,
                    confidence = result.confidence,
                    "strategy_attempted"
                );

                if !result.success {
                    if state.fail(result, config.confidence_threshold) {
                        continue;
                    }
                    break 'attempts;
                }

                if result.confidence >= config.confidence_threshold {
                    state.history.push(result.clone());
                    return Ok(self.accept(result, AcquisitionTier::Accepted, state.history, start));
                }

                state.consider(result);

                if config.enable_reprompting {
                    if let Some(reprompter) = &self.reprompter {
                        let request = RepromptRequest {
                            template: &config.reprompt_template,
                            original_query,
                            session_id,
                            model_type,
                            strategy,
                            parser,
                            attempt,
                            max_raw_length: self.options.max_raw_length,
                        };
                        if let Some(result) = reprompter.reprompt(ctx, request).await? {
                            self.metrics.record_attempt(&result, model_type);
                            if result.success && result.confidence >= config.confidence_threshold {
                                state.history.push(result.clone());
                                return Ok(self.accept(
                                    result,
                                    AcquisitionTier::Accepted,
                                    state.history,
                                    start,
                                ));
                            }
                            if result.success {
                                state.consider(result);
                            } else if !state.fail(result, config.confidence_threshold) {
                                break 'attempts;
                            }
                        }
                    }
                }
            }

            if attempt < total_attempts {
                ctx.sleep(config.retry_delay).await?;
            }
        }

        if let Some(best) = state.best.take() {
            tracing::info!(
                event = "best_effort_accepted",
                strategy = %best.strategy,
                confidence = best.confidence,
                threshold = config.confidence_threshold,
                "best_effort_accepted"
            );
            return Ok(self.accept(best, AcquisitionTier::Degraded, state.history, start));
        }

        if self.options.enable_fallback {
            let query = self
                .fallback_handler
                .as_ref()
                .and_then(|handler| handler.synthesize(content, original_query, model_type))
                .unwrap_or_else(|| synthesize_fallback(content, original_query));
            let elapsed = start.elapsed();
            self.metrics.record_fallback();
            self.breaker.record_success();
            tracing::warn!(
                event = "fallback_used",
                log_source = %query.log_source,
                timeframe = %query.timeframe,
                attempts = total_attempts,
                "fallback_used"
            );
            return Ok(Acquisition {
                query,
                tier: AcquisitionTier::Fallback,
                strategy: None,
                confidence: 0.0,
                history: state.history,
                elapsed,
            });
        }

        let error = match state.last_error {
            Some(error) => AcquisitionError::Parsing(error),
            None => AcquisitionError::Exhausted {
                strategies: Strategy::ORDERED.to_vec(),
                attempts: total_attempts,
                suggestions: exhaustion_suggestions(&registry.registered(), &config),
            },
        };
        self.breaker.record_failure();
        tracing::warn!(
            event = "acquisition_exhausted",
            attempts = total_attempts,
            error = %error,
            "acquisition_exhausted"
        );
        Err(error)
    }

    fn accept(
        &self,
        result: RetryResult,
        tier: AcquisitionTier,
        history: Vec<RetryResult>,
        start: Instant,
    ) -> Acquisition {
        let elapsed = start.elapsed();
        self.metrics.record_success(result.strategy);
        self.breaker.record_success();
        tracing::info!(
            event = "query_accepted",
            strategy = %result.strategy,
            attempt = result.attempt_number,
            confidence = result.confidence,
            tier = ?tier,
            "query_accepted"
        );
        Acquisition {
            // A successful RetryResult always carries a query.
            query: result.query.unwrap_or_default(),
            tier,
            strategy: Some(result.strategy),
            confidence: result.confidence,
            history,
            elapsed,
        }
    }
}

/// Mutable state scoped to one call.
#[derive(Default)]
struct CallState {
    best: Option<RetryResult>,
    last_error: Option<ParsingError>,
    history: Vec<RetryResult>,
}

impl CallState {
    fn skip(&mut self, error: ParsingError) {
        tracing::debug!(
            event = "strategy_skipped",
            strategy = %error.strategy,
            attempt = error.attempt,
            reason = %error.message,
            "strategy_skipped"
        );
        self.history.push(RetryResult::failed(error, Duration::ZERO));
    }

    /// Returns `false` when the failure is confident enough that retrying is pointless.
    fn fail(&mut self, result: RetryResult, threshold: f64) -> bool {
        let recoverable = result
            .error
            .as_ref()
            .is_none_or(|error| error.is_recoverable(threshold));
        if !recoverable {
            tracing::warn!(
                event = "unrecoverable_parse_failure",
                strategy = %result.strategy,
                attempt = result.attempt_number,
                confidence = result.confidence,
                threshold,
                "unrecoverable_parse_failure"
            );
        }
        self.last_error.clone_from(&result.error);
        self.history.push(result);
        recoverable
    }

    /// Keeps the highest-confidence success; ties keep the earlier one.
    fn consider(&mut self, result: RetryResult) {
        self.history.push(result.clone());
        if self
            .best
            .as_ref()
            .is_none_or(|best| result.confidence > best.confidence)
        {
            self.best = Some(result);
        }
    }
}

fn run_parser(
    parser: &dyn QueryParser,
    strategy: Strategy,
    content: &str,
    model_type: &str,
    attempt: u32,
) -> RetryResult {
    let started = Instant::now();
    match parser.parse_response(content, model_type) {
        Ok(query) => RetryResult::succeeded(
            strategy,
            query,
            parser.confidence(),
            attempt,
            started.elapsed(),
        ),
        Err(failure) => RetryResult::failed(
            ParsingError::from_failure(strategy, attempt, failure),
            started.elapsed(),
        ),
    }
}

/// Builder for [`RetryOrchestrator`].
#[derive(Default)]
pub struct RetryOrchestratorBuilder {
    retry_config: RetryConfig,
    breaker_config: CircuitBreakerConfig,
    options: OrchestratorOptions,
    registry: StrategyRegistry,
    engine: Option<Arc<dyn GenerationEngine>>,
    context_manager: Option<Arc<dyn ContextManager>>,
    fallback_handler: Option<Arc<dyn FallbackHandler>>,
}

impl RetryOrchestratorBuilder {
    /// Retry policy (validated in [`build`](Self::build)).
    #[must_use]
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Circuit breaker thresholds (validated in [`build`](Self::build)).
    #[must_use]
    pub fn circuit_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Orchestrator-wide options.
    #[must_use]
    pub fn options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Truncate raw content beyond `max` characters (0 = unlimited).
    #[must_use]
    pub const fn max_raw_length(mut self, max: usize) -> Self {
        self.options.max_raw_length = max;
        self
    }

    /// Registers a parser for `strategy`.
    #[must_use]
    pub fn parser(mut self, strategy: Strategy, parser: Arc<dyn QueryParser>) -> Self {
        self.registry.register(strategy, parser);
        self
    }

    /// Generation engine used for re-prompting.
    #[must_use]
    pub fn generation_engine(mut self, engine: Arc<dyn GenerationEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Source of conversation history for re-prompts.
    #[must_use]
    pub fn context_manager(mut self, manager: Arc<dyn ContextManager>) -> Self {
        self.context_manager = Some(manager);
        self
    }

    /// Custom fallback consulted before the default synthesizer.
    #[must_use]
    pub fn fallback_handler(mut self, handler: Arc<dyn FallbackHandler>) -> Self {
        self.fallback_handler = Some(handler);
        self
    }

    /// Validates configuration and builds the orchestrator.
    pub fn build(self) -> Result<RetryOrchestrator, AcquisitionError> {
        self.retry_config.validate()?;
        self.breaker_config.validate()?;

        let reprompter = self
            .engine
            .map(|engine| RepromptCoordinator::new(engine, self.context_manager));

        Ok(RetryOrchestrator {
            registry: RwLock::new(self.registry),
            config: RwLock::new(self.retry_config),
            options: self.options,
            breaker: CircuitBreaker::new(self.breaker_config),
            metrics: MetricsCollector::new(),
            reprompter,
            fallback_handler: self.fallback_handler,
        })
    }
}
