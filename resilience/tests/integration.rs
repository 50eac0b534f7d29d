use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nlq_resilience::acquisition::{
    AcquisitionTier, CircuitState, CollaboratorError, ConversationContext, FallbackHandler,
    GenerationEngine, ParsingErrorKind,
};
use nlq_resilience::prelude::*;
use parking_lot::Mutex;

/// Parser whose behavior is scripted per call; the last step repeats.
struct ScriptedParser {
    steps: Vec<Option<f64>>,
    handles_model: bool,
    failure_confidence: f64,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    last_confidence: Mutex<f64>,
}

impl ScriptedParser {
    fn new(steps: Vec<Option<f64>>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            handles_model: true,
            failure_confidence: 0.1,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            last_confidence: Mutex::new(0.0),
        })
    }

    fn succeeding(confidence: f64) -> Arc<Self> {
        Self::new(vec![Some(confidence)])
    }

    fn failing() -> Arc<Self> {
        Self::new(vec![None])
    }

    fn failing_with_confidence(confidence: f64) -> Arc<Self> {
        Arc::new(Self {
            steps: vec![None],
            handles_model: true,
            failure_confidence: confidence,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            last_confidence: Mutex::new(0.0),
        })
    }

    fn rejecting_models() -> Arc<Self> {
        Arc::new(Self {
            steps: vec![Some(1.0)],
            handles_model: false,
            failure_confidence: 0.1,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            last_confidence: Mutex::new(0.0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QueryParser for ScriptedParser {
    fn parse_response(
        &self,
        content: &str,
        _model_type: &str,
    ) -> Result<StructuredQuery, ParseFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(content.to_string());
        let step = self.steps[call.min(self.steps.len() - 1)];
        match step {
            Some(confidence) => {
                *self.last_confidence.lock() = confidence;
                Ok(StructuredQuery {
                    log_source: format!("confidence-{confidence}"),
                    limit: 10,
                    ..StructuredQuery::default()
                })
            }
            None => Err(ParseFailure::new("no structured query found")
                .with_confidence(self.failure_confidence)),
        }
    }

    fn can_handle(&self, _model_type: &str) -> bool {
        self.handles_model
    }

    fn confidence(&self) -> f64 {
        *self.last_confidence.lock()
    }
}

struct ScriptedEngine {
    reply: Result<String, CollaboratorError>,
    calls: AtomicUsize,
}

#[async_trait]
impl GenerationEngine for ScriptedEngine {
    async fn process_query(
        &self,
        _ctx: &CallContext,
        _prompt: &str,
        _context: &ConversationContext,
    ) -> Result<RawResponse, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map(|content| RawResponse::new(content, "gpt-4"))
    }
}

fn fast_retries(max_retries: u32) -> RetryConfig {
    RetryConfig::default()
        .with_max_retries(max_retries)
        .with_retry_delay(Duration::ZERO)
}

fn raw(content: &str) -> RawResponse {
    RawResponse::new(content, "gpt-4")
}

#[tokio::test]
async fn test_missing_response_is_rejected_without_parsing() {
    let specific = ScriptedParser::succeeding(0.9);
    let orchestrator = RetryOrchestrator::builder()
        .parser(Strategy::Specific, specific.clone())
        .build()
        .unwrap();

    let err = orchestrator
        .parse_with_retry(&CallContext::new(), None, "gpt-4", "q", "s")
        .await
        .unwrap_err();

    assert!(matches!(err, AcquisitionError::MissingResponse));
    assert_eq!(specific.calls(), 0);
    assert_eq!(orchestrator.metrics().snapshot().total_attempts, 0);
}

#[tokio::test]
async fn test_confident_specific_result_short_circuits_chain() {
    let specific = ScriptedParser::succeeding(0.9);
    let generic = ScriptedParser::succeeding(1.0);
    let error = ScriptedParser::succeeding(1.0);
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(RetryConfig::default().with_confidence_threshold(0.7))
        .parser(Strategy::Specific, specific.clone())
        .parser(Strategy::Generic, generic.clone())
        .parser(Strategy::Error, error.clone())
        .build()
        .unwrap();

    let acquisition = orchestrator
        .acquire(&CallContext::new(), Some(&raw("{}")), "gpt-4", "q", "s")
        .await
        .unwrap();

    assert_eq!(acquisition.tier, AcquisitionTier::Accepted);
    assert_eq!(acquisition.strategy, Some(Strategy::Specific));
    assert_eq!(acquisition.query.log_source, "confidence-0.9");
    assert_eq!(specific.calls(), 1);
    assert_eq!(generic.calls(), 0);
    assert_eq!(error.calls(), 0);

    let metrics = orchestrator.metrics().snapshot();
    assert_eq!(metrics.successes, 1);
    assert_eq!(metrics.strategy_usage.get(&Strategy::Generic), None);
}

#[tokio::test]
async fn test_incompatible_specific_parser_is_skipped() {
    let specific = ScriptedParser::rejecting_models();
    let generic = ScriptedParser::succeeding(0.8);
    let orchestrator = RetryOrchestrator::builder()
        .parser(Strategy::Specific, specific.clone())
        .parser(Strategy::Generic, generic.clone())
        .build()
        .unwrap();

    let acquisition = orchestrator
        .acquire(&CallContext::new(), Some(&raw("{}")), "mystery", "q", "s")
        .await
        .unwrap();

    assert_eq!(specific.calls(), 0);
    assert_eq!(acquisition.strategy, Some(Strategy::Generic));
    let skip = acquisition.history[0].error.as_ref().unwrap();
    assert_eq!(skip.kind, ParsingErrorKind::IncompatibleModel);
}

#[tokio::test]
async fn test_model_agnostic_strategies_ignore_can_handle() {
    let error = ScriptedParser::rejecting_models();
    let orchestrator = RetryOrchestrator::builder()
        .parser(Strategy::Error, error.clone())
        .build()
        .unwrap();

    let query = orchestrator
        .parse_with_retry(&CallContext::new(), Some(&raw("x")), "mystery", "q", "s")
        .await
        .unwrap();

    assert_eq!(error.calls(), 1);
    assert_eq!(query.log_source, "confidence-1");
}

#[tokio::test]
async fn test_best_so_far_is_accepted_when_nothing_clears_threshold() {
    let specific = ScriptedParser::new(vec![Some(0.2), Some(0.55), Some(0.3)]);
    let generic = ScriptedParser::succeeding(0.4);
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(2))
        .parser(Strategy::Specific, specific.clone())
        .parser(Strategy::Generic, generic.clone())
        .build()
        .unwrap();

    let acquisition = orchestrator
        .acquire(&CallContext::new(), Some(&raw("{}")), "gpt-4", "q", "s")
        .await
        .unwrap();

    assert_eq!(acquisition.tier, AcquisitionTier::Degraded);
    assert_eq!(acquisition.query.log_source, "confidence-0.55");
    assert_eq!(specific.calls(), 3);
    assert_eq!(generic.calls(), 3);
    assert_eq!(orchestrator.circuit_breaker().stats().successes, 1);
}

#[tokio::test]
async fn test_default_fallback_when_every_strategy_fails() {
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(1))
        .parser(Strategy::Specific, ScriptedParser::failing())
        .parser(Strategy::Generic, ScriptedParser::failing())
        .parser(Strategy::Error, ScriptedParser::failing())
        .build()
        .unwrap();

    let acquisition = orchestrator
        .acquire(
            &CallContext::new(),
            Some(&raw("garbled output")),
            "gpt-4",
            "show pod deletions",
            "s",
        )
        .await
        .unwrap();

    assert_eq!(acquisition.tier, AcquisitionTier::Fallback);
    assert_eq!(acquisition.query.log_source, "kube-apiserver");
    assert_eq!(acquisition.query.limit, 20);
    assert_eq!(acquisition.history.len(), 6);

    let metrics = orchestrator.metrics().snapshot();
    assert_eq!(metrics.fallback_used, 1);
    assert_eq!(metrics.total_attempts, 6);
    assert_eq!(metrics.failures, 6);
    assert_eq!(metrics.successes, 0);
    assert_eq!(orchestrator.circuit_breaker().stats().failures, 0);
}

#[tokio::test]
async fn test_failed_attempts_fill_failure_tallies() {
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(2))
        .parser(Strategy::Specific, ScriptedParser::failing())
        .parser(Strategy::Generic, ScriptedParser::failing())
        .parser(Strategy::Error, ScriptedParser::failing())
        .build()
        .unwrap();

    for _ in 0..5 {
        let acquisition = orchestrator
            .acquire(
                &CallContext::new(),
                Some(&raw("{{{")),
                "broken-model",
                "oauth failures",
                "s",
            )
            .await
            .unwrap();
        assert_eq!(acquisition.tier, AcquisitionTier::Fallback);
    }

    let metrics = orchestrator.metrics().snapshot();
    assert_eq!(metrics.total_attempts, 45);
    assert_eq!(metrics.failures, 45);
    assert_eq!(metrics.fallback_used, 5);
    assert_eq!(metrics.error_counts["no structured query found"], 45);
    assert_eq!(metrics.model_type_failures["broken-model"], 45);
    assert_eq!(metrics.latency_samples, 45);
    assert_eq!(metrics.strategy_usage[&Strategy::Error], 15);
}

struct FixedFallback(Option<StructuredQuery>);

impl FallbackHandler for FixedFallback {
    fn synthesize(&self, _: &str, _: &str, _: &str) -> Option<StructuredQuery> {
        self.0.clone()
    }
}

#[tokio::test]
async fn test_custom_fallback_handler_takes_precedence() {
    let custom = StructuredQuery {
        log_source: "node-logs".to_string(),
        ..StructuredQuery::default()
    };
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(0))
        .fallback_handler(Arc::new(FixedFallback(Some(custom.clone()))))
        .build()
        .unwrap();

    let query = orchestrator
        .parse_with_retry(&CallContext::new(), Some(&raw("")), "gpt-4", "oauth", "s")
        .await
        .unwrap();
    assert_eq!(query, custom);

    let deferring = RetryOrchestrator::builder()
        .retry_config(fast_retries(0))
        .fallback_handler(Arc::new(FixedFallback(None)))
        .build()
        .unwrap();
    let query = deferring
        .parse_with_retry(&CallContext::new(), Some(&raw("")), "gpt-4", "oauth", "s")
        .await
        .unwrap();
    assert_eq!(query.log_source, "oauth-server");
}

#[tokio::test]
async fn test_exhaustion_without_fallback_reports_parser_error() {
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(1))
        .options(OrchestratorOptions::default().with_fallback(false))
        .parser(Strategy::Generic, ScriptedParser::failing())
        .build()
        .unwrap();

    let err = orchestrator
        .parse_with_retry(&CallContext::new(), Some(&raw("?")), "gpt-4", "q", "s")
        .await
        .unwrap_err();

    match err {
        AcquisitionError::Parsing(parsing) => {
            assert_eq!(parsing.kind, ParsingErrorKind::ParserFailure);
            assert_eq!(parsing.strategy, Strategy::Generic);
            assert_eq!(parsing.attempt, 2);
        }
        other => panic!("expected parsing error, got {other:?}"),
    }

    let metrics = orchestrator.metrics().snapshot();
    assert_eq!(metrics.total_attempts, 2);
    assert_eq!(metrics.failures, 2);
    assert_eq!(metrics.model_type_failures["gpt-4"], 2);
    assert_eq!(orchestrator.circuit_breaker().stats().failures, 1);
}

#[tokio::test]
async fn test_confident_parse_failure_stops_retrying() {
    let specific = ScriptedParser::failing_with_confidence(0.8);
    let generic = ScriptedParser::succeeding(0.4);
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(2))
        .options(OrchestratorOptions::default().with_fallback(false))
        .parser(Strategy::Specific, specific.clone())
        .parser(Strategy::Generic, generic.clone())
        .build()
        .unwrap();

    let err = orchestrator
        .parse_with_retry(&CallContext::new(), Some(&raw("?")), "gpt-4", "q", "s")
        .await
        .unwrap_err();

    match err {
        AcquisitionError::Parsing(parsing) => {
            assert_eq!(parsing.strategy, Strategy::Specific);
            assert_eq!(parsing.attempt, 1);
            assert!((parsing.confidence - 0.8).abs() < f64::EPSILON);
        }
        other => panic!("expected parsing error, got {other:?}"),
    }
    assert_eq!(specific.calls(), 1);
    assert_eq!(generic.calls(), 0);
    assert_eq!(orchestrator.metrics().snapshot().total_attempts, 1);
}

#[tokio::test]
async fn test_confident_parse_failure_still_returns_best_so_far() {
    let specific = ScriptedParser::succeeding(0.4);
    let generic = ScriptedParser::failing_with_confidence(0.9);
    let error = ScriptedParser::succeeding(0.3);
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(2))
        .parser(Strategy::Specific, specific.clone())
        .parser(Strategy::Generic, generic.clone())
        .parser(Strategy::Error, error.clone())
        .build()
        .unwrap();

    let acquisition = orchestrator
        .acquire(&CallContext::new(), Some(&raw("?")), "gpt-4", "q", "s")
        .await
        .unwrap();

    assert_eq!(acquisition.tier, AcquisitionTier::Degraded);
    assert_eq!(acquisition.strategy, Some(Strategy::Specific));
    assert_eq!(specific.calls(), 1);
    assert_eq!(generic.calls(), 1);
    assert_eq!(error.calls(), 0);
}

#[tokio::test]
async fn test_exhaustion_with_no_parsers_lists_strategies_and_suggestions() {
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(0))
        .options(OrchestratorOptions::default().with_fallback(false))
        .build()
        .unwrap();

    let err = orchestrator
        .parse_with_retry(&CallContext::new(), Some(&raw("?")), "gpt-4", "q", "s")
        .await
        .unwrap_err();

    match &err {
        AcquisitionError::Exhausted {
            strategies,
            attempts,
            suggestions,
        } => {
            assert_eq!(strategies, &Strategy::ORDERED.to_vec());
            assert_eq!(*attempts, 1);
            assert!(suggestions.iter().any(|s| s.contains("register a parser")));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert!(err.to_string().contains("specific, generic, error"));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_retry_delay_wins() {
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(
            RetryConfig::default()
                .with_max_retries(5)
                .with_retry_delay(Duration::from_secs(1)),
        )
        .parser(Strategy::Generic, ScriptedParser::failing())
        .build()
        .unwrap();

    let cancellation = Cancellation::new();
    let ctx = CallContext::with_cancellation(cancellation.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancellation.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = orchestrator
        .parse_with_retry(&ctx, Some(&raw("x")), "gpt-4", "q", "s")
        .await
        .unwrap_err();

    assert!(matches!(err, AcquisitionError::Cancelled), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(orchestrator.metrics().snapshot().fallback_used, 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_stops_retries() {
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(
            RetryConfig::default()
                .with_max_retries(3)
                .with_retry_delay(Duration::from_millis(200)),
        )
        .parser(Strategy::Generic, ScriptedParser::failing())
        .build()
        .unwrap();

    let ctx = CallContext::new().timeout(Duration::from_millis(300));
    let err = orchestrator
        .parse_with_retry(&ctx, Some(&raw("x")), "gpt-4", "q", "s")
        .await
        .unwrap_err();
    assert!(matches!(err, AcquisitionError::DeadlineExceeded));
}

#[tokio::test]
async fn test_reprompt_result_is_accepted_when_confident() {
    let generic = ScriptedParser::new(vec![Some(0.4), Some(0.95)]);
    let engine = Arc::new(ScriptedEngine {
        reply: Ok("{\"log_source\": \"oauth-server\"}".to_string()),
        calls: AtomicUsize::new(0),
    });
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(2).with_default_reprompting())
        .parser(Strategy::Generic, generic.clone())
        .generation_engine(engine.clone())
        .build()
        .unwrap();

    let acquisition = orchestrator
        .acquire(&CallContext::new(), Some(&raw("weak")), "gpt-4", "oauth", "s")
        .await
        .unwrap();

    assert_eq!(acquisition.tier, AcquisitionTier::Accepted);
    assert_eq!(acquisition.query.log_source, "confidence-0.95");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert_eq!(generic.calls(), 2);
    assert_eq!(generic.seen.lock()[1], "{\"log_source\": \"oauth-server\"}");
}

#[tokio::test]
async fn test_better_reprompt_below_threshold_only_updates_best() {
    let generic = ScriptedParser::new(vec![Some(0.3), Some(0.6)]);
    let engine = Arc::new(ScriptedEngine {
        reply: Ok("{\"log_source\": \"kube-apiserver\"}".to_string()),
        calls: AtomicUsize::new(0),
    });
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(
            fast_retries(0)
                .with_confidence_threshold(0.7)
                .with_default_reprompting(),
        )
        .parser(Strategy::Generic, generic.clone())
        .generation_engine(engine.clone())
        .build()
        .unwrap();

    let acquisition = orchestrator
        .acquire(&CallContext::new(), Some(&raw("weak")), "gpt-4", "q", "s")
        .await
        .unwrap();

    assert_eq!(acquisition.tier, AcquisitionTier::Degraded);
    assert_eq!(acquisition.strategy, Some(Strategy::Generic));
    assert_eq!(acquisition.query.log_source, "confidence-0.6");
    assert!((acquisition.confidence - 0.6).abs() < f64::EPSILON);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert_eq!(generic.calls(), 2);
    assert_eq!(acquisition.history.len(), 2);
}

#[tokio::test]
async fn test_reprompt_engine_failure_keeps_best_so_far() {
    let generic = ScriptedParser::succeeding(0.5);
    let engine = Arc::new(ScriptedEngine {
        reply: Err(CollaboratorError::Engine("backend down".to_string())),
        calls: AtomicUsize::new(0),
    });
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(1).with_default_reprompting())
        .parser(Strategy::Generic, generic)
        .generation_engine(engine.clone())
        .build()
        .unwrap();

    let acquisition = orchestrator
        .acquire(&CallContext::new(), Some(&raw("weak")), "gpt-4", "q", "s")
        .await
        .unwrap();

    assert_eq!(acquisition.tier, AcquisitionTier::Degraded);
    assert_eq!(acquisition.query.log_source, "confidence-0.5");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_reprompting_disabled_never_calls_engine() {
    let engine = Arc::new(ScriptedEngine {
        reply: Ok(String::new()),
        calls: AtomicUsize::new(0),
    });
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(0))
        .parser(Strategy::Generic, ScriptedParser::succeeding(0.2))
        .generation_engine(engine.clone())
        .build()
        .unwrap();

    orchestrator
        .parse_with_retry(&CallContext::new(), Some(&raw("x")), "gpt-4", "q", "s")
        .await
        .unwrap();
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_raw_content_is_truncated_before_parsing() {
    let generic = ScriptedParser::succeeding(0.9);
    let orchestrator = RetryOrchestrator::builder()
        .max_raw_length(5)
        .parser(Strategy::Generic, generic.clone())
        .build()
        .unwrap();

    orchestrator
        .parse_with_retry(&CallContext::new(), Some(&raw("abcdefghij")), "gpt-4", "q", "s")
        .await
        .unwrap();
    assert_eq!(generic.seen.lock()[0], "abcde");
}

#[tokio::test]
async fn test_open_breaker_rejects_calls() {
    let orchestrator = RetryOrchestrator::builder()
        .retry_config(fast_retries(0))
        .circuit_breaker_config(
            CircuitBreakerConfig::default()
                .with_failure_threshold(2)
                .with_request_volume_threshold(2)
                .with_recovery_timeout(Duration::from_secs(60)),
        )
        .options(OrchestratorOptions::default().with_fallback(false))
        .parser(Strategy::Generic, ScriptedParser::failing())
        .build()
        .unwrap();

    for _ in 0..2 {
        let err = orchestrator
            .parse_with_retry(&CallContext::new(), Some(&raw("x")), "gpt-4", "q", "s")
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Parsing(_)));
    }
    assert_eq!(orchestrator.circuit_breaker().state(), CircuitState::Open);

    let err = orchestrator
        .parse_with_retry(&CallContext::new(), Some(&raw("x")), "gpt-4", "q", "s")
        .await
        .unwrap_err();
    assert!(err.is_service_unavailable());
    assert_eq!(orchestrator.metrics().snapshot().breaker_rejections, 1);
}

#[tokio::test]
async fn test_concurrent_calls_share_metrics_safely() {
    let orchestrator = Arc::new(
        RetryOrchestrator::builder()
            .parser(Strategy::Generic, ScriptedParser::succeeding(0.9))
            .build()
            .unwrap(),
    );

    let calls = (0..32).map(|i| {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            let session = format!("session-{i}");
            orchestrator
                .parse_with_retry(&CallContext::new(), Some(&raw("{}")), "gpt-4", "q", &session)
                .await
        })
    });

    for outcome in futures::future::join_all(calls).await {
        assert!(outcome.unwrap().is_ok());
    }

    let metrics = orchestrator.metrics().snapshot();
    assert_eq!(metrics.total_attempts, 32);
    assert_eq!(metrics.successes, 32);
    assert_eq!(metrics.strategy_usage[&Strategy::Generic], 32);
}

#[tokio::test]
async fn test_update_config_is_validated_and_wholesale() {
    let orchestrator = RetryOrchestrator::new();
    let err = orchestrator
        .update_config(RetryConfig::default().with_confidence_threshold(1.5))
        .unwrap_err();
    assert!(matches!(err, AcquisitionError::InvalidConfig(_)));
    assert_eq!(orchestrator.config(), RetryConfig::default());

    let replacement = fast_retries(7).with_confidence_threshold(0.4);
    orchestrator.update_config(replacement.clone()).unwrap();
    assert_eq!(orchestrator.config(), replacement);
}

#[test]
fn test_builder_rejects_invalid_configuration() {
    let mut config = RetryConfig::default();
    config.enable_reprompting = true;
    assert!(RetryOrchestrator::builder().retry_config(config).build().is_err());

    let breaker = CircuitBreakerConfig::default().with_failure_threshold(0);
    assert!(RetryOrchestrator::builder()
        .circuit_breaker_config(breaker)
        .build()
        .is_err());
}

#[tokio::test]
async fn test_snapshot_exports_config_metrics_and_breaker() {
    let orchestrator = RetryOrchestrator::builder()
        .parser(Strategy::Specific, ScriptedParser::succeeding(0.9))
        .build()
        .unwrap();
    orchestrator
        .parse_with_retry(&CallContext::new(), Some(&raw("{}")), "gpt-4", "q", "s")
        .await
        .unwrap();

    let json = orchestrator.snapshot().to_json();
    assert_eq!(json["retry_config"]["max_retries"], 2);
    assert_eq!(json["retry_config"]["retry_delay_ms"], 500);
    assert_eq!(json["registered_strategies"][0], "specific");
    assert_eq!(json["metrics"]["total_attempts"], 1);
    assert_eq!(json["metrics"]["strategy_usage"]["specific"], 1);
    assert_eq!(json["circuit_breaker"]["state"], "closed");

    orchestrator.reset_metrics();
    assert_eq!(orchestrator.metrics().snapshot().total_attempts, 0);
}
