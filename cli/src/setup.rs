use std::sync::Arc;

use nlq_resilience::acquisition::{AcquisitionError, RetryOrchestrator, Strategy};

use crate::config::AppConfig;
use crate::parsers::{ErrorRecoveryParser, GenericJsonParser, SpecificJsonParser};

/// Builds an orchestrator with the reference parser for every strategy.
///
/// # Errors
/// Returns an error if the configuration fails validation.
pub fn build_orchestrator(config: &AppConfig) -> Result<RetryOrchestrator, AcquisitionError> {
    tracing::debug!(
        max_retries = config.retry.max_retries,
        threshold = config.retry.confidence_threshold,
        "Building orchestrator"
    );

    RetryOrchestrator::builder()
        .retry_config(config.retry.clone())
        .circuit_breaker_config(config.circuit_breaker.clone())
        .options(config.options.clone())
        .parser(Strategy::Specific, Arc::new(SpecificJsonParser::default()))
        .parser(Strategy::Generic, Arc::new(GenericJsonParser::default()))
        .parser(Strategy::Error, Arc::new(ErrorRecoveryParser::default()))
        .build()
}
