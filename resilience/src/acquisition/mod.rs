//! Resilient acquisition of structured queries from raw model output.
//!
//! - [`RetryOrchestrator`] - Strategy chain with retries, re-prompting and fallback
//! - [`CircuitBreaker`] - Three-state gate shedding load when the pipeline fails
//! - [`MetricsCollector`] - Counters, latency percentiles and failure tallies
//! - [`StrategyRegistry`] - One [`QueryParser`] per [`Strategy`]
//! - [`RepromptCoordinator`] - Regenerates low-confidence answers
//! - [`synthesize_fallback`] - Deterministic last-resort query

pub mod circuit_breaker;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod error;
pub mod fallback;
pub mod feedback;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod reprompt;
pub mod snapshot;
pub mod types;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};
pub use collaborators::{ContextManager, FallbackHandler, GenerationEngine, QueryParser};
pub use config::{
    CircuitBreakerConfig, OrchestratorOptions, RetryConfig, DEFAULT_REPROMPT_TEMPLATE,
};
pub use context::{CallContext, Cancellation};
pub use error::{
    AcquisitionError, CollaboratorError, ConfigError, ParseFailure, ParsingError,
    ParsingErrorKind,
};
pub use fallback::{synthesize_fallback, DefaultFallback, DEFAULT_LOG_SOURCE, DEFAULT_RESULT_LIMIT};
pub use metrics::{MetricsCollector, RetryMetrics, LATENCY_WINDOW};
pub use orchestrator::{Acquisition, AcquisitionTier, RetryOrchestrator, RetryOrchestratorBuilder};
pub use registry::StrategyRegistry;
pub use reprompt::{RepromptCoordinator, RepromptRequest};
pub use snapshot::TelemetrySnapshot;
pub use types::{ConversationContext, RawResponse, RetryResult, Strategy, StructuredQuery};

/// Cuts `content` to at most `max_chars` characters on a char boundary (0 = no limit).
pub(crate) fn truncate_content(content: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return content;
    }
    match content.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &content[..byte_index],
        None => content,
    }
}
