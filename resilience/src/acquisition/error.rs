//! Error taxonomy for acquisition operations.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::types::Strategy;

/// Why a single strategy attempt did not yield a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsingErrorKind {
    /// No parser is registered for the strategy.
    UnregisteredStrategy,
    /// The model-specific parser declined the model type.
    IncompatibleModel,
    /// The parser ran and returned an error.
    ParserFailure,
    /// The generation engine failed while re-prompting.
    RepromptFailure,
}

/// Failure of one strategy on one attempt.
#[derive(Debug, Clone, Error)]
#[error("{strategy} strategy failed on attempt {attempt}: {message}")]
pub struct ParsingError {
    /// Failure classification.
    pub kind: ParsingErrorKind,
    /// Strategy that failed.
    pub strategy: Strategy,
    /// Attempt number (1-indexed).
    pub attempt: u32,
    /// Confidence the parser still had in its partial result.
    pub confidence: f64,
    /// Human-readable cause.
    pub message: String,
}

impl ParsingError {
    pub(crate) fn unregistered(strategy: Strategy, attempt: u32) -> Self {
        Self {
            kind: ParsingErrorKind::UnregisteredStrategy,
            strategy,
            attempt,
            confidence: 0.0,
            message: format!("no parser registered for the {strategy} strategy"),
        }
    }

    pub(crate) fn incompatible(strategy: Strategy, attempt: u32, model_type: &str) -> Self {
        Self {
            kind: ParsingErrorKind::IncompatibleModel,
            strategy,
            attempt,
            confidence: 0.0,
            message: format!("parser cannot handle model type '{model_type}'"),
        }
    }

    pub(crate) fn from_failure(strategy: Strategy, attempt: u32, failure: ParseFailure) -> Self {
        Self {
            kind: ParsingErrorKind::ParserFailure,
            strategy,
            attempt,
            confidence: super::types::normalize_confidence(failure.confidence),
            message: failure.message,
        }
    }

    pub(crate) fn reprompt(strategy: Strategy, attempt: u32, cause: &CollaboratorError) -> Self {
        Self {
            kind: ParsingErrorKind::RepromptFailure,
            strategy,
            attempt,
            confidence: 0.0,
            message: format!("re-prompt failed: {cause}"),
        }
    }

    /// Structural errors abort only the current strategy; the chain continues.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self.kind,
            ParsingErrorKind::UnregisteredStrategy | ParsingErrorKind::IncompatibleModel
        )
    }

    /// A parse error is recoverable while its confidence is below the acceptance threshold.
    #[must_use]
    pub fn is_recoverable(&self, threshold: f64) -> bool {
        self.confidence < threshold
    }
}

/// Error returned by a [`QueryParser`](super::collaborators::QueryParser).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseFailure {
    /// Why parsing failed.
    pub message: String,
    /// Partial confidence, zero unless the parser says otherwise.
    pub confidence: f64,
}

impl ParseFailure {
    /// Failure with zero confidence.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            confidence: 0.0,
        }
    }

    /// Attach the confidence the parser had before it gave up.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Errors raised by optional collaborators (generation engine, context store).
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The generation engine could not produce a response.
    #[error("generation engine failed: {0}")]
    Engine(String),

    /// Conversation context could not be loaded.
    #[error("conversation context unavailable: {0}")]
    Context(String),

    /// The collaborator observed the call's cancellation signal.
    #[error("collaborator call cancelled")]
    Cancelled,
}

/// Configuration values rejected by validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Confidence threshold outside `[0, 1]` or not finite.
    #[error("confidence threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    /// Re-prompting enabled without a template.
    #[error("re-prompting is enabled but the re-prompt template is empty")]
    MissingRepromptTemplate,

    /// A field that must be non-negative was negative.
    #[error("{field} must not be negative, got {value}")]
    Negative {
        /// Offending field.
        field: &'static str,
        /// Rejected value.
        value: i64,
    },

    /// A field that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Offending field.
        field: &'static str,
    },
}

/// Errors surfaced to callers of the retry orchestrator.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// No raw response was supplied; nothing was attempted.
    #[error("raw response is missing; nothing to parse")]
    MissingResponse,

    /// The circuit breaker is open and shedding load.
    #[error("service unavailable: circuit breaker is open")]
    ServiceUnavailable {
        /// Time until the breaker will admit a probe, if known.
        retry_after: Option<Duration>,
    },

    /// The most specific parse failure collected during the call.
    #[error(transparent)]
    Parsing(#[from] ParsingError),

    /// Every strategy on every attempt failed without a usable parser error.
    #[error(
        "all parsing strategies exhausted after {attempts} attempt(s) (tried: {}). Suggestions: {}",
        join_strategies(.strategies),
        join_suggestions(.suggestions)
    )]
    Exhausted {
        /// Strategies attempted, in order.
        strategies: Vec<Strategy>,
        /// Number of attempts made.
        attempts: u32,
        /// Actionable remediation hints.
        suggestions: Vec<String>,
    },

    /// The call's cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The call's deadline passed.
    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl AcquisitionError {
    /// True for caller-initiated cancellation or an expired deadline.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// True when the breaker refused the call.
    #[must_use]
    pub const fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }
}

fn join_strategies(strategies: &[Strategy]) -> String {
    strategies
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_suggestions(suggestions: &[String]) -> String {
    suggestions.join("; ")
}
