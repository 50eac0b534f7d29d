//! Data model shared by every acquisition component.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ParsingError;

/// Parsing approach, ordered from most to least precise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Parser tuned for a particular model family.
    Specific,
    /// Model-agnostic parser for well-formed output.
    Generic,
    /// Last-chance parser that salvages fragments from broken output.
    Error,
}

impl Strategy {
    /// Every strategy in the order they are tried within one attempt.
    pub const ORDERED: [Self; 3] = [Self::Specific, Self::Generic, Self::Error];

    /// Stable lowercase name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Specific => "specific",
            Self::Generic => "generic",
            Self::Error => "error",
        }
    }

    /// Generic and Error parsers run regardless of what `can_handle` reports.
    #[must_use]
    pub const fn is_model_agnostic(self) -> bool {
        !matches!(self, Self::Specific)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured audit-log query produced by a parser.
///
/// The acquisition engine treats this as an opaque payload; only the
/// fallback synthesizer ever fills in fields itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredQuery {
    /// Audit log to search (`kube-apiserver`, `oauth-server`, ...).
    pub log_source: String,
    /// API verb filter (`get`, `delete`, ...).
    pub verb: String,
    /// Resource kind filter.
    pub resource: String,
    /// Namespace filter.
    pub namespace: String,
    /// Acting user filter.
    pub user: String,
    /// Relative time window (`today`, `yesterday`, `1_hour_ago`, ...).
    pub timeframe: String,
    /// Maximum number of entries to return.
    pub limit: u32,
    /// HTTP response status filter.
    pub response_status: String,
    /// Users to exclude from results.
    pub exclude_users: Vec<String>,
    /// Output fields to project.
    pub fields: Vec<String>,
}

/// Raw output returned by the generation backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    /// Model text as produced.
    pub content: String,
    /// Model identifier that produced the text.
    pub model_type: String,
    /// Provider-specific extras (token counts, finish reason, ...).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RawResponse {
    /// Creates a response with no metadata.
    #[must_use]
    pub fn new(content: impl Into<String>, model_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model_type: model_type.into(),
            metadata: HashMap::new(),
        }
    }
}

/// Conversation state handed to the generation engine during a re-prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Session the history belongs to.
    pub session_id: String,
    /// Prior turns, oldest first.
    pub history: Vec<String>,
}

impl ConversationContext {
    /// Empty context for the given session.
    #[must_use]
    pub fn empty(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            history: Vec::new(),
        }
    }
}

/// Outcome of one strategy invocation.
#[derive(Debug, Clone)]
pub struct RetryResult {
    /// Whether the parser produced a query.
    pub success: bool,
    /// The parsed query, present only on success.
    pub query: Option<StructuredQuery>,
    /// Strategy that produced this result.
    pub strategy: Strategy,
    /// Parser-reported confidence in `[0, 1]`.
    pub confidence: f64,
    /// Failure details, present only when `success` is false.
    pub error: Option<ParsingError>,
    /// Attempt number (1-indexed).
    pub attempt_number: u32,
    /// Time spent in the parser.
    pub duration: Duration,
}

impl RetryResult {
    pub(crate) fn succeeded(
        strategy: Strategy,
        query: StructuredQuery,
        confidence: f64,
        attempt_number: u32,
        duration: Duration,
    ) -> Self {
        Self {
            success: true,
            query: Some(query),
            strategy,
            confidence: normalize_confidence(confidence),
            error: None,
            attempt_number,
            duration,
        }
    }

    pub(crate) fn failed(error: ParsingError, duration: Duration) -> Self {
        Self {
            success: false,
            query: None,
            strategy: error.strategy,
            confidence: error.confidence,
            attempt_number: error.attempt,
            error: Some(error),
            duration,
        }
    }
}

/// Clamps a parser-reported score into `[0, 1]`; NaN counts as zero.
#[must_use]
pub fn normalize_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
