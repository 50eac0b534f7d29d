//! Capabilities the orchestrator consumes but does not implement.

use async_trait::async_trait;

use super::context::CallContext;
use super::error::{CollaboratorError, ParseFailure};
use super::types::{ConversationContext, RawResponse, StructuredQuery};

/// A parser registered under one [`Strategy`](super::types::Strategy).
///
/// `confidence` reports the score of the most recent successful
/// `parse_response` call, so implementations keep it in interior-mutable
/// state (an atomic is enough).
pub trait QueryParser: Send + Sync {
    /// Turns raw model text into a structured query.
    fn parse_response(&self, content: &str, model_type: &str)
        -> Result<StructuredQuery, ParseFailure>;

    /// Whether this parser understands output from `model_type`.
    fn can_handle(&self, model_type: &str) -> bool;

    /// Confidence in `[0, 1]` of the last parse.
    fn confidence(&self) -> f64;
}

/// Text-generation backend used to re-prompt on low confidence.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// Generates a fresh response for `prompt`. Implementations should
    /// observe `ctx` and return [`CollaboratorError::Cancelled`] when it fires.
    async fn process_query(
        &self,
        ctx: &CallContext,
        prompt: &str,
        context: &ConversationContext,
    ) -> Result<RawResponse, CollaboratorError>;
}

/// Source of conversational history for a session.
#[async_trait]
pub trait ContextManager: Send + Sync {
    /// Loads the context for `session_id`.
    async fn get_context(&self, session_id: &str) -> Result<ConversationContext, CollaboratorError>;
}

/// Caller-supplied replacement for the default fallback synthesizer.
pub trait FallbackHandler: Send + Sync {
    /// Produces a last-resort query, or `None` to defer to the default synthesizer.
    fn synthesize(&self, raw: &str, original_query: &str, model_type: &str)
        -> Option<StructuredQuery>;
}
