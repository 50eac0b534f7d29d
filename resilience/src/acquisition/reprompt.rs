//! Regenerates a weak answer through the generation engine and re-parses it.

use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;

use super::collaborators::{ContextManager, GenerationEngine, QueryParser};
use super::context::CallContext;
use super::error::{AcquisitionError, CollaboratorError, ParsingError};
use super::feedback::render_reprompt;
use super::types::{ConversationContext, RetryResult, Strategy};
use super::truncate_content;

/// What the coordinator needs to know about the low-confidence attempt.
pub struct RepromptRequest<'a> {
    /// Template with a `{query}` placeholder.
    pub template: &'a str,
    /// The user's original question.
    pub original_query: &'a str,
    /// Session used to look up conversation history.
    pub session_id: &'a str,
    /// Model type of the original response.
    pub model_type: &'a str,
    /// Strategy that produced the weak result; the new output is parsed with it alone.
    pub strategy: Strategy,
    /// Parser registered for `strategy`.
    pub parser: &'a Arc<dyn QueryParser>,
    /// Attempt number the re-prompt belongs to.
    pub attempt: u32,
    /// Character cap applied to the regenerated output (0 = unlimited).
    pub max_raw_length: usize,
}

/// Drives the generation engine for low-confidence results.
#[derive(Clone)]
pub struct RepromptCoordinator {
    engine: Arc<dyn GenerationEngine>,
    context_manager: Option<Arc<dyn ContextManager>>,
}

impl fmt::Debug for RepromptCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepromptCoordinator")
            .field("has_context_manager", &self.context_manager.is_some())
            .finish_non_exhaustive()
    }
}

impl RepromptCoordinator {
    /// Creates a coordinator around `engine`.
    #[must_use]
    pub fn new(
        engine: Arc<dyn GenerationEngine>,
        context_manager: Option<Arc<dyn ContextManager>>,
    ) -> Self {
        Self {
            engine,
            context_manager,
        }
    }

    /// Regenerates and re-parses.
    ///
    /// Returns `Ok(None)` when the engine fails; the caller keeps its best
    /// result. Errors are returned only for cancellation or an expired deadline.
    pub async fn reprompt(
        &self,
        ctx: &CallContext,
        request: RepromptRequest<'_>,
    ) -> Result<Option<RetryResult>, AcquisitionError> {
        let prompt = render_reprompt(request.template, request.original_query);
        let context = self.load_context(request.session_id).await;

        tracing::debug!(
            event = "reprompt_started",
            strategy = %request.strategy,
            attempt = request.attempt,
            "reprompt_started"
        );

        let response = match ctx
            .run(self.engine.process_query(ctx, &prompt, &context))
            .await?
        {
            Ok(response) => response,
            Err(CollaboratorError::Cancelled) => return Err(AcquisitionError::Cancelled),
            Err(cause) => {
                let error = ParsingError::reprompt(request.strategy, request.attempt, &cause);
                tracing::warn!(
                    event = "reprompt_failed",
                    strategy = %request.strategy,
                    attempt = request.attempt,
                    error = %error,
                    "reprompt_failed"
                );
                return Ok(None);
            }
        };

        ctx.check()?;
        let content = truncate_content(&response.content, request.max_raw_length);
        let model_type = if response.model_type.is_empty() {
            request.model_type
        } else {
            response.model_type.as_str()
        };

        let started = Instant::now();
        let result = match request.parser.parse_response(content, model_type) {
            Ok(query) => RetryResult::succeeded(
                request.strategy,
                query,
                request.parser.confidence(),
                request.attempt,
                started.elapsed(),
            ),
            Err(failure) => RetryResult::failed(
                ParsingError::from_failure(request.strategy, request.attempt, failure),
                started.elapsed(),
            ),
        };

        tracing::debug!(
            event = "reprompt_parsed",
            strategy = %request.strategy,
            attempt = request.attempt,
            success = result.success,
            confidence = result.confidence,
            "reprompt_parsed"
        );

        Ok(Some(result))
    }

    async fn load_context(&self, session_id: &str) -> ConversationContext {
        let Some(manager) = &self.context_manager else {
            return ConversationContext::empty(session_id);
        };
        match manager.get_context(session_id).await {
            Ok(context) => context,
            Err(e) => {
                tracing::debug!(
                    event = "context_unavailable",
                    session_id,
                    error = %e,
                    "context_unavailable"
                );
                ConversationContext::empty(session_id)
            }
        }
    }
}
