//! Resilient structured-query acquisition for natural-language audit-log search.
//!
//! A text-generation backend turns a user's question into free text; this
//! crate decides whether and how to accept, retry, re-prompt or fall back on
//! parsing that text into a [`StructuredQuery`](acquisition::StructuredQuery).

pub mod acquisition;

/// Common traits and types for ergonomic usage of the acquisition engine.
pub mod prelude {
    pub use crate::acquisition::{
        AcquisitionError, CallContext, Cancellation, CircuitBreakerConfig, GenerationEngine,
        OrchestratorOptions, ParseFailure, QueryParser, RawResponse, RetryConfig,
        RetryOrchestrator, Strategy, StructuredQuery,
    };
}
