//! Deterministic last-resort query synthesis.
//!
//! When every parser has failed, a keyword scan over the raw model text and
//! the user's original question still yields a minimal, runnable query.
//! The model type never influences the result.

use super::collaborators::FallbackHandler;
use super::types::StructuredQuery;

/// Log source used when no keyword matches.
pub const DEFAULT_LOG_SOURCE: &str = "kube-apiserver";

/// Result limit of every synthesized query.
pub const DEFAULT_RESULT_LIMIT: u32 = 20;

/// Keyword to log source, first match wins.
const SOURCE_KEYWORDS: [(&str, &str); 2] = [
    ("oauth", "oauth-server"),
    ("openshift", "openshift-apiserver"),
];

/// Keyword to timeframe, first match wins.
const TIMEFRAME_KEYWORDS: [(&str, &str); 3] = [
    ("today", "today"),
    ("yesterday", "yesterday"),
    ("hour", "1_hour_ago"),
];

/// Builds a minimal query from `raw` and `original_query`. Never fails.
///
/// # Examples
///
/// ```
/// use nlq_resilience::acquisition::synthesize_fallback;
///
/// let query = synthesize_fallback("", "OAuth logins from OpenShift today");
/// assert_eq!(query.log_source, "oauth-server");
/// assert_eq!(query.timeframe, "today");
/// assert_eq!(query.limit, 20);
/// ```
#[must_use]
pub fn synthesize_fallback(raw: &str, original_query: &str) -> StructuredQuery {
    let raw = raw.to_lowercase();
    let original_query = original_query.to_lowercase();
    let mentions = |keyword: &str| raw.contains(keyword) || original_query.contains(keyword);

    let log_source = SOURCE_KEYWORDS
        .iter()
        .find(|&&(keyword, _)| mentions(keyword))
        .map_or(DEFAULT_LOG_SOURCE, |&(_, source)| source);

    let timeframe = TIMEFRAME_KEYWORDS
        .iter()
        .find(|&&(keyword, _)| mentions(keyword))
        .map_or("", |&(_, timeframe)| timeframe);

    StructuredQuery {
        log_source: log_source.to_string(),
        timeframe: timeframe.to_string(),
        limit: DEFAULT_RESULT_LIMIT,
        ..StructuredQuery::default()
    }
}

/// [`FallbackHandler`] backed by [`synthesize_fallback`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFallback;

impl FallbackHandler for DefaultFallback {
    fn synthesize(
        &self,
        raw: &str,
        original_query: &str,
        _model_type: &str,
    ) -> Option<StructuredQuery> {
        Some(synthesize_fallback(raw, original_query))
    }
}
