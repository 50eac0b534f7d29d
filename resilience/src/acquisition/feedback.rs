//! Prompt and remediation text built from a failed or weak acquisition.

use super::config::RetryConfig;
use super::types::Strategy;

/// Placeholder replaced with the user's original question.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Substitutes `original_query` into `template`.
///
/// Templates without the placeholder get the question appended, so a
/// re-prompt never loses what the user asked.
///
/// # Examples
///
/// ```
/// use nlq_resilience::acquisition::feedback::render_reprompt;
///
/// let prompt = render_reprompt("Try again: {query}", "failed logins today");
/// assert_eq!(prompt, "Try again: failed logins today");
/// ```
#[must_use]
pub fn render_reprompt(template: &str, original_query: &str) -> String {
    if template.contains(QUERY_PLACEHOLDER) {
        template.replace(QUERY_PLACEHOLDER, original_query)
    } else {
        format!("{template}\n\nQuestion: {original_query}")
    }
}

/// Remediation hints attached to an exhaustion error.
///
/// `registered` is the set of strategies that had a parser during the call.
#[must_use]
pub fn exhaustion_suggestions(registered: &[Strategy], config: &RetryConfig) -> Vec<String> {
    let mut suggestions = Vec::new();

    let missing: Vec<&str> = Strategy::ORDERED
        .iter()
        .filter(|s| !registered.contains(s))
        .map(|s| s.as_str())
        .collect();
    if !missing.is_empty() {
        suggestions.push(format!(
            "register a parser for the {} strateg{}",
            missing.join(", "),
            if missing.len() == 1 { "y" } else { "ies" }
        ));
    }

    suggestions.push(
        "rephrase the question with an explicit log source and time range".to_string(),
    );

    if !config.enable_reprompting {
        suggestions.push("enable re-prompting so weak answers are regenerated".to_string());
    }
    if config.confidence_threshold > 0.5 {
        suggestions.push(format!(
            "lower the confidence threshold (currently {:.2})",
            config.confidence_threshold
        ));
    }

    suggestions.push("inspect the raw model output for truncation or formatting issues".to_string());
    suggestions
}
