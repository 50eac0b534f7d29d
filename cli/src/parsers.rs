//! Reference parsers wired into the `nlq` binary, one per strategy.

use std::sync::atomic::{AtomicU64, Ordering};

use nlq_resilience::acquisition::{ParseFailure, QueryParser, StructuredQuery};
use serde_json::Value;

/// Model families the strict parser was tuned against.
pub const DEFAULT_MODEL_FAMILIES: [&str; 4] = ["gpt", "claude", "llama", "granite"];

/// Stores an `f64` confidence in an atomic cell.
#[derive(Debug, Default)]
struct ConfidenceCell(AtomicU64);

impl ConfidenceCell {
    fn set(&self, value: f64) -> f64 {
        self.0.store(value.to_bits(), Ordering::Relaxed);
        value
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Strict JSON parser for known model families.
///
/// Accepts a bare JSON object or one inside a fenced code block.
#[derive(Debug)]
pub struct SpecificJsonParser {
    model_families: Vec<String>,
    confidence: ConfidenceCell,
}

impl Default for SpecificJsonParser {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_FAMILIES.iter().map(ToString::to_string).collect())
    }
}

impl SpecificJsonParser {
    /// Parser handling models whose name contains one of `model_families`.
    #[must_use]
    pub fn new(model_families: Vec<String>) -> Self {
        Self {
            model_families: model_families
                .into_iter()
                .map(|family| family.to_lowercase())
                .collect(),
            confidence: ConfidenceCell::default(),
        }
    }
}

impl QueryParser for SpecificJsonParser {
    fn parse_response(
        &self,
        content: &str,
        _model_type: &str,
    ) -> Result<StructuredQuery, ParseFailure> {
        let body = strip_code_fence(content);
        if !body.starts_with('{') {
            self.confidence.set(0.0);
            return Err(ParseFailure::new("response is not a JSON object"));
        }
        let query: StructuredQuery = serde_json::from_str(body).map_err(|e| {
            self.confidence.set(0.0);
            ParseFailure::new(format!("invalid query JSON: {e}"))
        })?;
        self.confidence
            .set(if query.log_source.is_empty() { 0.6 } else { 0.95 });
        Ok(query)
    }

    fn can_handle(&self, model_type: &str) -> bool {
        let model_type = model_type.to_lowercase();
        self.model_families
            .iter()
            .any(|family| model_type.contains(family.as_str()))
    }

    fn confidence(&self) -> f64 {
        self.confidence.get()
    }
}

/// Lenient parser that digs the first balanced JSON object out of prose.
#[derive(Debug, Default)]
pub struct GenericJsonParser {
    confidence: ConfidenceCell,
}

impl QueryParser for GenericJsonParser {
    fn parse_response(
        &self,
        content: &str,
        _model_type: &str,
    ) -> Result<StructuredQuery, ParseFailure> {
        let Some(object) = first_json_object(content) else {
            self.confidence.set(0.0);
            return Err(ParseFailure::new("no JSON object found in response"));
        };
        let value: Value = serde_json::from_str(object).map_err(|e| {
            self.confidence.set(0.0);
            ParseFailure::new(format!("malformed JSON object: {e}"))
        })?;
        let query: StructuredQuery = serde_json::from_value(value).map_err(|e| {
            self.confidence.set(0.2);
            ParseFailure::new(format!("JSON does not describe a query: {e}")).with_confidence(0.2)
        })?;
        self.confidence
            .set(if query.log_source.is_empty() { 0.5 } else { 0.75 });
        Ok(query)
    }

    fn can_handle(&self, _model_type: &str) -> bool {
        true
    }

    fn confidence(&self) -> f64 {
        self.confidence.get()
    }
}

/// Salvages `key: value` (or `key=value`) lines from otherwise broken output.
#[derive(Debug, Default)]
pub struct ErrorRecoveryParser {
    confidence: ConfidenceCell,
}

impl QueryParser for ErrorRecoveryParser {
    fn parse_response(
        &self,
        content: &str,
        _model_type: &str,
    ) -> Result<StructuredQuery, ParseFailure> {
        let mut query = StructuredQuery::default();
        let mut recognised: u32 = 0;

        for line in content.lines() {
            let Some((key, value)) = line.split_once(':').or_else(|| line.split_once('=')) else {
                continue;
            };
            let key = key.trim().trim_matches(|c: char| c == '"' || c == '-' || c == '*').trim();
            let value = value.trim().trim_matches(|c: char| c == '"' || c == ',').trim();
            if value.is_empty() {
                continue;
            }
            let matched = match key.to_lowercase().as_str() {
                "log_source" | "source" => {
                    query.log_source = value.to_string();
                    true
                }
                "verb" => {
                    query.verb = value.to_string();
                    true
                }
                "resource" => {
                    query.resource = value.to_string();
                    true
                }
                "namespace" => {
                    query.namespace = value.to_string();
                    true
                }
                "user" | "username" => {
                    query.user = value.to_string();
                    true
                }
                "timeframe" | "time" => {
                    query.timeframe = value.to_string();
                    true
                }
                "limit" => value.parse().map(|limit| query.limit = limit).is_ok(),
                _ => false,
            };
            if matched {
                recognised += 1;
            }
        }

        if recognised == 0 {
            self.confidence.set(0.0);
            return Err(ParseFailure::new("no recognisable query fields"));
        }
        self.confidence.set((0.3 * f64::from(recognised)).min(0.6));
        Ok(query)
    }

    fn can_handle(&self, _model_type: &str) -> bool {
        true
    }

    fn confidence(&self) -> f64 {
        self.confidence.get()
    }
}

/// Returns the body of the first fenced code block, or the trimmed input.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[start + 3..];
    let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
    let body = &after_fence[body_start..];
    body.find("```").map_or(body, |end| &body[..end]).trim()
}

/// Finds the first balanced `{...}` span, ignoring braces inside strings.
fn first_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in content[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
