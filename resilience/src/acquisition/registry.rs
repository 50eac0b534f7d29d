//! Strategy-keyed parser registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::collaborators::QueryParser;
use super::types::Strategy;

/// One parser per strategy. Registration overwrites silently.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    parsers: HashMap<Strategy, Arc<dyn QueryParser>>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("registered", &self.registered())
            .finish()
    }
}

impl StrategyRegistry {
    /// Returns an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `parser` for `strategy`, returning whatever it replaced.
    pub fn register(
        &mut self,
        strategy: Strategy,
        parser: Arc<dyn QueryParser>,
    ) -> Option<Arc<dyn QueryParser>> {
        let previous = self.parsers.insert(strategy, parser);
        if previous.is_some() {
            tracing::debug!(
                event = "parser_replaced",
                strategy = %strategy,
                "parser_replaced"
            );
        }
        previous
    }

    /// Parser registered for `strategy`, if any.
    #[must_use]
    pub fn get(&self, strategy: Strategy) -> Option<&Arc<dyn QueryParser>> {
        self.parsers.get(&strategy)
    }

    /// Registered strategies in chain order.
    #[must_use]
    pub fn registered(&self) -> Vec<Strategy> {
        Strategy::ORDERED
            .into_iter()
            .filter(|s| self.parsers.contains_key(s))
            .collect()
    }

    /// Number of registered parsers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::error::ParseFailure;
    use crate::acquisition::types::StructuredQuery;

    struct Fixed(&'static str);

    impl QueryParser for Fixed {
        fn parse_response(&self, _: &str, _: &str) -> Result<StructuredQuery, ParseFailure> {
            Ok(StructuredQuery {
                log_source: self.0.to_string(),
                ..StructuredQuery::default()
            })
        }

        fn can_handle(&self, _: &str) -> bool {
            true
        }

        fn confidence(&self) -> f64 {
            1.0
        }
    }

    #[test]
    fn test_register_overwrites_without_error() {
        let mut registry = StrategyRegistry::new();
        assert!(registry.register(Strategy::Generic, Arc::new(Fixed("a"))).is_none());
        assert!(registry.register(Strategy::Generic, Arc::new(Fixed("b"))).is_some());
        assert_eq!(registry.len(), 1);

        let parsed = registry
            .get(Strategy::Generic)
            .unwrap()
            .parse_response("", "")
            .unwrap();
        assert_eq!(parsed.log_source, "b");
    }

    #[test]
    fn test_registered_follows_chain_order() {
        let mut registry = StrategyRegistry::new();
        registry.register(Strategy::Error, Arc::new(Fixed("e")));
        registry.register(Strategy::Specific, Arc::new(Fixed("s")));
        assert_eq!(registry.registered(), vec![Strategy::Specific, Strategy::Error]);
        assert!(registry.get(Strategy::Generic).is_none());
    }
}
