//! Query router
//!
//! Selects which capabilities run for a query. The reasoned path asks the
//! reasoning service once; any failure there (service error, unparseable or
//! out-of-range selection) drops to the deterministic keyword table. There is
//! no routing retry.

pub mod fallback;
pub mod parse;
pub mod prompt;

pub use fallback::FallbackTable;
pub use parse::parse_selection;
pub use prompt::build_routing_prompt;

use crate::capabilities::CapabilityRegistry;
use crate::models::RoutingDecision;
use crate::reasoning::ReasoningService;
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

pub struct QueryRouter {
    reasoner: Arc<dyn ReasoningService>,
    fallback: FallbackTable,
}

impl QueryRouter {
    pub fn new(reasoner: Arc<dyn ReasoningService>) -> Self {
        Self {
            reasoner,
            fallback: FallbackTable::default(),
        }
    }

    pub fn with_fallback_table(mut self, table: FallbackTable) -> Self {
        self.fallback = table;
        self
    }

    pub async fn route(&self, query: &str, registry: &CapabilityRegistry) -> RoutingDecision {
        if query.trim().is_empty() {
            return RoutingDecision::not_applicable(query, "empty query");
        }

        match self.route_reasoned(query, registry).await {
            Ok(decision) => {
                info!(selected = ?decision.selected, "Reasoned routing");
                decision
            }
            Err(e) => {
                warn!(error = %e, "Reasoned routing failed, using keyword fallback");
                self.route_fallback(query, registry, &e.to_string())
            }
        }
    }

    async fn route_reasoned(&self, query: &str, registry: &CapabilityRegistry) -> Result<RoutingDecision> {
        let prompt = build_routing_prompt(query, registry);
        let response = self.reasoner.complete(&prompt).await?;
        let selected = parse_selection(&response, registry)?;

        Ok(RoutingDecision::reasoned(
            query,
            selected,
            Some(response.trim().to_string()),
        ))
    }

    /// Keyword routing; zero matches is the not-applicable decision
    pub fn route_fallback(&self, query: &str, registry: &CapabilityRegistry, reason: &str) -> RoutingDecision {
        let selected = self.fallback.select(query, registry);

        if selected.is_empty() {
            info!("No capability matched the query");
            return RoutingDecision::not_applicable(
                query,
                format!("keyword fallback matched nothing ({})", reason),
            );
        }

        info!(selected = ?selected, "Fallback routing");
        RoutingDecision::fallback(
            query,
            selected,
            Some(format!("keyword fallback ({})", reason)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Capability, InMemoryDocumentIndex, RetrievalCapability};
    use crate::error::CoordinatorError;
    use crate::models::{CompanyProfile, RoutingSource};
    use crate::reasoning::ScriptedReasoner;
    use crate::test_support::demo_registry;

    fn fallback_ids(query: &str) -> Vec<String> {
        let router = QueryRouter::new(Arc::new(ScriptedReasoner::unavailable()));
        router.route_fallback(query, &demo_registry().registry, "test").selected
    }

    #[test]
    fn test_parse_ids_and_indices() {
        let registry = demo_registry().registry;

        assert_eq!(parse_selection("2, 3", &registry).unwrap(), vec!["tsla_filings", "portfolio_database"]);
        assert_eq!(
            parse_selection("```\nMARKET_DATA, aapl_filings, market_data\n```", &registry).unwrap(),
            vec!["market_data", "aapl_filings"]
        );
        assert!(matches!(
            parse_selection("2, 17", &registry),
            Err(CoordinatorError::RoutingParseError(_))
        ));
        assert!(parse_selection("I am not sure", &registry).is_err());
        assert!(parse_selection("NONE", &registry).is_err());
        // Transform capabilities are dropped, leaving nothing
        assert!(parse_selection("pii_guard", &registry).is_err());
    }

    #[test]
    fn test_prompt_lists_descriptions_in_order() {
        let registry = demo_registry().registry;
        let prompt = build_routing_prompt("Who owns Tesla?", &registry);

        assert!(prompt.contains("User Query: Who owns Tesla?"));
        let mut last = 0;
        for (i, (id, description)) in registry.describe_all().iter().enumerate() {
            let line = format!("{}. {}: {}", i, id, description);
            let at = prompt.find(&line).unwrap();
            assert!(at >= last);
            last = at;
        }
    }

    #[test]
    fn test_fallback_keyword_table() {
        assert_eq!(fallback_ids("Show customers who own Tesla stock"), vec!["portfolio_database"]);
        assert_eq!(fallback_ids("What are Apple's main business risks?"), vec!["aapl_filings"]);
        assert_eq!(fallback_ids("What is the current TSLA price?"), vec!["market_data"]);
        assert_eq!(
            fallback_ids("Compare Tesla's 10-K strategy with current TSLA price and our customers' holdings"),
            vec!["tsla_filings", "portfolio_database", "market_data"]
        );
        assert_eq!(fallback_ids("Tell me about Google"), vec!["googl_filings"]);
        assert!(fallback_ids("What's the weather like?").is_empty());
    }

    #[test]
    fn test_fallback_single_letter_ticker() {
        let mut registry = CapabilityRegistry::new();
        for symbol in ["F", "TSLA"] {
            let index = InMemoryDocumentIndex::from_text("Vehicle production and strategy.");
            registry
                .register(Capability::retrieval(RetrievalCapability::new(
                    CompanyProfile::for_symbol(symbol),
                    Arc::new(index),
                )))
                .unwrap();
        }
        let router = QueryRouter::new(Arc::new(ScriptedReasoner::unavailable()));

        let decision = router.route_fallback("Tell me about Tesla", &registry, "test");
        assert_eq!(decision.selected, vec!["tsla_filings"]);

        let decision = router.route_fallback("What is F's strategy?", &registry, "test");
        assert_eq!(decision.selected, vec!["f_filings"]);
    }

    #[tokio::test]
    async fn test_reasoned_route() {
        let support = demo_registry();
        let reasoner = Arc::new(ScriptedReasoner::new(["0,4"]));
        let router = QueryRouter::new(reasoner.clone());

        let decision = router.route("Apple risks and price", &support.registry).await;

        assert_eq!(decision.source, RoutingSource::Reasoned);
        assert_eq!(decision.selected, vec!["aapl_filings", "market_data"]);
        assert_eq!(reasoner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_on_bad_output_without_retry() {
        let support = demo_registry();
        let reasoner = Arc::new(ScriptedReasoner::new(["0, 42"]));
        let router = QueryRouter::new(reasoner.clone());

        let decision = router.route("What are Apple's main business risks?", &support.registry).await;

        assert_eq!(decision.source, RoutingSource::Fallback);
        assert_eq!(decision.selected, vec!["aapl_filings"]);
        assert_eq!(reasoner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_query_is_not_applicable() {
        let reasoner = Arc::new(ScriptedReasoner::unavailable());
        let router = QueryRouter::new(reasoner.clone());

        let decision = router.route("   ", &demo_registry().registry).await;

        assert!(decision.is_not_applicable());
        assert_eq!(reasoner.call_count(), 0);
    }
}
