//! Execution coordinator
//!
//! Invokes the routed capabilities for one query and protects their
//! structured output before anything downstream sees it.

use crate::capabilities::CapabilityRegistry;
use crate::models::{CapabilityResult, RoutingDecision};
use crate::pii::PiiClassifier;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Answer returned when routing selects nothing
pub const NOT_APPLICABLE_RESPONSE: &str =
    "Unable to process query. No appropriate tools found or error occurred.";

pub struct ExecutionCoordinator {
    registry: Arc<CapabilityRegistry>,
    classifier: Arc<PiiClassifier>,
}

impl ExecutionCoordinator {
    pub fn new(registry: Arc<CapabilityRegistry>, classifier: Arc<PiiClassifier>) -> Self {
        Self {
            registry,
            classifier,
        }
    }

    /// One result per selected id, in routing order.
    ///
    /// Invocations run concurrently and are all awaited before returning; a
    /// failing capability yields an error result without affecting the rest.
    pub async fn execute(&self, decision: &RoutingDecision) -> Vec<CapabilityResult> {
        if decision.is_not_applicable() {
            return Vec::new();
        }

        let query = decision.query.as_str();
        let invocations = decision.selected.iter().map(|id| async move {
            match self.registry.get(id) {
                Some(capability) => capability.invoke(query).await,
                None => {
                    warn!(capability = %id, "Selected capability is not registered");
                    CapabilityResult::unregistered(id)
                }
            }
        });

        let mut results = join_all(invocations).await;

        for result in results.iter_mut() {
            self.protect(result);
        }

        results
    }

    /// Mask PII in structured output and attach the masked field names.
    pub fn protect(&self, result: &mut CapabilityResult) {
        let Some(structured) = result.structured_mut() else {
            return;
        };

        let masked = self.classifier.protect(structured);
        if masked.is_empty() {
            return;
        }

        info!(
            capability = %result.capability_id,
            masked = ?masked,
            "PII protection applied"
        );
        result.protected = true;
        result.masked_fields = masked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::ScriptedReasoner;
    use crate::test_support::demo_setup;

    #[tokio::test]
    async fn test_not_applicable_invokes_nothing() {
        let setup = demo_setup(Arc::new(ScriptedReasoner::unavailable()));
        let coordinator = ExecutionCoordinator::new(setup.registry.clone(), setup.classifier.clone());

        let decision = RoutingDecision::not_applicable("weather?", "nothing matched");
        assert!(coordinator.execute(&decision).await.is_empty());
        assert_eq!(setup.total_invocations(), 0);
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        // SQL generation has no scripted response, so the database fails
        let setup = demo_setup(Arc::new(ScriptedReasoner::unavailable()));
        let coordinator = ExecutionCoordinator::new(setup.registry.clone(), setup.classifier.clone());

        let decision = RoutingDecision::reasoned(
            "Tesla strategy, price and holders",
            vec![
                "tsla_filings".to_string(),
                "portfolio_database".to_string(),
                "market_data".to_string(),
                "unknown_capability".to_string(),
            ],
            None,
        );
        let results = coordinator.execute(&decision).await;

        let ids: Vec<_> = results.iter().map(|r| r.capability_id.as_str()).collect();
        assert_eq!(ids, vec!["tsla_filings", "portfolio_database", "market_data", "unknown_capability"]);
        assert!(results[0].is_success());
        assert!(results[1].error.as_deref().unwrap().contains("Reasoning service unavailable"));
        assert!(results[2].is_success());
        assert!(results[3].kind.is_none());
    }

    #[tokio::test]
    async fn test_structured_results_are_masked() {
        let reasoner = Arc::new(ScriptedReasoner::new([
            "SELECT first_name, last_name, email, phone, symbol, shares FROM customers WHERE symbol = 'TSLA'",
        ]));
        let setup = demo_setup(reasoner);
        let coordinator = ExecutionCoordinator::new(setup.registry.clone(), setup.classifier.clone());

        let decision = RoutingDecision::reasoned(
            "Show customers who own Tesla stock",
            vec!["portfolio_database".to_string()],
            None,
        );
        let results = coordinator.execute(&decision).await;
        let result = &results[0];

        assert!(result.protected);
        assert_eq!(result.masked_fields, vec!["first_name", "last_name", "email", "phone"]);

        let rendered = result.render();
        assert!(!rendered.contains("jane.doe@example.com"));
        assert!(rendered.contains("***@example.com"));
        assert!(rendered.contains("[PII Protection Applied]"));
    }
}
