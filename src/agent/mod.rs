//! Financial agent - runs one query end to end
//!
//! QUERY → ROUTE → EXECUTE → PROTECT → SYNTHESIZE → ANSWER

use crate::capabilities::{create_default_registry, CapabilityInfo, CapabilityRegistry};
use crate::config::CoordinatorConfig;
use crate::coordinator::{ExecutionCoordinator, NOT_APPLICABLE_RESPONSE};
use crate::gemini::GeminiClient;
use crate::models::{
    CapabilityResult, QueryOutcome, RoutingDecision, SynthesisMode, SynthesizedAnswer,
};
use crate::pii::{MaskingRuleTable, PiiClassifier};
use crate::reasoning::ReasoningService;
use crate::router::QueryRouter;
use crate::synthesis::Synthesizer;
use crate::Result;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub companies: Vec<String>,
    pub capabilities: Vec<CapabilityInfo>,
    pub ready: bool,
}

pub struct FinancialAgent {
    registry: Arc<CapabilityRegistry>,
    router: QueryRouter,
    coordinator: ExecutionCoordinator,
    synthesizer: Synthesizer,
    companies: Vec<String>,
}

impl FinancialAgent {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        classifier: Arc<PiiClassifier>,
        reasoner: Arc<dyn ReasoningService>,
    ) -> Self {
        let companies = registry
            .capabilities()
            .iter()
            .filter_map(|c| c.company().map(|company| company.symbol.clone()))
            .collect();

        Self {
            router: QueryRouter::new(reasoner.clone()),
            coordinator: ExecutionCoordinator::new(registry.clone(), classifier),
            synthesizer: Synthesizer::new(reasoner),
            registry,
            companies,
        }
    }

    /// Wire the Gemini client, masking rules and default registry from config.
    pub fn from_config(config: &CoordinatorConfig) -> Result<Self> {
        let reasoner: Arc<dyn ReasoningService> = Arc::new(GeminiClient::new(&config.reasoning)?);

        let table = match &config.pii_rules_path {
            Some(path) => MaskingRuleTable::from_file(path)?,
            None => MaskingRuleTable::builtin(),
        };
        let classifier = Arc::new(PiiClassifier::new(table));

        let registry = create_default_registry(config, reasoner.clone(), classifier.clone())?;
        info!(
            capabilities = registry.len(),
            companies = config.companies.len(),
            "Financial agent initialized"
        );

        Ok(Self::new(Arc::new(registry), classifier, reasoner))
    }

    /// Answer one query. Every failure is contained; a text answer is always produced.
    pub async fn query(&self, query: &str) -> QueryOutcome {
        let start_time = Instant::now();
        let query_id = Uuid::new_v4();
        let mut reasoning_trace = Vec::new();

        info!(query_id = %query_id, query = %query, "Agent: processing query");

        // === ROUTE ===
        let decision = self.router.route(query, &self.registry).await;
        reasoning_trace.push(format!(
            "ROUTE: {} [{}]",
            decision.source,
            decision.selected.join(", ")
        ));

        if decision.is_not_applicable() {
            reasoning_trace.push("ROUTE: no capability applicable".to_string());
            return self.finish(
                query_id,
                SynthesizedAnswer::fixed(NOT_APPLICABLE_RESPONSE, SynthesisMode::NotApplicable),
                decision,
                Vec::new(),
                reasoning_trace,
                start_time,
            );
        }

        // === EXECUTE ===
        let results = self.coordinator.execute(&decision).await;
        for result in &results {
            reasoning_trace.push(format!(
                "EXECUTE: {} - {} ({} ms)",
                result.capability_id,
                if result.is_success() { "ok" } else { "error" },
                result.execution_time_ms
            ));
        }

        // === PROTECT ===
        for result in results.iter().filter(|r| r.protected) {
            reasoning_trace.push(format!(
                "PROTECT: {} masked [{}]",
                result.capability_id,
                result.masked_fields.join(", ")
            ));
        }

        // === SYNTHESIZE ===
        let answer = self.synthesizer.synthesize(query, &results).await;
        reasoning_trace.push(format!("SYNTHESIZE: {:?}", answer.mode));

        debug!(query_id = %query_id, mode = ?answer.mode, "Answer ready");

        self.finish(query_id, answer, decision, results, reasoning_trace, start_time)
    }

    fn finish(
        &self,
        query_id: Uuid,
        answer: SynthesizedAnswer,
        decision: RoutingDecision,
        results: Vec<CapabilityResult>,
        reasoning_trace: Vec<String>,
        start_time: Instant,
    ) -> QueryOutcome {
        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        info!(
            query_id = %query_id,
            routing = %decision.source,
            capabilities = results.len(),
            elapsed_ms = execution_time_ms,
            "Agent: query complete"
        );

        QueryOutcome {
            query_id,
            answer,
            decision,
            results,
            reasoning_trace,
            execution_time_ms,
            completed_at: Utc::now(),
        }
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            companies: self.companies.clone(),
            capabilities: self.registry.info(),
            ready: !self.registry.is_empty(),
        }
    }

    pub fn list_capabilities(&self) -> Vec<String> {
        self.registry.ids().into_iter().map(String::from).collect()
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }
}
