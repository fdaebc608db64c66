//! Answer synthesis
//!
//! Zero results → fixed answer, one result → passed through untouched, two or
//! more → one fusion request. If fusion fails the labelled outputs are
//! concatenated so no contributed data is lost.

use crate::models::{CapabilityResult, SynthesisMode, SynthesizedAnswer};
use crate::reasoning::ReasoningService;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

pub const CANNOT_ANSWER_RESPONSE: &str =
    "I could not find information to answer this query with the available capabilities.";

pub struct Synthesizer {
    reasoner: Arc<dyn ReasoningService>,
}

fn label(result: &CapabilityResult) -> String {
    match result.kind {
        Some(kind) => format!("[{}] ({})", result.capability_id, kind),
        None => format!("[{}]", result.capability_id),
    }
}

pub fn build_fusion_prompt(query: &str, results: &[CapabilityResult]) -> String {
    let sections: Vec<String> = results
        .iter()
        .map(|r| format!("{}\n{}", label(r), r.render()))
        .collect();

    format!(
        r#"You are a financial analyst. Combine the outputs below into one coherent answer to the user's query.

User Query: {}

Capability Outputs:
{}

Instructions:
- Use only the information above and cite the capability id for each fact, e.g. [tsla_filings]
- Where an output reports an error, say that part of the answer is unavailable
- Keep masked values masked; never guess at hidden personal data
- Mention any [PII Protection Applied] notice in your answer

Answer:"#,
        query,
        sections.join("\n\n")
    )
}

fn concatenate(results: &[CapabilityResult]) -> String {
    results
        .iter()
        .map(|r| format!("### From {}\n{}", r.capability_id, r.render()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl Synthesizer {
    pub fn new(reasoner: Arc<dyn ReasoningService>) -> Self {
        Self { reasoner }
    }

    pub async fn synthesize(&self, query: &str, results: &[CapabilityResult]) -> SynthesizedAnswer {
        let contributing: BTreeSet<String> = results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.capability_id.clone())
            .collect();
        let masked: BTreeSet<String> = results
            .iter()
            .flat_map(|r| r.masked_fields.iter().cloned())
            .collect();

        let (text, mode) = match results {
            [] => (CANNOT_ANSWER_RESPONSE.to_string(), SynthesisMode::NoResults),
            [single] => (single.render(), SynthesisMode::PassThrough),
            _ => {
                let prompt = build_fusion_prompt(query, results);
                match self.reasoner.complete(&prompt).await {
                    Ok(fused) if !fused.trim().is_empty() => {
                        info!(results = results.len(), "Results fused");
                        (fused.trim().to_string(), SynthesisMode::Fused)
                    }
                    Ok(_) => {
                        warn!("Fusion returned an empty answer, concatenating");
                        (concatenate(results), SynthesisMode::Concatenated)
                    }
                    Err(e) => {
                        warn!(error = %e, "Fusion failed, concatenating");
                        (concatenate(results), SynthesisMode::Concatenated)
                    }
                }
            }
        };

        SynthesizedAnswer {
            text,
            contributing_capability_ids: contributing,
            masked_fields: masked,
            mode,
        }
    }
}
