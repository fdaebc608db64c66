//! Deterministic keyword routing, used when the reasoned path fails

use crate::capabilities::CapabilityRegistry;
use crate::models::CapabilityKind;

const STRUCTURED_TERMS: &[&str] = &[
    "customer",
    "client",
    "portfolio",
    "holding",
    "investor",
    "database",
    "risk tolerance",
    "investment profile",
];

const LOOKUP_TERMS: &[&str] = &[
    "price",
    "quote",
    "market cap",
    "volume",
    "trading at",
    "stock performance",
];

const FILING_TERMS: &[&str] = &[
    "10-k",
    "10k",
    "filing",
    "annual report",
    "business",
    "strategy",
    "strategic",
    "risk",
    "revenue",
    "earnings",
    "income",
    "profit",
    "margin",
    "segment",
    "product",
    "competition",
    "competitor",
    "operations",
    "outlook",
    "guidance",
    "management",
    "research",
    "supply chain",
    "regulat",
    "legal",
    "employee",
    "growth",
];

/// Keyword table per capability kind
#[derive(Debug, Clone)]
pub struct FallbackTable {
    pub structured_terms: Vec<String>,
    pub lookup_terms: Vec<String>,
    pub filing_terms: Vec<String>,
}

impl Default for FallbackTable {
    fn default() -> Self {
        let owned = |terms: &[&str]| terms.iter().map(|t| t.to_string()).collect();
        Self {
            structured_terms: owned(STRUCTURED_TERMS),
            lookup_terms: owned(LOOKUP_TERMS),
            filing_terms: owned(FILING_TERMS),
        }
    }
}

fn mentions_any(lowered: &str, terms: &[String]) -> bool {
    terms.iter().any(|t| lowered.contains(t.as_str()))
}

impl FallbackTable {
    /// Matching capability ids in registry order; empty when nothing matches.
    ///
    /// A filing capability matches when its company is named and the query
    /// either uses filing vocabulary or matches nothing else.
    pub fn select(&self, query: &str, registry: &CapabilityRegistry) -> Vec<String> {
        let lowered = query.to_lowercase();
        let structured = mentions_any(&lowered, &self.structured_terms);
        let lookup = mentions_any(&lowered, &self.lookup_terms);
        let filing = mentions_any(&lowered, &self.filing_terms);

        registry
            .capabilities()
            .iter()
            .filter(|capability| match capability.kind() {
                CapabilityKind::StructuredQuery => structured,
                CapabilityKind::ExternalLookup => lookup,
                CapabilityKind::Retrieval => capability.company().is_some_and(|company| {
                    company.is_mentioned_in(&lowered) && (filing || !(structured || lookup))
                }),
                CapabilityKind::Transform => false,
            })
            .map(|capability| capability.id().to_string())
            .collect()
    }
}
