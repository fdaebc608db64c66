//! Routing prompt

use crate::capabilities::CapabilityRegistry;
use crate::models::CapabilityKind;

fn ids_of_kind(registry: &CapabilityRegistry, kind: CapabilityKind) -> String {
    let ids: Vec<&str> = registry
        .capabilities()
        .iter()
        .filter(|c| c.kind() == kind)
        .map(|c| c.id())
        .collect();

    if ids.is_empty() {
        "(none registered)".to_string()
    } else {
        ids.join(", ")
    }
}

/// Build the selection prompt. Descriptions are listed verbatim, indexed in
/// registry order.
pub fn build_routing_prompt(query: &str, registry: &CapabilityRegistry) -> String {
    let listing: Vec<String> = registry
        .describe_all()
        .iter()
        .enumerate()
        .map(|(i, (id, description))| format!("{}. {}: {}", i, id, description))
        .collect();

    format!(
        r#"You are a financial agent coordinator. Analyze the user query and select the capabilities needed to answer it.

User Query: {query}

Available Capabilities:
{listing}

Routing Guidelines:
- Customers, clients, portfolios, holdings or other stored records: {structured}
- Current stock prices, quotes, trading volume or market cap: {lookup}
- A company's business, strategy, risks, products or reported financials: that company's filing capability ({retrieval})
- A query may need several capabilities; select every one that applies
- Masking capabilities ({transform}) are applied automatically; never select them
- If no capability applies, answer NONE

Return ONLY a comma-separated list of capability indices (0-based) or ids, nothing else.
Examples: "1" or "2,3,4" or "tsla_filings,portfolio_database"

Selected capabilities:"#,
        query = query,
        listing = listing.join("\n"),
        structured = ids_of_kind(registry, CapabilityKind::StructuredQuery),
        lookup = ids_of_kind(registry, CapabilityKind::ExternalLookup),
        retrieval = ids_of_kind(registry, CapabilityKind::Retrieval),
        transform = ids_of_kind(registry, CapabilityKind::Transform),
    )
}
