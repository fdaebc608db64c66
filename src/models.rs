//! Core data models for the financial agent coordinator

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Retrieval,
    StructuredQuery,
    ExternalLookup,
    Transform,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoutingSource {
    Reasoned,
    Fallback,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMode {
    /// Router found nothing to run; no capability was invoked
    NotApplicable,
    NoResults,
    /// Single result returned verbatim
    PassThrough,
    Fused,
    /// Fusion failed; labelled outputs concatenated
    Concatenated,
}

//
// ================= Entities =================
//

/// A company covered by a filing capability and the market lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompanyProfile {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    /// Lowercase terms that identify the company in free text
    pub aliases: Vec<String>,
}

impl CompanyProfile {
    pub fn new(symbol: &str, name: &str, sector: &str, aliases: &[&str]) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            sector: sector.to_string(),
            aliases: aliases.iter().map(|a| a.to_lowercase()).collect(),
        }
    }

    /// Whether a lowercased query names this company as a whole word
    pub fn is_mentioned_in(&self, lowered: &str) -> bool {
        mentions_word(lowered, &self.symbol.to_lowercase())
            || self.aliases.iter().any(|alias| mentions_word(lowered, alias))
    }

    /// Profile for a known ticker, or a bare profile for anything else
    pub fn for_symbol(symbol: &str) -> Self {
        let symbol = symbol.trim().to_uppercase();
        default_companies()
            .into_iter()
            .find(|c| c.symbol == symbol)
            .unwrap_or_else(|| {
                let alias = symbol.to_lowercase();
                CompanyProfile::new(&symbol, &symbol, "Unknown", &[alias.as_str()])
            })
    }
}

fn mentions_word(lowered: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    Regex::new(&format!(r"\b{}\b", regex::escape(term)))
        .map(|re| re.is_match(lowered))
        .unwrap_or(false)
}

pub fn default_companies() -> Vec<CompanyProfile> {
    vec![
        CompanyProfile::new("AAPL", "Apple Inc.", "Technology", &["apple"]),
        CompanyProfile::new("GOOGL", "Alphabet Inc.", "Technology", &["google", "alphabet"]),
        CompanyProfile::new("TSLA", "Tesla Inc.", "Automotive", &["tesla"]),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub current_price: f64,
    pub previous_close: f64,
    pub volume: u64,
    pub market_cap: f64,
}

impl Quote {
    pub fn price_change(&self) -> f64 {
        self.current_price - self.previous_close
    }

    pub fn change_percentage(&self) -> f64 {
        if self.previous_close > 0.0 {
            self.price_change() / self.previous_close * 100.0
        } else {
            0.0
        }
    }
}

//
// ================= Routing =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub query: String,
    pub selected: Vec<String>,
    pub rationale: Option<String>,
    pub source: RoutingSource,
}

impl RoutingDecision {
    pub fn reasoned(query: &str, selected: Vec<String>, rationale: Option<String>) -> Self {
        Self {
            query: query.to_string(),
            selected,
            rationale,
            source: RoutingSource::Reasoned,
        }
    }

    pub fn fallback(query: &str, selected: Vec<String>, rationale: Option<String>) -> Self {
        Self {
            query: query.to_string(),
            selected,
            rationale,
            source: RoutingSource::Fallback,
        }
    }

    /// The explicit "no capability applicable" outcome
    pub fn not_applicable(query: &str, rationale: impl Into<String>) -> Self {
        Self::fallback(query, Vec::new(), Some(rationale.into()))
    }

    pub fn is_not_applicable(&self) -> bool {
        self.selected.is_empty()
    }
}

//
// ================= Capability Output =================
//

/// Tabular rows with their ordered column names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StructuredResult {
    /// Statement that produced the rows, when known
    pub sql: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl StructuredResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            sql: None,
            columns,
            rows,
        }
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(sql) = &self.sql {
            out.push_str(&format!("SQL Query: {}\n\n", sql));
        }
        out.push_str(&format!("Columns: {}\n\n", self.columns.join(", ")));
        out.push_str("Database Results:\n");

        if self.rows.is_empty() {
            out.push_str("No results found.\n");
            return out;
        }

        for (i, row) in self.rows.iter().enumerate() {
            out.push_str(&format!("Row {}:\n", i + 1));
            for (column, value) in self.columns.iter().zip(row.iter()) {
                out.push_str(&format!("  {}: {}\n", column, value));
            }
            out.push('\n');
        }

        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CapabilityOutput {
    Text(String),
    Structured(StructuredResult),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub capability_id: String,
    /// None when the id was not found in the registry
    pub kind: Option<CapabilityKind>,
    pub raw_output: Option<CapabilityOutput>,
    pub protected: bool,
    /// Fields rewritten by PII masking; empty unless `protected`
    pub masked_fields: Vec<String>,
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl CapabilityResult {
    pub fn success(capability_id: &str, kind: CapabilityKind, output: CapabilityOutput) -> Self {
        Self {
            capability_id: capability_id.to_string(),
            kind: Some(kind),
            raw_output: Some(output),
            protected: false,
            masked_fields: Vec::new(),
            error: None,
            execution_time_ms: 0,
        }
    }

    pub fn failure(capability_id: &str, kind: CapabilityKind, error: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            ..Self::unregistered(capability_id)
        }
        .with_error(error)
    }

    pub fn unregistered(capability_id: &str) -> Self {
        Self {
            capability_id: capability_id.to_string(),
            kind: None,
            raw_output: None,
            protected: false,
            masked_fields: Vec::new(),
            error: Some("capability is not registered".to_string()),
            execution_time_ms: 0,
        }
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.raw_output.is_some()
    }

    pub fn structured(&self) -> Option<&StructuredResult> {
        match &self.raw_output {
            Some(CapabilityOutput::Structured(s)) => Some(s),
            _ => None,
        }
    }

    pub fn structured_mut(&mut self) -> Option<&mut StructuredResult> {
        match &mut self.raw_output {
            Some(CapabilityOutput::Structured(s)) => Some(s),
            _ => None,
        }
    }

    /// Text form used for pass-through answers and fusion prompts
    pub fn render(&self) -> String {
        if let Some(error) = &self.error {
            return format!("Error: {}", error);
        }

        let mut out = match &self.raw_output {
            Some(CapabilityOutput::Text(text)) => text.clone(),
            Some(CapabilityOutput::Structured(s)) => s.render(),
            None => "No output.".to_string(),
        };

        if self.protected && !self.masked_fields.is_empty() {
            out.push_str(&format!(
                "\n[PII Protection Applied] The following fields have been masked for privacy: {}",
                self.masked_fields.join(", ")
            ));
        }

        out
    }
}

//
// ================= Final Answer =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedAnswer {
    pub text: String,
    pub contributing_capability_ids: BTreeSet<String>,
    pub masked_fields: BTreeSet<String>,
    pub mode: SynthesisMode,
}

impl SynthesizedAnswer {
    pub fn fixed(text: &str, mode: SynthesisMode) -> Self {
        Self {
            text: text.to_string(),
            contributing_capability_ids: BTreeSet::new(),
            masked_fields: BTreeSet::new(),
            mode,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query_id: Uuid,
    pub answer: SynthesizedAnswer,
    pub decision: RoutingDecision,
    pub results: Vec<CapabilityResult>,
    pub reasoning_trace: Vec<String>,
    pub execution_time_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CapabilityKind::Retrieval => "retrieval",
            CapabilityKind::StructuredQuery => "structured-query",
            CapabilityKind::ExternalLookup => "external-lookup",
            CapabilityKind::Transform => "transform",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for RoutingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoutingSource::Reasoned => "reasoned",
            RoutingSource::Fallback => "fallback",
        };
        write!(f, "{}", s)
    }
}
