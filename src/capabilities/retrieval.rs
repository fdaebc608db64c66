//! Filing retrieval capability
//!
//! One capability per covered company, each backed by its own document index.

use crate::error::CoordinatorError;
use crate::models::CompanyProfile;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_TOP_K: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "and", "are", "for", "from", "has", "have", "how", "its", "main", "our", "that",
    "their", "this", "what", "when", "which", "who", "why", "with", "does", "about",
    "into", "over", "was", "were", "will", "can", "tell", "give", "show", "please",
];

/// Search over pre-indexed filing text
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Relevant passages for a free-text query
    async fn query(&self, text: &str) -> Result<String>;
}

/// Passage index held in memory, ranked by query term overlap.
#[derive(Debug, Clone)]
pub struct InMemoryDocumentIndex {
    passages: Vec<String>,
    top_k: usize,
}

impl InMemoryDocumentIndex {
    pub fn new(passages: Vec<String>) -> Self {
        Self {
            passages,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Index with no passages; every query fails with `RetrievalError`
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Split on blank lines into passages
    pub fn from_text(text: &str) -> Self {
        let passages = text
            .split("\n\n")
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string())
            .collect();
        Self::new(passages)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_text(&text))
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    fn rank(&self, text: &str) -> Vec<&str> {
        let terms = query_terms(text);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize)> = self
            .passages
            .iter()
            .enumerate()
            .filter_map(|(i, passage)| {
                let words: HashSet<String> = words(passage).collect();
                let score = terms.iter().filter(|t| words.contains(*t)).count();
                (score > 0).then_some((i, score))
            })
            .collect();

        // Highest score first, document order on ties
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        scored
            .into_iter()
            .take(self.top_k)
            .map(|(i, _)| self.passages[i].as_str())
            .collect()
    }
}

#[async_trait]
impl DocumentIndex for InMemoryDocumentIndex {
    async fn query(&self, text: &str) -> Result<String> {
        if self.passages.is_empty() {
            return Err(CoordinatorError::RetrievalError(
                "no filing passages are indexed".to_string(),
            ));
        }

        let hits = self.rank(text);
        debug!(passages = self.passages.len(), hits = hits.len(), "Filing index searched");

        if hits.is_empty() {
            return Err(CoordinatorError::RetrievalError(
                "no passage matched the query".to_string(),
            ));
        }

        Ok(hits.join("\n\n"))
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|w| w.trim_matches('-').to_lowercase())
        .filter(|w| w.len() >= 3)
}

fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in words(text) {
        if !STOPWORDS.contains(&word.as_str()) && !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Answers questions about one company's annual report
pub struct RetrievalCapability {
    company: CompanyProfile,
    index: Arc<dyn DocumentIndex>,
}

impl RetrievalCapability {
    pub fn new(company: CompanyProfile, index: Arc<dyn DocumentIndex>) -> Self {
        Self { company, index }
    }

    pub fn company(&self) -> &CompanyProfile {
        &self.company
    }

    pub fn id(&self) -> String {
        format!("{}_filings", self.company.symbol.to_lowercase())
    }

    pub fn description(&self) -> String {
        format!(
            "Answers questions about {} ({}) from its SEC 10-K annual report: business overview, \
             strategy, risk factors, products, competition and reported financials.",
            self.company.name, self.company.symbol
        )
    }

    pub async fn query(&self, query: &str) -> Result<String> {
        let passages = self.index.query(query).await?;
        Ok(format!(
            "From {} ({}) 10-K filing:\n\n{}",
            self.company.name, self.company.symbol, passages
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILING: &str = "Tesla designs and manufactures electric vehicles.\n\n\
        Our strategy is to expand production capacity and reduce battery cost.\n\n\
        Risk factors include supply chain disruption and competition in electric vehicles.";

    #[tokio::test]
    async fn test_ranks_passages_by_overlap() {
        let index = InMemoryDocumentIndex::from_text(FILING).with_top_k(1);
        assert_eq!(index.len(), 3);

        let hits = index.query("What is Tesla's strategy for battery cost?").await.unwrap();
        assert!(hits.starts_with("Our strategy"));
    }

    #[tokio::test]
    async fn test_no_match_is_retrieval_error() {
        let index = InMemoryDocumentIndex::from_text(FILING);
        assert!(matches!(
            index.query("quarterly dividend").await,
            Err(CoordinatorError::RetrievalError(_))
        ));
        assert!(InMemoryDocumentIndex::empty().query("tesla").await.is_err());
    }

    #[tokio::test]
    async fn test_capability_labels_company() {
        let capability = RetrievalCapability::new(
            CompanyProfile::for_symbol("TSLA"),
            Arc::new(InMemoryDocumentIndex::from_text(FILING)),
        );
        assert_eq!(capability.id(), "tsla_filings");

        let text = capability.query("supply chain risk").await.unwrap();
        assert!(text.starts_with("From Tesla Inc. (TSLA) 10-K filing:"));
        assert!(text.contains("supply chain disruption"));
    }
}
