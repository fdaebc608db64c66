//! Capabilities and the capability registry
//!
//! The set of capability kinds is closed, so handles are an enum rather than
//! trait objects. Collaborators behind each handle (document index, SQL
//! executor, quote source) are the open seams.

pub mod market;
pub mod retrieval;
pub mod structured;

pub use market::{MarketLookupCapability, QuoteSource, YahooFinanceSource};
pub use retrieval::{DocumentIndex, InMemoryDocumentIndex, RetrievalCapability};
pub use structured::{
    sanitize_sql, SqlExecutor, SqliteExecutor, StructuredQueryCapability, MAX_SQL_ATTEMPTS,
    PORTFOLIO_SCHEMA,
};

use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::models::{CapabilityKind, CapabilityOutput, CapabilityResult, CompanyProfile};
use crate::pii::PiiClassifier;
use crate::reasoning::ReasoningService;
use crate::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const PORTFOLIO_DATABASE_ID: &str = "portfolio_database";
pub const MARKET_DATA_ID: &str = "market_data";
pub const PII_GUARD_ID: &str = "pii_guard";

pub enum CapabilityHandle {
    Retrieval(RetrievalCapability),
    StructuredQuery(StructuredQueryCapability),
    ExternalLookup(MarketLookupCapability),
    /// Applied by the coordinator to structured output; not invocable
    Transform(Arc<PiiClassifier>),
}

impl CapabilityHandle {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            CapabilityHandle::Retrieval(_) => CapabilityKind::Retrieval,
            CapabilityHandle::StructuredQuery(_) => CapabilityKind::StructuredQuery,
            CapabilityHandle::ExternalLookup(_) => CapabilityKind::ExternalLookup,
            CapabilityHandle::Transform(_) => CapabilityKind::Transform,
        }
    }
}

pub struct Capability {
    id: String,
    description: String,
    handle: CapabilityHandle,
}

impl Capability {
    pub fn new(id: impl Into<String>, description: impl Into<String>, handle: CapabilityHandle) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            handle,
        }
    }

    pub fn retrieval(capability: RetrievalCapability) -> Self {
        Self::new(
            capability.id(),
            capability.description(),
            CapabilityHandle::Retrieval(capability),
        )
    }

    pub fn structured_query(capability: StructuredQueryCapability) -> Self {
        Self::new(
            PORTFOLIO_DATABASE_ID,
            "Queries the customer and portfolio database with generated SQL: customers and their \
             contact details, portfolio holdings and share counts, company master data, financial \
             metrics and stored market data. Use for questions about customers, clients, holdings \
             or portfolios.",
            CapabilityHandle::StructuredQuery(capability),
        )
    }

    pub fn market_lookup(capability: MarketLookupCapability) -> Self {
        let description = capability.description();
        Self::new(
            MARKET_DATA_ID,
            description,
            CapabilityHandle::ExternalLookup(capability),
        )
    }

    pub fn pii_guard(classifier: Arc<PiiClassifier>) -> Self {
        Self::new(
            PII_GUARD_ID,
            "Masks personally identifiable information (names, emails, phone numbers, addresses, \
             national identifiers) in database results. Applied automatically to structured \
             output; never select it directly.",
            CapabilityHandle::Transform(classifier),
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> CapabilityKind {
        self.handle.kind()
    }

    pub fn handle(&self) -> &CapabilityHandle {
        &self.handle
    }

    /// Covered company, for retrieval capabilities
    pub fn company(&self) -> Option<&CompanyProfile> {
        match &self.handle {
            CapabilityHandle::Retrieval(r) => Some(r.company()),
            _ => None,
        }
    }

    /// Run against the query. Errors are captured in the result, never raised.
    pub async fn invoke(&self, query: &str) -> CapabilityResult {
        let start = Instant::now();
        let kind = self.kind();

        let outcome = match &self.handle {
            CapabilityHandle::Retrieval(c) => c.query(query).await.map(CapabilityOutput::Text),
            CapabilityHandle::StructuredQuery(c) => {
                c.query(query).await.map(CapabilityOutput::Structured)
            }
            CapabilityHandle::ExternalLookup(c) => Ok(CapabilityOutput::Text(c.query(query).await)),
            CapabilityHandle::Transform(_) => Err(CoordinatorError::CapabilityExecutionError(
                format!("{} is applied to structured results and cannot be invoked", self.id),
            )),
        };

        let mut result = match outcome {
            Ok(output) => CapabilityResult::success(&self.id, kind, output),
            Err(e) => {
                warn!(capability = %self.id, error = %e, "Capability failed");
                CapabilityResult::failure(&self.id, kind, e.to_string())
            }
        };
        result.execution_time_ms = start.elapsed().as_millis() as u64;

        debug!(
            capability = %self.id,
            success = result.is_success(),
            elapsed_ms = result.execution_time_ms,
            "Capability invoked"
        );

        result
    }
}

/// Registry listing entry
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityInfo {
    pub id: String,
    pub kind: CapabilityKind,
    pub description: String,
}

/// Capability registry, ordered by registration
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: Vec<Capability>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: Capability) -> Result<()> {
        if self.index.contains_key(capability.id()) {
            return Err(CoordinatorError::DuplicateCapabilityError(
                capability.id().to_string(),
            ));
        }

        self.index
            .insert(capability.id().to_string(), self.capabilities.len());
        self.capabilities.push(capability);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Capability> {
        self.index.get(id).map(|&i| &self.capabilities[i])
    }

    pub fn get_ignore_case(&self, id: &str) -> Option<&Capability> {
        self.get(id).or_else(|| {
            self.capabilities
                .iter()
                .find(|c| c.id().eq_ignore_ascii_case(id))
        })
    }

    pub fn get_by_position(&self, position: usize) -> Option<&Capability> {
        self.capabilities.get(position)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Ordered (id, description) pairs, as shown to the router
    pub fn describe_all(&self) -> Vec<(&str, &str)> {
        self.capabilities
            .iter()
            .map(|c| (c.id(), c.description()))
            .collect()
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn ids(&self) -> Vec<&str> {
        self.capabilities.iter().map(|c| c.id()).collect()
    }

    pub fn info(&self) -> Vec<CapabilityInfo> {
        self.capabilities
            .iter()
            .map(|c| CapabilityInfo {
                id: c.id().to_string(),
                kind: c.kind(),
                description: c.description().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

/// Filing index for one company: `<filings_dir>/<SYMBOL>.txt`, or empty.
fn load_filing_index(config: &CoordinatorConfig, company: &CompanyProfile) -> InMemoryDocumentIndex {
    let Some(dir) = &config.filings_dir else {
        return InMemoryDocumentIndex::empty();
    };

    let path = dir.join(format!("{}.txt", company.symbol));
    match InMemoryDocumentIndex::from_file(&path) {
        Ok(index) => {
            info!(symbol = %company.symbol, passages = index.len(), "Filing index loaded");
            index
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Filing text unavailable");
            InMemoryDocumentIndex::empty()
        }
    }
}

/// Registry with one filing capability per configured company, the portfolio
/// database, the market lookup and the PII guard, in that order.
pub fn create_default_registry(
    config: &CoordinatorConfig,
    reasoner: Arc<dyn ReasoningService>,
    classifier: Arc<PiiClassifier>,
) -> Result<CapabilityRegistry> {
    let mut registry = CapabilityRegistry::new();

    for company in &config.companies {
        let index = load_filing_index(config, company);
        registry.register(Capability::retrieval(RetrievalCapability::new(
            company.clone(),
            Arc::new(index),
        )))?;
    }

    let executor = SqliteExecutor::connect_lazy(&config.database_url)?;
    registry.register(Capability::structured_query(StructuredQueryCapability::new(
        reasoner,
        Arc::new(executor),
    )))?;

    let quotes = YahooFinanceSource::new(&config.market)?;
    registry.register(Capability::market_lookup(MarketLookupCapability::new(
        Arc::new(quotes),
        config.companies.clone(),
    )))?;

    registry.register(Capability::pii_guard(classifier))?;

    Ok(registry)
}
