//! Spy collaborators and a demo registry shared by the unit tests

use crate::capabilities::{
    Capability, CapabilityRegistry, DocumentIndex, InMemoryDocumentIndex, MarketLookupCapability,
    QuoteSource, RetrievalCapability, SqlExecutor, StructuredQueryCapability,
};
use crate::error::CoordinatorError;
use crate::models::{default_companies, Quote, StructuredResult};
use crate::pii::PiiClassifier;
use crate::reasoning::{ReasoningService, ScriptedReasoner};
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const AAPL_FILING: &str = "Apple designs iPhone, Mac, iPad and wearables and sells services.\n\n\
Risk factors: the business depends on global supply chains, intense competition and \
regulatory scrutiny of the App Store.";

pub const GOOGL_FILING: &str = "Alphabet earns most revenue from Google advertising.\n\n\
Risk factors: antitrust regulation and competition in search and cloud.";

pub const TSLA_FILING: &str = "Tesla designs and manufactures electric vehicles and energy storage.\n\n\
Our strategy is to expand vehicle production capacity and lower battery cost.";

pub struct CountingIndex {
    inner: InMemoryDocumentIndex,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl DocumentIndex for CountingIndex {
    async fn query(&self, text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.query(text).await
    }
}

/// Fixed customer/holdings table; SQL mentioning `bogus` fails like a bad column
pub struct SpySqlExecutor {
    pub calls: AtomicUsize,
    pub statements: std::sync::Mutex<Vec<String>>,
}

impl SpySqlExecutor {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            statements: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SqlExecutor for SpySqlExecutor {
    async fn execute(&self, sql: &str) -> Result<StructuredResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.statements.lock().unwrap().push(sql.to_string());

        if sql.contains("bogus") {
            return Err(CoordinatorError::StructuredQueryError(
                "no such column: bogus".to_string(),
            ));
        }

        let columns = ["first_name", "last_name", "email", "phone", "symbol", "shares"];
        let rows = [
            ["Jane", "Doe", "jane.doe@example.com", "555-123-4567", "TSLA", "10"],
            ["Rob", "Stone", "rob@corp.io", "555-987-6543", "AAPL", "4"],
            ["Ana", "Lima", "ana@lima.dev", "555-222-0001", "TSLA", "2.5"],
        ];

        let wanted = ["TSLA", "AAPL", "GOOGL"]
            .into_iter()
            .find(|symbol| sql.contains(&format!("'{}'", symbol)));

        Ok(StructuredResult::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .filter(|row| wanted.map_or(true, |symbol| row[4] == symbol))
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        ))
    }
}

pub struct SpyQuotes {
    pub calls: AtomicUsize,
}

#[async_trait]
impl QuoteSource for SpyQuotes {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (price, previous) = match symbol {
            "AAPL" => (190.0, 188.0),
            "GOOGL" => (140.0, 141.0),
            "TSLA" => (250.0, 240.0),
            other => {
                return Err(CoordinatorError::MarketLookupError(format!(
                    "unknown symbol {}",
                    other
                )))
            }
        };

        Ok(Quote {
            symbol: symbol.to_string(),
            current_price: price,
            previous_close: previous,
            volume: 1_000_000,
            market_cap: 0.0,
        })
    }
}

pub struct DemoSetup {
    pub registry: Arc<CapabilityRegistry>,
    pub classifier: Arc<PiiClassifier>,
    pub document_calls: Arc<AtomicUsize>,
    pub sql: Arc<SpySqlExecutor>,
    pub quotes: Arc<SpyQuotes>,
}

impl DemoSetup {
    pub fn total_invocations(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
            + self.sql.calls.load(Ordering::SeqCst)
            + self.quotes.calls.load(Ordering::SeqCst)
    }
}

/// Same layout as the default registry, backed by spies.
/// `reasoner` generates SQL for the portfolio database.
pub fn demo_setup(reasoner: Arc<ScriptedReasoner>) -> DemoSetup {
    let classifier = Arc::new(PiiClassifier::default());
    let document_calls = Arc::new(AtomicUsize::new(0));
    let sql = Arc::new(SpySqlExecutor::new());
    let quotes = Arc::new(SpyQuotes {
        calls: AtomicUsize::new(0),
    });

    let mut registry = CapabilityRegistry::new();
    for (company, filing) in default_companies()
        .into_iter()
        .zip([AAPL_FILING, GOOGL_FILING, TSLA_FILING])
    {
        let index = CountingIndex {
            inner: InMemoryDocumentIndex::from_text(filing),
            calls: document_calls.clone(),
        };
        registry
            .register(Capability::retrieval(RetrievalCapability::new(
                company,
                Arc::new(index),
            )))
            .unwrap();
    }

    let reasoner: Arc<dyn ReasoningService> = reasoner;
    registry
        .register(Capability::structured_query(StructuredQueryCapability::new(
            reasoner,
            sql.clone(),
        )))
        .unwrap();
    registry
        .register(Capability::market_lookup(MarketLookupCapability::new(
            quotes.clone(),
            default_companies(),
        )))
        .unwrap();
    registry
        .register(Capability::pii_guard(classifier.clone()))
        .unwrap();

    DemoSetup {
        registry: Arc::new(registry),
        classifier,
        document_calls,
        sql,
        quotes,
    }
}

pub fn demo_registry() -> DemoSetup {
    demo_setup(Arc::new(ScriptedReasoner::unavailable()))
}
