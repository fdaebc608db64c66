//! Market lookup capability
//!
//! Current quotes from the Yahoo Finance chart endpoint. The capability never
//! fails as a whole: per-symbol errors are reported inline in its text.

use crate::config::MarketConfig;
use crate::error::CoordinatorError;
use crate::models::{CompanyProfile, Quote};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote>;
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_volume: Option<u64>,
    market_cap: Option<f64>,
}

fn quote_from_chart(symbol: &str, envelope: ChartEnvelope) -> Result<Quote> {
    let meta = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|r| r.meta)
        .ok_or_else(|| CoordinatorError::MarketLookupError("Invalid response format".to_string()))?;

    let current_price = meta
        .regular_market_price
        .or(meta.previous_close)
        .ok_or_else(|| CoordinatorError::MarketLookupError("Price data not available".to_string()))?;

    Ok(Quote {
        symbol: symbol.to_string(),
        current_price,
        previous_close: meta
            .previous_close
            .or(meta.chart_previous_close)
            .unwrap_or(current_price),
        volume: meta.regular_market_volume.unwrap_or(0),
        market_cap: meta.market_cap.unwrap_or(0.0),
    })
}

pub struct YahooFinanceSource {
    client: Client,
    base_url: String,
}

impl YahooFinanceSource {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteSource for YahooFinanceSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);

        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| CoordinatorError::MarketLookupError(format!("API request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoordinatorError::MarketLookupError(format!(
                "API request failed: HTTP {}",
                status
            )));
        }

        let envelope: ChartEnvelope = response
            .json()
            .await
            .map_err(|e| CoordinatorError::MarketLookupError(format!("Invalid response: {}", e)))?;

        quote_from_chart(symbol, envelope)
    }
}

pub struct MarketLookupCapability {
    source: Arc<dyn QuoteSource>,
    companies: Vec<CompanyProfile>,
}

impl MarketLookupCapability {
    pub fn new(source: Arc<dyn QuoteSource>, companies: Vec<CompanyProfile>) -> Self {
        Self { source, companies }
    }

    pub fn description(&self) -> String {
        let covered: Vec<String> = self
            .companies
            .iter()
            .map(|c| format!("{} ({})", c.name, c.symbol))
            .collect();

        format!(
            "Fetches current stock quotes for {}: latest price, previous close, daily change, \
             trading volume and market cap. Use for current price, quote or market-cap questions.",
            covered.join(", ")
        )
    }

    /// Symbols named in the query, or every covered company when none is
    pub fn symbols_for(&self, query: &str) -> Vec<String> {
        let lowered = query.to_lowercase();
        let mentioned: Vec<String> = self
            .companies
            .iter()
            .filter(|c| c.is_mentioned_in(&lowered))
            .map(|c| c.symbol.clone())
            .collect();

        if mentioned.is_empty() {
            self.companies.iter().map(|c| c.symbol.clone()).collect()
        } else {
            mentioned
        }
    }

    pub async fn query(&self, query: &str) -> String {
        let symbols = self.symbols_for(query);
        if symbols.is_empty() {
            return "No market data available: no companies are covered.".to_string();
        }

        let mut sections = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            match self.source.fetch_quote(symbol).await {
                Ok(quote) => sections.push(format_quote(&quote)),
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "Quote lookup failed");
                    sections.push(format!("{}: Error - {}", symbol, e));
                }
            }
        }

        info!(symbols = ?symbols, "Market lookup complete");
        sections.join("\n")
    }
}

fn format_quote(quote: &Quote) -> String {
    let mut text = format!("{}:\n", quote.symbol);
    text.push_str(&format!("  Current Price: ${:.2}\n", quote.current_price));
    text.push_str(&format!("  Previous Close: ${:.2}\n", quote.previous_close));
    text.push_str(&format!(
        "  Change: ${:.2} ({:.2}%)\n",
        quote.price_change(),
        quote.change_percentage()
    ));
    text.push_str(&format!("  Volume: {}\n", group_thousands(quote.volume)));
    if quote.market_cap > 0.0 {
        text.push_str(&format!(
            "  Market Cap: ${}\n",
            group_thousands(quote.market_cap.round() as u64)
        ));
    }
    text
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_companies;
    use std::collections::HashMap;

    struct StaticQuotes(HashMap<String, Quote>);

    #[async_trait]
    impl QuoteSource for StaticQuotes {
        async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
            self.0
                .get(symbol)
                .cloned()
                .ok_or_else(|| CoordinatorError::MarketLookupError("HTTP 404".to_string()))
        }
    }

    fn tsla_quote() -> Quote {
        Quote {
            symbol: "TSLA".to_string(),
            current_price: 250.0,
            previous_close: 200.0,
            volume: 1_234_567,
            market_cap: 0.0,
        }
    }

    #[test]
    fn test_quote_from_chart() {
        let json = r#"{"chart":{"result":[{"meta":{"symbol":"AAPL","regularMarketPrice":190.5,
            "chartPreviousClose":188.0,"regularMarketVolume":5000}}],"error":null}}"#;
        let envelope: ChartEnvelope = serde_json::from_str(json).unwrap();
        let quote = quote_from_chart("AAPL", envelope).unwrap();

        assert_eq!(quote.current_price, 190.5);
        assert_eq!(quote.previous_close, 188.0);
        assert_eq!(quote.volume, 5000);

        let empty: ChartEnvelope = serde_json::from_str(r#"{"chart":{"result":null}}"#).unwrap();
        assert!(quote_from_chart("AAPL", empty).is_err());
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[tokio::test]
    async fn test_symbols_and_inline_errors() {
        let mut quotes = HashMap::new();
        quotes.insert("TSLA".to_string(), tsla_quote());
        let capability = MarketLookupCapability::new(Arc::new(StaticQuotes(quotes)), default_companies());

        assert_eq!(capability.symbols_for("current TSLA price"), vec!["TSLA"]);
        assert_eq!(capability.symbols_for("how is the market?").len(), 3);

        let text = capability.query("Tesla and Apple price").await;
        assert!(text.contains("AAPL: Error - Market lookup error: HTTP 404"));
        assert!(text.contains("TSLA:\n  Current Price: $250.00"));
        assert!(text.contains("Change: $50.00 (25.00%)"));
        assert!(text.contains("Volume: 1,234,567"));
        assert!(!text.contains("Market Cap"));
    }
}
