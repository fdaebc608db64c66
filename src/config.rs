//! Coordinator configuration
//!
//! One explicit struct handed to the reasoning client, the capabilities and
//! the agent at construction time. `from_env` reads the process environment
//! (after loading `.env`).

use crate::error::CoordinatorError;
use crate::models::{default_companies, CompanyProfile};
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_MARKET_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/financial.db";

/// Settings for the language-reasoning service
#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: i32,
    /// Transport timeout; a timed-out call is a stage-local failure
    pub timeout: Duration,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            temperature: 0.0,
            max_output_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MARKET_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub reasoning: ReasoningConfig,
    pub market: MarketConfig,
    pub database_url: String,
    /// Directory holding `<SYMBOL>.txt` filing extracts
    pub filings_dir: Option<PathBuf>,
    /// JSON masking rule table; built-in table when absent
    pub pii_rules_path: Option<PathBuf>,
    pub companies: Vec<CompanyProfile>,
    pub api_port: u16,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            reasoning: ReasoningConfig::default(),
            market: MarketConfig::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            filings_dir: None,
            pii_rules_path: None,
            companies: default_companies(),
            api_port: 8080,
        }
    }
}

impl CoordinatorConfig {
    /// Build configuration from environment variables, loading `.env` first.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        let reasoning = ReasoningConfig {
            api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            base_url: env_or("GEMINI_BASE_URL", &defaults.reasoning.base_url),
            model: env_or("GEMINI_MODEL", &defaults.reasoning.model),
            temperature: parse_env("REASONING_TEMPERATURE", defaults.reasoning.temperature)?,
            max_output_tokens: parse_env(
                "REASONING_MAX_OUTPUT_TOKENS",
                defaults.reasoning.max_output_tokens,
            )?,
            timeout: Duration::from_secs(parse_env(
                "REASONING_TIMEOUT_SECS",
                defaults.reasoning.timeout.as_secs(),
            )?),
        };

        let market = MarketConfig {
            base_url: env_or("MARKET_API_BASE_URL", &defaults.market.base_url),
            timeout: Duration::from_secs(parse_env(
                "MARKET_TIMEOUT_SECS",
                defaults.market.timeout.as_secs(),
            )?),
        };

        let companies = match env::var("COMPANIES") {
            Ok(list) if !list.trim().is_empty() => parse_companies(&list),
            _ => defaults.companies,
        };

        let api_port = match env::var("PORT").or_else(|_| env::var("API_PORT")) {
            Ok(port) => port.trim().parse().map_err(|_| {
                CoordinatorError::ConfigError(format!("Invalid port: {}", port))
            })?,
            Err(_) => defaults.api_port,
        };

        Ok(Self {
            reasoning,
            market,
            database_url: env_or("DATABASE_URL", &defaults.database_url),
            filings_dir: env::var("FILINGS_DIR").ok().map(PathBuf::from),
            pii_rules_path: env::var("PII_RULES_PATH").ok().map(PathBuf::from),
            companies,
            api_port,
        })
    }
}

/// Parse a comma-separated ticker list such as `AAPL,TSLA`
pub fn parse_companies(list: &str) -> Vec<CompanyProfile> {
    let mut companies: Vec<CompanyProfile> = Vec::new();

    for symbol in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let profile = CompanyProfile::for_symbol(symbol);
        if !companies.iter().any(|c| c.symbol == profile.symbol) {
            companies.push(profile);
        }
    }

    companies
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            CoordinatorError::ConfigError(format!("Invalid value for {}: {}", key, raw))
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_companies_dedupes_and_normalizes() {
        let companies = parse_companies(" tsla, AAPL ,TSLA,,msft");
        let symbols: Vec<_> = companies.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["TSLA", "AAPL", "MSFT"]);
        assert_eq!(companies[0].name, "Tesla Inc.");
    }

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.companies.len(), 3);
        assert_eq!(config.reasoning.model, DEFAULT_GEMINI_MODEL);
        assert!(config.filings_dir.is_none());
    }
}
