//! Structured-data capability
//!
//! Natural language → SQL through the reasoning service, executed against the
//! portfolio database. A failed execution is fed back into one more
//! generation; there is no further retry.

use crate::error::CoordinatorError;
use crate::models::StructuredResult;
use crate::reasoning::ReasoningService;
use crate::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MAX_SQL_ATTEMPTS: usize = 2;

pub const PORTFOLIO_SCHEMA: &str = r#"TABLE customers
- id INTEGER PRIMARY KEY
- first_name TEXT, last_name TEXT, email TEXT, phone TEXT
- investment_profile TEXT (conservative / moderate / aggressive)
- risk_tolerance TEXT (low / medium / high)

TABLE portfolio_holdings
- id INTEGER PRIMARY KEY
- customer_id INTEGER REFERENCES customers(id)
- symbol TEXT such as 'AAPL', 'TSLA', 'GOOGL'
- shares REAL, purchase_price REAL, current_value REAL

TABLE companies
- id INTEGER PRIMARY KEY
- symbol TEXT, name TEXT ('Apple Inc', 'Tesla Inc'), sector TEXT, market_cap REAL

TABLE financial_metrics
- id INTEGER PRIMARY KEY
- symbol TEXT REFERENCES companies(symbol)
- revenue REAL, net_income REAL, eps REAL, pe_ratio REAL, debt_to_equity REAL, roe REAL

TABLE market_data
- id INTEGER PRIMARY KEY
- symbol TEXT REFERENCES companies(symbol)
- close_price REAL, volume INTEGER, market_cap REAL, date TEXT

Joins:
- customers c JOIN portfolio_holdings ph ON c.id = ph.customer_id
- portfolio_holdings ph JOIN companies co ON ph.symbol = co.symbol
- portfolio_holdings ph JOIN market_data md ON ph.symbol = md.symbol

Tips:
- Match stocks exactly with symbol = 'TSLA'; match names with LIKE '%Tesla%'
- Join customers to portfolio_holdings to get customer names"#;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").unwrap();
}

/// Executes one read-only statement
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<StructuredResult>;
}

/// Normalize generated SQL to a single read-only statement.
pub fn sanitize_sql(raw: &str) -> Result<String> {
    let body = match CODE_FENCE.captures(raw) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or_default(),
        None => raw,
    };
    let body = body.replace("```", "");

    let statement = body.split(';').next().unwrap_or_default().trim();
    if statement.is_empty() {
        return Err(CoordinatorError::StructuredQueryError(
            "generated SQL is empty".to_string(),
        ));
    }

    let keyword = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();

    if keyword != "SELECT" && keyword != "WITH" {
        return Err(CoordinatorError::StructuredQueryError(format!(
            "only SELECT statements may run, got {}",
            keyword
        )));
    }

    Ok(statement.to_string())
}

struct FailedAttempt {
    sql: String,
    error: String,
}

pub struct StructuredQueryCapability {
    reasoner: Arc<dyn ReasoningService>,
    executor: Arc<dyn SqlExecutor>,
    schema: String,
}

impl StructuredQueryCapability {
    pub fn new(reasoner: Arc<dyn ReasoningService>, executor: Arc<dyn SqlExecutor>) -> Self {
        Self {
            reasoner,
            executor,
            schema: PORTFOLIO_SCHEMA.to_string(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    fn build_prompt(&self, query: &str, previous: Option<&FailedAttempt>) -> String {
        let mut prompt = format!(
            "You are a SQL expert. Convert the natural language query into one valid SQLite \
             SELECT statement.\n\nDatabase Schema:\n{}\n\nNatural Language Query: {}\n",
            self.schema, query
        );

        if let Some(failed) = previous {
            prompt.push_str(&format!(
                "\nThe previous SQL failed.\nSQL: {}\nError: {}\nFix the SQL.\n",
                failed.sql, failed.error
            ));
        }

        prompt.push_str(
            "\nReturn ONLY the SQL statement: no explanation, no markdown formatting.",
        );
        prompt
    }

    pub async fn query(&self, query: &str) -> Result<StructuredResult> {
        let mut previous: Option<FailedAttempt> = None;

        for attempt in 1..=MAX_SQL_ATTEMPTS {
            let prompt = self.build_prompt(query, previous.as_ref());
            let generated = self.reasoner.complete(&prompt).await?;

            let outcome = match sanitize_sql(&generated) {
                Ok(sql) => {
                    debug!(attempt, sql = %sql, "Executing generated SQL");
                    self.executor.execute(&sql).await.map(|r| (sql, r))
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok((sql, result)) => {
                    if result.is_empty() {
                        return Err(CoordinatorError::StructuredQueryError(format!(
                            "query returned no rows (SQL: {})",
                            sql
                        )));
                    }
                    info!(attempt, rows = result.rows.len(), "Structured query succeeded");
                    return Ok(result.with_sql(sql));
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Generated SQL failed");
                    previous = Some(FailedAttempt {
                        sql: generated.trim().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let detail = previous
            .map(|f| format!("{} (SQL attempted: {})", f.error, f.sql))
            .unwrap_or_default();

        Err(CoordinatorError::StructuredQueryError(format!(
            "database query failed after {} attempts: {}",
            MAX_SQL_ATTEMPTS, detail
        )))
    }
}

/// SQLite-backed executor
#[derive(Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Pool that connects on first use
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str) -> Result<StructuredResult> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let values = rows
            .iter()
            .map(|row| (0..columns.len()).map(|i| decode_cell(row, i)).collect())
            .collect();

        Ok(StructuredResult::new(columns, values))
    }
}

fn decode_cell(row: &SqliteRow, index: usize) -> String {
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(Some(value)) = row.try_get::<Option<i64>, _>(index) {
        return value.to_string();
    }
    if let Ok(Some(value)) = row.try_get::<Option<f64>, _>(index) {
        return value.to_string();
    }
    "<binary>".to_string()
}
