//! Financial Agent Coordinator
//!
//! Answers free-text financial questions by combining heterogeneous
//! capabilities:
//! - SEC filing retrieval per covered company
//! - Natural language → SQL over the customer/portfolio database
//! - Live market quotes
//! - PII masking of every structured result before it leaves the coordinator
//!
//! SINGLE PASS:
//! QUERY → ROUTE → EXECUTE → PROTECT → SYNTHESIZE → ANSWER

pub mod agent;
pub mod api;
pub mod capabilities;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gemini;
pub mod models;
pub mod pii;
pub mod reasoning;
pub mod router;
pub mod synthesis;

#[cfg(test)]
mod test_support;

pub use error::Result;

// Re-export common types
pub use agent::FinancialAgent;
pub use models::*;
