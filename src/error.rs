//! Error types for the financial agent coordinator

use thiserror::Error;

/// Result type alias for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[derive(Error, Debug)]
pub enum CoordinatorError {

    // =============================
    // Registry
    // =============================

    #[error("Duplicate capability: {0}")]
    DuplicateCapabilityError(String),

    // =============================
    // Routing & Reasoning
    // =============================

    #[error("Routing parse error: {0}")]
    RoutingParseError(String),

    #[error("Reasoning service unavailable: {0}")]
    ReasoningServiceUnavailable(String),

    // =============================
    // Capability Execution
    // =============================

    #[error("Capability execution error: {0}")]
    CapabilityExecutionError(String),

    #[error("Structured query error: {0}")]
    StructuredQueryError(String),

    #[error("Retrieval error: {0}")]
    RetrievalError(String),

    #[error("Market lookup error: {0}")]
    MarketLookupError(String),

    // =============================
    // Configuration
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid masking rule: {0}")]
    InvalidMaskingRule(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
