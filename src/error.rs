//! Error types for tabquery.

use std::time::Duration;
use thiserror::Error;

/// The main error type for tabquery operations.
#[derive(Debug, Error)]
pub enum TabError {
    /// No pooled connection became free within the configured wait time.
    #[error("No available connections in the pool (waited {}ms)", waited.as_millis())]
    PoolExhausted { waited: Duration },

    /// The pool was closed before or while the connection was requested.
    #[error("Connection pool is closed")]
    PoolClosed,

    /// Error reported by the analytical engine.
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    /// The admission gate refused a statement.
    #[error("Unsafe query rejected: {reason}")]
    UnsafeQueryRejected { reason: String },

    /// An identifier could not be normalized.
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// Tabular input that cannot be materialized.
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed TOML configuration.
    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON (transformation specs, table payloads).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The language-model collaborator failed.
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TabError {
    /// Create an unsafe-query rejection.
    pub fn unsafe_query(reason: impl Into<String>) -> Self {
        Self::UnsafeQueryRejected {
            reason: reason.into(),
        }
    }

    /// True when the caller may simply retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }
}

/// Result type alias for tabquery operations.
pub type TabResult<T> = Result<T, TabError>;
