//! Error types for wikidex-search.

use thiserror::Error;

/// Errors that can occur in wikidex-search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Vector store (Postgres/pgvector) error.
    #[error("vector store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Vector store schema could not be initialized.
    #[error("vector store init failed: {0}")]
    StoreInit(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Embedding model error (local inference).
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Embedding provider unavailable.
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Embedding dimension mismatch against the configured vector store dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Remote embedding API authentication failed.
    #[error("OpenAI authentication failed: {0}")]
    OpenAIAuth(String),

    /// Remote embedding API rate limited.
    #[error("OpenAI rate limited, retry after {retry_after:?} seconds")]
    OpenAIRateLimit { retry_after: Option<u64> },

    /// Remote embedding API returned an invalid model.
    #[error("OpenAI model not found: {0}")]
    OpenAIInvalidModel(String),

    /// Reranker model error.
    #[error("rerank error: {0}")]
    Rerank(String),

    /// HTTP transport error (remote provider, model download).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Background task join error.
    #[error("task join error: {0}")]
    Join(String),
}

impl From<candle_core::Error> for SearchError {
    fn from(err: candle_core::Error) -> Self {
        SearchError::Embedding(err.to_string())
    }
}

/// Result type for wikidex-search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
