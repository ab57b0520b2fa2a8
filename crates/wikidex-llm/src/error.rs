//! Error types for the LLM adapter.

use thiserror::Error;

/// Errors that can occur while formatting a prompt or dispatching to a model.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure talking to a remote endpoint. Retried once
    /// by the adapter before being surfaced.
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote call exceeded its per-call timeout.
    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    /// The remote endpoint responded, but not in the expected shape.
    #[error("unexpected LLM response shape: {0}")]
    InvalidResponse(String),

    /// The remote endpoint responded with a 5xx or 429 status. Transient
    /// like `Http`/`Timeout`: retried once before being surfaced.
    #[error("LLM endpoint returned status {status}: {body}")]
    ServerError { status: u16, body: String },

    /// `llm.endpoint` is set but `llm.api_key_env` points at an unset
    /// environment variable.
    #[error("environment variable '{0}' is not set")]
    MissingApiKey(String),

    /// No remote endpoint configured and the in-process runner was asked
    /// to generate — the local runner is a pluggable stub (§1 out of scope).
    #[error("local in-process LLM runner is not implemented: {0}")]
    NotImplemented(String),

    /// Serialization error building the request body.
    #[error("failed to serialize request: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for `wikidex-llm` operations.
pub type Result<T> = std::result::Result<T, LlmError>;
