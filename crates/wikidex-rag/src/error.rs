//! Error types for retrieval-augmented generation.

use thiserror::Error;

/// Errors that can occur while retrieving context or generating an answer.
#[derive(Error, Debug)]
pub enum RagError {
    /// Propagated from the embedder, vector store, or reranker.
    #[error("search error: {0}")]
    Search(#[from] wikidex_search::SearchError),

    /// Propagated from the LLM adapter.
    #[error("llm error: {0}")]
    Llm(#[from] wikidex_llm::LlmError),
}

/// Result type for `wikidex-rag` operations.
pub type Result<T> = std::result::Result<T, RagError>;
