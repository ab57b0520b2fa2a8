//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Errors that can occur while orchestrating the reader/embedder/inserter
/// pipeline. Per §7, only invariant violations are fatal to the pipeline as
/// a whole; per-batch embed/insert failures are logged and the affected
/// batch is dropped.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Propagated from dump reading, label lookup, or textification.
    #[error("core error: {0}")]
    Core(#[from] wikidex_core::CoreError),

    /// Propagated from the embedder or vector store.
    #[error("search error: {0}")]
    Search(#[from] wikidex_search::SearchError),

    /// A stage task panicked or was cancelled.
    #[error("pipeline stage failed: {0}")]
    Join(String),
}

/// Result type for `wikidex-pipeline` operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
