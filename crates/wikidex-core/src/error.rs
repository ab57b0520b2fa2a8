//! Error types shared across dump reading, label storage and textification.

use thiserror::Error;

/// Errors that can occur while building or using the core Wikidata model.
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O error reading the dump file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single dump line failed to parse as an entity. Recoverable: the
    /// caller decides whether to skip the line or abort the whole read.
    #[error("failed to parse dump line: {source}")]
    Parse {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// Label store (SQLite) error.
    #[error("label store error: {0}")]
    LabelStore(#[from] rusqlite::Error),

    /// A background decode/insert task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Join(String),

    /// An entity is missing a field required to proceed (e.g. `id`).
    #[error("entity missing required field '{field}'")]
    MissingField { field: &'static str },
}

impl CoreError {
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}

/// Convenience alias used throughout `wikidex-core`.
pub type Result<T> = std::result::Result<T, CoreError>;
