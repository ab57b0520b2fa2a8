//! Row and hit types for the `chunks` vector store table.

use serde::{Deserialize, Serialize};

/// A textified entity chunk, ready to be embedded and inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Wikidata-style entity id, e.g. `Q64`. Fixed-width per the wire schema
    /// (`char(16)`), left as a Rust `String` and validated at insert time.
    pub qid: String,
    /// Textified entity content, as produced by `wikidex_core::Textifier`.
    pub text: String,
}

/// A nearest-neighbor hit returned from an ANN query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Row id assigned by the vector store.
    pub id: i64,
    /// Source entity id.
    pub qid: String,
    /// Textified content, as stored.
    pub text: String,
    /// Cosine distance to the query vector (smaller is closer).
    pub distance: f32,
}
