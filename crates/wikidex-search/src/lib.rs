//! Wikidex Search - embedding, reranking, and pgvector-backed vector storage
//!
//! This crate provides the retrieval building blocks shared by the ingest
//! pipeline and the RAG retriever:
//!
//! - An [`embeddings::EmbeddingProvider`] trait with local (Candle) and
//!   remote (OpenAI-compatible) implementations, both producing vectors in
//!   the same space for document chunks and queries.
//! - A [`rerank::Reranker`] cross-encoder that re-scores a shortlist of ANN
//!   candidates against the query.
//! - A [`vectorstore::VectorStore`] wrapping Postgres + pgvector's `chunks`
//!   table, with idempotent schema init, batched insert, and ANN search.
//!
//! # Example
//!
//! ```ignore
//! use wikidex_search::{EmbeddingConfig, create_provider, VectorStore, VectorStoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let embedder = create_provider(&EmbeddingConfig::local(384))?;
//!     let store = VectorStore::connect(VectorStoreConfig::new("postgres://...", 384)).await?;
//!     store.init().await?;
//!
//!     let vector = embedder.embed_query("who wrote the hitchhiker's guide").await?;
//!     let hits = store.ann(&vector, 32, None).await?;
//!     Ok(())
//! }
//! ```

pub mod embeddings;
pub mod error;
pub mod rerank;
pub mod schema;
pub mod vectorstore;

pub use embeddings::{
    create_provider, EmbeddingConfig, EmbeddingProvider, EmbeddingProviderType, LocalProvider,
    OpenAIConfig, OpenAIProvider, ProviderStatus, EMBEDDING_DIM,
};
pub use error::{Result, SearchError};
pub use rerank::{RankedHit, Reranker};
pub use schema::{Chunk, SearchHit};
pub use vectorstore::{DistanceMetric, VectorStore, VectorStoreConfig};
