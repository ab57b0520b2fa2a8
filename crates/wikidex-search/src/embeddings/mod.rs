//! Embedding generation for entity chunk text.
//!
//! This module provides embedding generation with two provider backends:
//!
//! - **Local** - Candle-based inference (CPU/Metal/CUDA) with a BGE BERT model
//! - **OpenAI** - OpenAI-compatible APIs (OpenAI, Azure OpenAI, Ollama, ...)
//!
//! # Architecture
//!
//! ```text
//! EmbeddingProvider (trait)
//!     ├── LocalProvider   - Candle + BAAI/bge-small-en-v1.5
//!     └── OpenAIProvider  - HTTP client for /v1/embeddings
//! ```
//!
//! Both document chunks and retrieval queries share a single embedding
//! space, so `EmbeddingProvider` has one `embed_documents`/`embed_query`
//! pair rather than the dual semantic/code methods a code-search tool needs.

pub mod factory;
mod local;
pub mod openai;
mod provider;

pub use factory::{create as create_provider, EmbeddingConfig};
pub use local::{LocalProvider, EMBEDDING_DIM};
pub use openai::{OpenAIConfig, OpenAIProvider};
pub use provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
