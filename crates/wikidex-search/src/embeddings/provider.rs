//! Embedding provider trait and types
//!
//! Defines the core abstraction for generating vectors from text, with two
//! implementations:
//! - `LocalProvider` - Candle-based local inference (CPU/Metal/CUDA)
//! - `OpenAIProvider` - OpenAI-compatible APIs (OpenAI, Azure OpenAI, Ollama)
//!
//! Unlike a code-search tool, entity text has no separate "code" register,
//! so there is exactly one embedding space shared by document chunks and
//! queries, rather than a semantic/code pair.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Type of embedding provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// Local inference using Candle (CPU/Metal/CUDA)
    #[default]
    Local,
    /// OpenAI-compatible API (OpenAI, Azure OpenAI, Ollama, ...)
    Openai,
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProviderType::Local => write!(f, "local"),
            EmbeddingProviderType::Openai => write!(f, "openai"),
        }
    }
}

/// Status of an embedding provider, for the `status` CLI command and warmup checks.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    /// Whether the provider is available and responding
    pub available: bool,
    /// Type of provider
    pub provider_type: EmbeddingProviderType,
    /// Device/endpoint being used ("CPU", "Metal", "CUDA", "Remote")
    pub device: String,
    /// Last health check latency in milliseconds
    pub latency_ms: Option<u64>,
    /// Error message if provider is unavailable
    pub error: Option<String>,
}

impl ProviderStatus {
    /// Create a status for a healthy provider
    pub fn healthy(provider_type: EmbeddingProviderType, device: impl Into<String>) -> Self {
        Self {
            available: true,
            provider_type,
            device: device.into(),
            latency_ms: None,
            error: None,
        }
    }

    /// Create a status for an unavailable provider
    pub fn unavailable(provider_type: EmbeddingProviderType, error: impl Into<String>) -> Self {
        Self {
            available: false,
            provider_type,
            device: "N/A".into(),
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    /// Set latency from a health check
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Embedding provider trait
///
/// Core abstraction for generating embeddings from text in a single shared
/// vector space, used for both document chunks at ingest time and queries at
/// retrieval time.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` for use with async runtimes and
/// concurrent access from the pipeline's embedder stage.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of document chunks, internally grouping requests into
    /// at most `batch_size` texts per call. Returns one vector per input
    /// text, in order.
    async fn embed_documents(&self, texts: Vec<String>, batch_size: usize)
        -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string at retrieval time.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Check provider connectivity and status.
    ///
    /// For local providers, checks model availability. For remote
    /// providers, performs a health check request.
    async fn check_status(&self) -> Result<ProviderStatus>;

    /// Warm up the provider: preload the model (local) or probe
    /// connectivity and measure latency (remote).
    async fn warmup(&self) -> Result<()>;

    /// The fixed dimension `D` of this provider's vector space.
    fn embedding_dim(&self) -> usize;

    /// Get the provider type identifier
    fn provider_type(&self) -> EmbeddingProviderType;
}
