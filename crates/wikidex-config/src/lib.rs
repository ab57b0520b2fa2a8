//! Wikidex Configuration Management
//!
//! Provides layered configuration loading with support for:
//! - Global config: `~/.wikidex/config.toml`
//! - Local config: `.wikidex/config.toml` (in the workspace)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global -> local -> CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for wikidex, fully merged from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct WikidexConfig {
    /// Dump reading configuration.
    pub dump: DumpConfig,

    /// Label store configuration.
    pub labels: LabelsConfig,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Reranker configuration.
    pub reranker: RerankerConfig,

    /// Vector store configuration.
    pub vectorstore: VectorStoreConfig,

    /// Ingestion pipeline configuration.
    pub pipeline: PipelineConfig,

    /// LLM adapter configuration.
    pub llm: LlmConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl WikidexConfig {
    /// Validate that required settings exist for the selected providers/backends.
    /// Delegates to each section's own `validate()`, covering the vector
    /// store connection string and LLM endpoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.vectorstore.validate()?;
        self.llm.validate()?;
        Ok(())
    }

    /// Apply CLI overrides on top of the merged file configuration. Only
    /// fields that were actually set on the command line take effect.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref dsn) = overrides.vectorstore_connection_string {
            self.vectorstore.connection_string = dsn.clone();
        }
        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(ref dump_path) = overrides.dump_path {
            self.dump.path = Some(dump_path.clone());
        }
    }
}

/// Dump reading configuration (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DumpConfig {
    /// Path to the NDJSON-in-an-array dump file. Usually provided as a CLI
    /// positional argument instead, but configurable for scripted runs.
    pub path: Option<PathBuf>,

    /// Buffered-read chunk size in bytes.
    pub chunk_bytes: usize,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            path: None,
            chunk_bytes: 1 << 30,
        }
    }
}

/// Label store configuration (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabelsConfig {
    /// Path to the SQLite-backed label store.
    pub db_path: PathBuf,

    /// Capacity of the optional bounded LRU cache in front of the store.
    /// `None` disables the cache (direct reads).
    pub cache_capacity: Option<usize>,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".wikidex/labels.sqlite"),
            cache_capacity: None,
        }
    }
}

/// Which embedding provider generates document/query vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// Local inference using Candle (CPU/Metal/CUDA).
    #[default]
    Local,
    /// OpenAI-compatible HTTP API (OpenAI, Azure OpenAI, or a local server
    /// speaking the same wire protocol).
    Openai,
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "openai" => Ok(Self::Openai),
            other => Err(ConfigError::invalid_value(
                "embedding.provider",
                format!("unknown provider '{other}'"),
            )),
        }
    }
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Openai => write!(f, "openai"),
        }
    }
}

/// Embedding provider configuration (§4.4).
///
/// # Example TOML
///
/// ```toml
/// [embedding]
/// provider = "local"
/// model = "BAAI/bge-small-en-v1.5"
/// dimension = 384
///
/// [embedding.openai]
/// url = "https://api.openai.com/v1"
/// api_key_env = "OPENAI_API_KEY"
/// model = "text-embedding-3-small"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderType,

    /// Model identifier (HF repo id for local, model name for remote).
    pub model: String,

    /// Fixed embedding dimension `D`. Must match the vector store's `D`.
    pub dimension: usize,

    /// Remote provider settings (required when `provider = "openai"`).
    pub openai: Option<OpenAiEmbeddingSettings>,

    /// Batch size the pipeline groups sentences into before each model call.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::default(),
            model: "BAAI/bge-small-en-v1.5".to_string(),
            dimension: 384,
            openai: None,
            batch_size: 256,
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimension == 0 {
            return Err(ConfigError::invalid_value(
                "embedding.dimension",
                "must be greater than zero",
            ));
        }
        if matches!(self.provider, EmbeddingProviderType::Openai) && self.openai.is_none() {
            return Err(ConfigError::missing_required(
                "embedding.openai",
                "embedding.provider = \"openai\"",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OpenAiEmbeddingSettings {
    pub url: String,
    pub api_key_env: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Requests-per-second cap against the remote endpoint (only enforced
    /// when `wikidex-search` is built with its `rate-limit` feature).
    pub requests_per_second: Option<u32>,
}

/// Cross-encoder reranker configuration (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RerankerConfig {
    /// Model identifier (HF repo id).
    pub model: String,

    /// Maximum number of ANN candidates passed into a single rerank call.
    pub max_candidates: usize,

    /// Number of top-scoring candidates kept after rerank.
    pub context_k: usize,

    /// Token truncation length applied to each (query, candidate) pair.
    pub max_tokens: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model: "BAAI/bge-reranker-base".to_string(),
            max_candidates: 32,
            context_k: 6,
            max_tokens: 512,
        }
    }
}

/// Distance metric used by the vector store's ANN index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
}

/// Vector store configuration (§4.6, §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Postgres connection string (DSN). Read from
    /// `WIKIDEX_VECTORSTORE_CONNECTION_STRING` when unset in TOML.
    pub connection_string: String,

    /// Fixed vector dimension `D`, immutable for the life of the store.
    pub dimension: usize,

    pub metric: DistanceMetric,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            dimension: 384,
            metric: DistanceMetric::default(),
        }
    }
}

impl VectorStoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection_string.trim().is_empty() {
            return Err(ConfigError::missing_required(
                "vectorstore.connection_string",
                "any command touching the vector store",
            ));
        }
        if self.dimension == 0 {
            return Err(ConfigError::invalid_value(
                "vectorstore.dimension",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Ingestion pipeline configuration (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the `(id, text)` queue between reader and embedder.
    pub embed_queue_capacity: usize,

    /// Capacity of the `(ids, texts, vectors)` queue between embedder and inserter.
    pub insert_queue_capacity: usize,

    /// Number of sentences accumulated per embedder batch.
    pub embed_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embed_queue_capacity: 1024,
            insert_queue_capacity: 64,
            embed_batch_size: 256,
        }
    }
}

/// Which prompt template family the LLM adapter selects (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PromptFamily {
    #[default]
    Llama,
    Mistral,
    Qwen,
}

impl std::str::FromStr for PromptFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llama" => Ok(Self::Llama),
            "mistral" => Ok(Self::Mistral),
            "qwen" => Ok(Self::Qwen),
            other => Err(ConfigError::invalid_value(
                "llm.family",
                format!("unknown prompt family '{other}'"),
            )),
        }
    }
}

/// LLM adapter configuration (§4.9, §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub family: PromptFamily,

    /// Remote HTTP endpoint. `None` selects the in-process local runner.
    pub endpoint: Option<String>,

    /// Environment variable name holding the bearer token for `endpoint`.
    pub api_key_env: Option<String>,

    pub timeout_secs: u64,

    pub max_new_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            family: PromptFamily::default(),
            endpoint: None,
            api_key_env: None,
            timeout_secs: 60,
            max_new_tokens: 512,
        }
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref endpoint) = self.endpoint {
            if endpoint.trim().is_empty() {
                return Err(ConfigError::invalid_value("llm.endpoint", "must not be empty"));
            }
        }
        Ok(())
    }
}

/// Logging configuration (§10.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `RUST_LOG`-style default filter, e.g. "info" or "wikidex=debug".
    pub level: String,

    pub format: LogFormat,

    /// Optional log file; stderr is always used additionally.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// CLI-sourced overrides applied after file-based merging. Every field that
/// a global CLI flag can set lives here so `main.rs` has one place to wire
/// flags into `WikidexConfig::apply_overrides`.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub vectorstore_connection_string: Option<String>,
    pub embedding_provider: Option<EmbeddingProviderType>,
    pub log_level: Option<String>,
    pub dump_path: Option<PathBuf>,
}

/// Environment variable prefix for config field overrides (§6), e.g.
/// `WIKIDEX_VECTORSTORE_CONNECTION_STRING`.
pub const ENV_PREFIX: &str = "WIKIDEX_";

/// Collect env-var overrides understood at the top level, independent of
/// any particular CLI flag. Kept separate from `ConfigOverrides` (which is
/// CLI-flag-sourced) so both can be layered: file -> env -> CLI.
pub fn env_overrides() -> HashMap<String, String> {
    std::env::vars()
        .filter_map(|(k, v)| {
            k.strip_prefix(ENV_PREFIX)
                .map(|rest| (rest.to_lowercase(), v))
        })
        .collect()
}
