//! CLI command implementations
//!
//! This module contains all Wikidex CLI command implementations.

pub mod ask;
pub mod build_labels;
pub mod config;
pub mod ingest;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use wikidex_config::{ConfigLoader, WikidexConfig};
use wikidex_llm::{LlmAdapter, LocalLlmAdapter, RemoteLlmAdapter};
use wikidex_search::{create_provider, EmbeddingConfig as SearchEmbeddingConfig, EmbeddingProvider, OpenAIConfig};

use crate::GlobalOptions;

/// Resolve the workspace root from the current directory. Unlike the
/// teacher's named-workspace registry, a wikidex workspace is always the
/// directory the command is run from.
pub fn resolve_workspace() -> Result<PathBuf> {
    std::env::current_dir().context("failed to get current directory")
}

/// Load configuration with optional config file override, applying CLI
/// overrides last.
pub fn load_config(global: &GlobalOptions, workspace: &Path) -> Result<WikidexConfig> {
    let mut loader = ConfigLoader::new();

    let mut config = if let Some(ref config_path) = global.config {
        let parent = config_path.parent().unwrap_or(workspace);
        loader
            .load_local(parent)
            .context("failed to load config file")?
            .ok_or_else(|| anyhow::anyhow!("config file not found: {}", config_path.display()))?
    } else {
        loader
            .load(workspace, None)
            .context("failed to load configuration")?
    };

    config.apply_overrides(&global.to_config_overrides());
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Build an [`EmbeddingProvider`] from the resolved configuration.
pub fn create_embedder(config: &WikidexConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let search_config = match config.embedding.provider {
        wikidex_config::EmbeddingProviderType::Local => {
            SearchEmbeddingConfig::local(config.embedding.dimension)
        }
        wikidex_config::EmbeddingProviderType::Openai => {
            let openai = config
                .embedding
                .openai
                .as_ref()
                .context("embedding.openai settings required when provider = openai")?;
            let api_key = openai
                .api_key_env
                .as_ref()
                .and_then(|var| std::env::var(var).ok());
            #[allow(unused_mut)]
            let mut oai_config = OpenAIConfig {
                base_url: openai.url.clone(),
                api_key,
                model: openai.model.clone(),
                timeout_secs: openai.timeout_secs,
                azure_mode: false,
                #[cfg(feature = "rate-limit")]
                requests_per_second: None,
            };
            #[cfg(feature = "rate-limit")]
            {
                oai_config.requests_per_second = openai.requests_per_second;
            }
            SearchEmbeddingConfig::openai_with_config(oai_config, config.embedding.dimension)
        }
    };
    create_provider(&search_config).context("failed to create embedding provider")
}

/// Build an [`LlmAdapter`] from the resolved configuration: a remote HTTP
/// adapter when `llm.endpoint` is set, otherwise the in-process stub.
pub fn create_llm_adapter(config: &WikidexConfig) -> Result<Arc<dyn LlmAdapter>> {
    if config.llm.endpoint.is_some() {
        let adapter = RemoteLlmAdapter::new(&config.llm).context("failed to build LLM adapter")?;
        Ok(Arc::new(adapter))
    } else {
        Ok(Arc::new(LocalLlmAdapter::new(format!("{:?}", config.llm.family))))
    }
}

/// Print a message unless `quiet` is set.
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}
