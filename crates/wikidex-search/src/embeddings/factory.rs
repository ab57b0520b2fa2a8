//! Provider factory for creating embedding providers from configuration
//!
//! Creates the appropriate provider implementation based on configuration.
//! Supports the local Candle provider and the OpenAI-compatible remote one.

use std::sync::Arc;

use crate::error::{Result, SearchError};

use super::local::LocalProvider;
use super::openai::{OpenAIConfig, OpenAIProvider};
use super::provider::{EmbeddingProvider, EmbeddingProviderType};

/// Configuration for embedding providers.
///
/// Specifies which provider to use and, for the remote provider, its
/// connection settings.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,
    /// OpenAI-compatible provider settings (required when `provider = Openai`).
    pub openai: Option<OpenAIConfig>,
    /// Expected embedding dimension. Checked against the first batch the
    /// provider returns, so a misconfigured remote model is caught before
    /// it silently corrupts the vector store.
    pub expected_dim: usize,
}

impl EmbeddingConfig {
    /// Configuration for the local Candle provider.
    pub fn local(expected_dim: usize) -> Self {
        Self {
            provider: EmbeddingProviderType::Local,
            openai: None,
            expected_dim,
        }
    }

    /// Configuration for an OpenAI-compatible remote provider.
    pub fn openai_with_config(config: OpenAIConfig, expected_dim: usize) -> Self {
        Self {
            provider: EmbeddingProviderType::Openai,
            openai: Some(config),
            expected_dim,
        }
    }
}

/// Create an [`EmbeddingProvider`] from configuration.
pub fn create(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderType::Local => {
            let provider = LocalProvider::new()?;
            validate_dimension(provider.embedding_dim(), config.expected_dim)?;
            Ok(Arc::new(provider))
        }
        EmbeddingProviderType::Openai => {
            let openai_config = config.openai.clone().ok_or_else(|| {
                SearchError::InvalidConfig(
                    "embedding.openai settings required when provider = openai".into(),
                )
            })?;
            let provider = OpenAIProvider::new(openai_config)?;
            Ok(Arc::new(provider))
        }
    }
}

/// Validate a locally-known embedding dimension against what the vector
/// store expects. Remote providers skip this check at construction time
/// since their dimension is only known after the first response; the
/// vector store's own insert path still validates it per-batch.
fn validate_dimension(actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(SearchError::DimensionMismatch {
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_config_defaults() {
        let config = EmbeddingConfig::local(384);
        assert_eq!(config.provider, EmbeddingProviderType::Local);
        assert!(config.openai.is_none());
    }

    #[test]
    fn openai_config_carries_settings() {
        let config = EmbeddingConfig::openai_with_config(OpenAIConfig::openai("sk-test"), 1536);
        assert_eq!(config.provider, EmbeddingProviderType::Openai);
        assert!(config.openai.is_some());
    }

    #[test]
    fn create_fails_without_openai_settings() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            openai: None,
            expected_dim: 1536,
        };
        let err = create(&config).unwrap_err();
        assert!(matches!(err, SearchError::InvalidConfig(_)));
    }

    #[test]
    fn create_local_validates_dimension() {
        let config = EmbeddingConfig::local(9999);
        let err = create(&config).unwrap_err();
        assert!(matches!(err, SearchError::DimensionMismatch { .. }));
    }

    #[test]
    fn create_local_succeeds_with_correct_dimension() {
        let config = EmbeddingConfig::local(super::super::local::EMBEDDING_DIM);
        let result = create(&config);
        assert!(result.is_ok());
    }
}
