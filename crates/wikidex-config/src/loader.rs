//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.wikidex/config.toml`
//! 2. Local config: `.wikidex/config.toml` (in the workspace)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::{ConfigOverrides, WikidexConfig};

const CONFIG_FILE_NAME: &str = "config.toml";
const GLOBAL_CONFIG_DIR: &str = ".wikidex";
const LOCAL_CONFIG_DIR: &str = ".wikidex";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global_config_dir: Option<PathBuf>,
    global_config: Option<WikidexConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader, auto-detecting `~/.wikidex`.
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR));
        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory (for tests).
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a workspace with optional CLI overrides.
    /// Merges config in order: global -> local -> overrides.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<WikidexConfig, ConfigError> {
        let mut config = WikidexConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }
        if let Some(local_config) = self.load_local(workspace_root)? {
            config = merge_configs(config, local_config);
        }
        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        Ok(config)
    }

    pub fn load_global(&mut self) -> Result<Option<WikidexConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("no home directory found, skipping global config");
            return Ok(None);
        };
        if !global_path.exists() {
            trace!(path = ?global_path, "global config not found");
            return Ok(None);
        }

        debug!(path = ?global_path, "loading global config");
        let config = load_config_file(&global_path)?;
        self.global_config = Some(config.clone());
        Ok(Some(config))
    }

    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<WikidexConfig>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);
        if !local_path.exists() {
            trace!(path = ?local_path, "local config not found");
            return Ok(None);
        }
        debug!(path = ?local_path, "loading local config");
        load_config_file(&local_path).map(Some)
    }

    pub fn save_global(&self, config: &WikidexConfig) -> Result<(), ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };
        save_config_file(&global_dir.join(CONFIG_FILE_NAME), config)
    }

    pub fn save_local(&self, workspace_root: &Path, config: &WikidexConfig) -> Result<(), ConfigError> {
        save_config_file(&self.local_config_path(workspace_root), config)
    }

    /// Create `~/.wikidex/config.toml` with default configuration if absent.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };
        if !global_dir.exists() {
            std::fs::create_dir_all(global_dir).map_err(|e| ConfigError::create_dir(global_dir, e))?;
        }
        let config_path = global_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            save_config_file(&config_path, &WikidexConfig::default())?;
        }
        Ok(config_path)
    }

    /// Create `.wikidex/config.toml` for a workspace with default configuration if absent.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        let local_dir = workspace_root.join(LOCAL_CONFIG_DIR);
        if !local_dir.exists() {
            std::fs::create_dir_all(&local_dir).map_err(|e| ConfigError::create_dir(&local_dir, e))?;
        }
        let config_path = local_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            save_config_file(&config_path, &WikidexConfig::default())?;
        }
        Ok(config_path)
    }

    /// Clear cached global configuration, forcing reload on next `load_global()`.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

fn load_config_file(path: &Path) -> Result<WikidexConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

fn save_config_file(path: &Path, config: &WikidexConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge two configurations section by section, with `overlay` values
/// winning whenever they differ from the built-in default.
fn merge_configs(base: WikidexConfig, overlay: WikidexConfig) -> WikidexConfig {
    let default = WikidexConfig::default();
    WikidexConfig {
        dump: crate::DumpConfig {
            path: overlay.dump.path.or(base.dump.path),
            chunk_bytes: pick(overlay.dump.chunk_bytes, base.dump.chunk_bytes, default.dump.chunk_bytes),
        },
        labels: crate::LabelsConfig {
            db_path: pick(overlay.labels.db_path, base.labels.db_path, default.labels.db_path),
            cache_capacity: overlay.labels.cache_capacity.or(base.labels.cache_capacity),
        },
        embedding: crate::EmbeddingConfig {
            provider: pick(overlay.embedding.provider, base.embedding.provider, default.embedding.provider),
            model: pick(overlay.embedding.model, base.embedding.model, default.embedding.model),
            dimension: pick(overlay.embedding.dimension, base.embedding.dimension, default.embedding.dimension),
            openai: overlay.embedding.openai.or(base.embedding.openai),
            batch_size: pick(overlay.embedding.batch_size, base.embedding.batch_size, default.embedding.batch_size),
        },
        reranker: crate::RerankerConfig {
            model: pick(overlay.reranker.model, base.reranker.model, default.reranker.model),
            max_candidates: pick(
                overlay.reranker.max_candidates,
                base.reranker.max_candidates,
                default.reranker.max_candidates,
            ),
            context_k: pick(overlay.reranker.context_k, base.reranker.context_k, default.reranker.context_k),
            max_tokens: pick(overlay.reranker.max_tokens, base.reranker.max_tokens, default.reranker.max_tokens),
        },
        vectorstore: crate::VectorStoreConfig {
            connection_string: pick(
                overlay.vectorstore.connection_string,
                base.vectorstore.connection_string,
                default.vectorstore.connection_string,
            ),
            dimension: pick(
                overlay.vectorstore.dimension,
                base.vectorstore.dimension,
                default.vectorstore.dimension,
            ),
            metric: pick(overlay.vectorstore.metric, base.vectorstore.metric, default.vectorstore.metric),
        },
        pipeline: crate::PipelineConfig {
            embed_queue_capacity: pick(
                overlay.pipeline.embed_queue_capacity,
                base.pipeline.embed_queue_capacity,
                default.pipeline.embed_queue_capacity,
            ),
            insert_queue_capacity: pick(
                overlay.pipeline.insert_queue_capacity,
                base.pipeline.insert_queue_capacity,
                default.pipeline.insert_queue_capacity,
            ),
            embed_batch_size: pick(
                overlay.pipeline.embed_batch_size,
                base.pipeline.embed_batch_size,
                default.pipeline.embed_batch_size,
            ),
        },
        llm: crate::LlmConfig {
            family: pick(overlay.llm.family, base.llm.family, default.llm.family),
            endpoint: overlay.llm.endpoint.or(base.llm.endpoint),
            api_key_env: overlay.llm.api_key_env.or(base.llm.api_key_env),
            timeout_secs: pick(overlay.llm.timeout_secs, base.llm.timeout_secs, default.llm.timeout_secs),
            max_new_tokens: pick(
                overlay.llm.max_new_tokens,
                base.llm.max_new_tokens,
                default.llm.max_new_tokens,
            ),
        },
        logging: crate::LoggingConfig {
            level: pick(overlay.logging.level, base.logging.level, default.logging.level),
            format: pick(overlay.logging.format, base.logging.format, default.logging.format),
            file: overlay.logging.file.or(base.logging.file),
        },
    }
}

/// If `overlay` differs from the built-in default, it was explicitly set
/// somewhere and wins; otherwise keep whatever `base` already carried.
fn pick<T: PartialEq>(overlay: T, base: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_local_config(dir: &Path, content: &str) -> PathBuf {
        let config_dir = dir.join(".wikidex");
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_default_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let config = loader.load(temp.path(), None).unwrap();
        assert_eq!(config.vectorstore.dimension, 384);
    }

    #[test]
    fn local_overrides_default() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        write_local_config(
            temp.path(),
            r#"
            [vectorstore]
            connection_string = "postgres://local/db"
            dimension = 768
            "#,
        );
        let config = loader.load(temp.path(), None).unwrap();
        assert_eq!(config.vectorstore.connection_string, "postgres://local/db");
        assert_eq!(config.vectorstore.dimension, 768);
    }

    #[test]
    fn global_overrides_default_and_local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
            [logging]
            level = "debug"

            [vectorstore]
            connection_string = "postgres://global/db"
            "#,
        )
        .unwrap();

        write_local_config(
            temp.path(),
            r#"
            [vectorstore]
            connection_string = "postgres://local/db"
            "#,
        );

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.vectorstore.connection_string, "postgres://local/db");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn cli_overrides_win_over_everything() {
        let temp = TempDir::new().unwrap();
        write_local_config(
            temp.path(),
            r#"
            [vectorstore]
            connection_string = "postgres://local/db"
            "#,
        );
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let overrides = crate::ConfigOverrides {
            vectorstore_connection_string: Some("postgres://cli/db".to_string()),
            log_level: Some("trace".to_string()),
            ..Default::default()
        };
        let config = loader.load(temp.path(), Some(&overrides)).unwrap();
        assert_eq!(config.vectorstore.connection_string, "postgres://cli/db");
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn save_and_reload_round_trips() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let mut config = WikidexConfig::default();
        config.vectorstore.connection_string = "postgres://saved/db".to_string();
        loader.save_local(temp.path(), &config).unwrap();

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let loaded = loader.load(temp.path(), None).unwrap();
        assert_eq!(loaded.vectorstore.connection_string, "postgres://saved/db");
    }

    #[test]
    fn init_local_creates_valid_toml() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let config_path = loader.init_local(temp.path()).unwrap();
        assert!(config_path.exists());
        let content = std::fs::read_to_string(&config_path).unwrap();
        let _: WikidexConfig = toml::from_str(&content).unwrap();
    }

    #[test]
    fn cache_clearing_forces_reload() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            "[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let _ = loader.load_global().unwrap();
        assert!(loader.global_config.is_some());
        loader.clear_cache();
        assert!(loader.global_config.is_none());
    }
}
