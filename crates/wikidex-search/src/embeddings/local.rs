//! Local embedding provider using Candle and a BGE BERT model
//!
//! Provides local inference for embedding generation with GPU acceleration:
//! - **Model**: BAAI/bge-small-en-v1.5 (384 dimensions), CLS-pooled and L2-normalized
//!
//! GPU acceleration via compile-time features:
//! - `--features metal` for macOS Metal/MPS
//! - `--features cuda` for NVIDIA CUDA

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{api::sync::Api, Repo, RepoType};
use once_cell::sync::OnceCell;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer};
use tracing::{debug, info};

use crate::error::{Result, SearchError};

use super::provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};

/// Fixed output dimension of bge-small-en-v1.5.
pub const EMBEDDING_DIM: usize = 384;

/// Default batch size used when the caller doesn't supply one.
const DEFAULT_BATCH_SIZE: usize = 32;

/// Model repository on HuggingFace Hub.
const MODEL_ID: &str = "BAAI/bge-small-en-v1.5";

/// BGE's recommended instruction prefix for retrieval queries (not applied
/// to document chunks, which are embedded as-is).
const QUERY_INSTRUCTION: &str = "Represent this sentence for searching relevant passages: ";

/// Local embedding provider using Candle for inference.
///
/// Uses `Arc<LocalProviderInner>` for interior clonability, which is
/// required for `spawn_blocking` to move the provider into the blocking
/// task. Thread-safe: uses `OnceCell` for lazy model initialization.
#[derive(Clone)]
pub struct LocalProvider {
    inner: Arc<LocalProviderInner>,
}

struct LocalProviderInner {
    model: OnceCell<LoadedModel>,
    device: Device,
}

struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl LocalProvider {
    /// Create a new local provider with default settings.
    ///
    /// Device is selected automatically: Metal > CUDA > CPU.
    pub fn new() -> Result<Self> {
        let device = select_device()?;
        Ok(Self {
            inner: Arc::new(LocalProviderInner {
                model: OnceCell::new(),
                device,
            }),
        })
    }

    /// Create with a specific device.
    pub fn with_device(device: Device) -> Self {
        Self {
            inner: Arc::new(LocalProviderInner {
                model: OnceCell::new(),
                device,
            }),
        }
    }

    /// Get the device being used.
    pub fn device(&self) -> &Device {
        &self.inner.device
    }

    fn device_name(&self) -> String {
        match &self.inner.device {
            Device::Cpu => "CPU".to_string(),
            #[cfg(feature = "metal")]
            Device::Metal(_) => "Metal".to_string(),
            #[cfg(feature = "cuda")]
            Device::Cuda(_) => "CUDA".to_string(),
            #[allow(unreachable_patterns)]
            _ => "Unknown".to_string(),
        }
    }

    fn ensure_model(&self) -> Result<&LoadedModel> {
        self.inner
            .model
            .get_or_try_init(|| load_model(&self.inner.device))
    }

    /// Whether the model has been loaded into memory yet.
    pub fn is_loaded(&self) -> bool {
        self.inner.model.get().is_some()
    }

    fn encode_sync(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let model_data = self.ensure_model()?;
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size.max(1)) {
            debug!("embedding batch of {} texts", chunk.len());
            let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            let mut vecs = encode_with_model(
                &model_data.model,
                &model_data.tokenizer,
                &model_data.device,
                &refs,
            )?;
            out.append(&mut vecs);
        }
        Ok(out)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    async fn embed_documents(
        &self,
        texts: Vec<String>,
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let provider = self.clone();
        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        tokio::task::spawn_blocking(move || provider.encode_sync(&texts, batch_size))
            .await
            .map_err(|e| SearchError::Embedding(format!("blocking task panicked: {e}")))?
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let provider = self.clone();
        let query = format!("{QUERY_INSTRUCTION}{text}");
        let vecs = tokio::task::spawn_blocking(move || provider.encode_sync(&[query], 1))
            .await
            .map_err(|e| SearchError::Embedding(format!("blocking task panicked: {e}")))??;
        vecs.into_iter()
            .next()
            .ok_or_else(|| SearchError::Embedding("query encode returned no vector".into()))
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        let loaded = self.is_loaded();
        let device = self.device_name();
        let available = loaded || check_model_cached(MODEL_ID).is_ok();

        let error = if !available {
            Some("model not available, download required".to_string())
        } else {
            None
        };

        Ok(ProviderStatus {
            available,
            provider_type: EmbeddingProviderType::Local,
            device,
            latency_ms: None,
            error,
        })
    }

    async fn warmup(&self) -> Result<()> {
        let provider = self.clone();
        let start = Instant::now();

        tokio::task::spawn_blocking(move || {
            provider.ensure_model()?;
            Ok::<_, SearchError>(())
        })
        .await
        .map_err(|e| SearchError::Embedding(format!("warmup task panicked: {e}")))??;

        info!("local embedder warmup complete in {:?}", start.elapsed());
        Ok(())
    }

    fn embedding_dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Local
    }
}

fn select_device() -> Result<Device> {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("using Metal/MPS GPU acceleration");
                return Ok(device);
            }
            Err(e) => debug!("Metal not available: {}", e),
        }
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("using CUDA GPU acceleration");
                return Ok(device);
            }
            Err(e) => debug!("CUDA not available: {}", e),
        }
    }

    info!("using CPU (no GPU acceleration available)");
    Ok(Device::Cpu)
}

fn check_model_cached(model_id: &str) -> std::result::Result<bool, String> {
    let api = Api::new().map_err(|e| format!("HuggingFace API unavailable: {e}"))?;
    let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, "main".to_string());
    let api_repo = api.repo(repo);

    match api_repo.info() {
        Ok(_) => Ok(true),
        Err(e) => Err(format!("model not available: {e}")),
    }
}

fn download_model_files(model_id: &str) -> Result<(PathBuf, PathBuf, PathBuf)> {
    let api = Api::new().map_err(|e| SearchError::Embedding(format!("failed to create HF API: {e}")))?;
    let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, "main".to_string());
    let api_repo = api.repo(repo);

    let config = api_repo
        .get("config.json")
        .map_err(|e| SearchError::Embedding(format!("failed to download config.json: {e}")))?;
    let tokenizer = api_repo
        .get("tokenizer.json")
        .map_err(|e| SearchError::Embedding(format!("failed to download tokenizer.json: {e}")))?;
    let weights = api_repo
        .get("model.safetensors")
        .map_err(|e| SearchError::Embedding(format!("failed to download model.safetensors: {e}")))?;

    Ok((config, tokenizer, weights))
}

fn load_model(device: &Device) -> Result<LoadedModel> {
    info!("loading embedding model ({})...", MODEL_ID);

    let (config_path, tokenizer_path, weights_path) = download_model_files(MODEL_ID)?;

    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| SearchError::Embedding(format!("failed to read config: {e}")))?;
    let config: BertConfig = serde_json::from_str(&config_str)
        .map_err(|e| SearchError::Embedding(format!("failed to parse config: {e}")))?;

    let tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| SearchError::Embedding(format!("failed to load tokenizer: {e}")))?;

    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, device)
            .map_err(|e| SearchError::Embedding(format!("failed to load weights: {e}")))?
    };

    let model = BertModel::load(vb, &config)
        .map_err(|e| SearchError::Embedding(format!("failed to create model: {e}")))?;

    info!("embedding model loaded (dim={})", EMBEDDING_DIM);

    Ok(LoadedModel {
        model,
        tokenizer,
        device: device.clone(),
    })
}

/// L2 normalize each row.
fn normalize_l2(v: &Tensor) -> Result<Tensor> {
    v.broadcast_div(&v.sqr()?.sum_keepdim(1)?.sqrt()?)
        .map_err(|e| SearchError::Embedding(format!("L2 normalization failed: {e}")))
}

/// BGE's recommended pooling: take the `[CLS]` token's hidden state.
fn cls_pool(embeddings: &Tensor) -> Result<Tensor> {
    embeddings
        .i((.., 0, ..))
        .map_err(|e| SearchError::Embedding(format!("CLS pooling failed: {e}")))
}

fn encode_with_model(
    model: &BertModel,
    tokenizer: &Tokenizer,
    device: &Device,
    texts: &[&str],
) -> Result<Vec<Vec<f32>>> {
    let mut tokenizer = tokenizer.clone();
    let padding = PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..Default::default()
    };
    tokenizer.with_padding(Some(padding));

    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| SearchError::Embedding(format!("tokenization failed: {e}")))?;

    let token_ids: Vec<Tensor> = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_ids(), device))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SearchError::Embedding(format!("failed to create token tensor: {e}")))?;

    let token_type_ids: Vec<Tensor> = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_type_ids(), device))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SearchError::Embedding(format!("failed to create type id tensor: {e}")))?;

    let attention_masks: Vec<Tensor> = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_attention_mask(), device))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SearchError::Embedding(format!("failed to create attention mask: {e}")))?;

    let token_ids = Tensor::stack(&token_ids, 0)
        .map_err(|e| SearchError::Embedding(format!("failed to stack tokens: {e}")))?;
    let token_type_ids = Tensor::stack(&token_type_ids, 0)
        .map_err(|e| SearchError::Embedding(format!("failed to stack type ids: {e}")))?;
    let attention_mask = Tensor::stack(&attention_masks, 0)
        .map_err(|e| SearchError::Embedding(format!("failed to stack masks: {e}")))?;

    let embeddings = model
        .forward(&token_ids, &token_type_ids, Some(&attention_mask))
        .map_err(|e| SearchError::Embedding(format!("forward pass failed: {e}")))?;

    let pooled = cls_pool(&embeddings)?;
    let normalized = normalize_l2(&pooled)?;

    let result: Vec<Vec<f32>> = (0..normalized.dim(0)?)
        .map(|i| normalized.get(i)?.to_vec1::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SearchError::Embedding(format!("failed to convert embeddings: {e}")))?;

    Ok(result)
}
