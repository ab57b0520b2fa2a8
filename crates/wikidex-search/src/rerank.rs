//! Cross-encoder reranking of ANN candidates.
//!
//! Unlike the bi-encoder embedder, a cross-encoder scores `(query,
//! candidate)` pairs jointly, which is far more accurate but too slow to
//! run over the whole vector store — so it only ever sees the ANN stage's
//! shortlist.

use std::path::PathBuf;
use std::sync::Arc;

use candle_core::{Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{api::sync::Api, Repo, RepoType};
use once_cell::sync::OnceCell;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams, TruncationStrategy};
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::schema::SearchHit;

/// Token truncation length applied to each `(query, candidate)` pair,
/// matching the reranker's own training setup.
const DEFAULT_MAX_TOKENS: usize = 512;

/// A reranked hit: the original ANN hit plus the cross-encoder's score.
/// Higher is more relevant.
#[derive(Debug, Clone)]
pub struct RankedHit {
    pub hit: SearchHit,
    pub score: f32,
}

/// Cross-encoder reranker backed by a BERT-family sequence-classification
/// model (e.g. `BAAI/bge-reranker-base`).
#[derive(Clone)]
pub struct Reranker {
    inner: Arc<RerankerInner>,
}

struct RerankerInner {
    model_id: String,
    max_tokens: usize,
    device: Device,
    loaded: OnceCell<LoadedReranker>,
}

struct LoadedReranker {
    model: BertModel,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

impl Reranker {
    /// Create a reranker for the given HuggingFace model id. Loading is
    /// lazy: nothing is downloaded until the first [`Reranker::rerank`] call.
    pub fn new(model_id: impl Into<String>, max_tokens: usize) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(RerankerInner {
                model_id: model_id.into(),
                max_tokens: if max_tokens == 0 {
                    DEFAULT_MAX_TOKENS
                } else {
                    max_tokens
                },
                device: Device::Cpu,
                loaded: OnceCell::new(),
            }),
        })
    }

    fn ensure_loaded(&self) -> Result<&LoadedReranker> {
        self.inner
            .loaded
            .get_or_try_init(|| load_reranker(&self.inner.model_id, &self.inner.device))
    }

    fn rerank_sync(&self, query: &str, candidates: Vec<SearchHit>) -> Result<Vec<RankedHit>> {
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let loaded = self.ensure_loaded()?;
        let pairs: Vec<(String, String)> = candidates
            .iter()
            .map(|hit| (query.to_string(), hit.text.clone()))
            .collect();

        let scores = score_pairs(
            &loaded.model,
            &loaded.classifier,
            &loaded.tokenizer,
            &loaded.device,
            &pairs,
            self.inner.max_tokens,
        )?;

        let mut ranked: Vec<RankedHit> = candidates
            .into_iter()
            .zip(scores)
            .map(|(hit, score)| RankedHit { hit, score })
            .collect();

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }

    /// Score and sort `candidates` by relevance to `query`, descending,
    /// keeping at most `top_k`.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchHit>,
        top_k: usize,
    ) -> Result<Vec<RankedHit>> {
        let reranker = self.clone();
        let query = query.to_string();
        let mut ranked = tokio::task::spawn_blocking(move || reranker.rerank_sync(&query, candidates))
            .await
            .map_err(|e| SearchError::Rerank(format!("blocking task panicked: {e}")))??;
        ranked.truncate(top_k);
        Ok(ranked)
    }
}

fn load_reranker(model_id: &str, device: &Device) -> Result<LoadedReranker> {
    info!("loading reranker model ({})...", model_id);

    let (config_path, tokenizer_path, weights_path) = download_model_files(model_id)?;

    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| SearchError::Rerank(format!("failed to read config: {e}")))?;
    let config: BertConfig = serde_json::from_str(&config_str)
        .map_err(|e| SearchError::Rerank(format!("failed to parse config: {e}")))?;

    let tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| SearchError::Rerank(format!("failed to load tokenizer: {e}")))?;

    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, device)
            .map_err(|e| SearchError::Rerank(format!("failed to load weights: {e}")))?
    };

    let model = BertModel::load(vb.pp("bert"), &config)
        .map_err(|e| SearchError::Rerank(format!("failed to create model: {e}")))?;

    let classifier = candle_nn::linear(config.hidden_size, 1, vb.pp("classifier"))
        .map_err(|e| SearchError::Rerank(format!("failed to load classifier head: {e}")))?;

    Ok(LoadedReranker {
        model,
        classifier,
        tokenizer,
        device: device.clone(),
    })
}

fn download_model_files(model_id: &str) -> Result<(PathBuf, PathBuf, PathBuf)> {
    let api = Api::new().map_err(|e| SearchError::Rerank(format!("failed to create HF API: {e}")))?;
    let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, "main".to_string());
    let api_repo = api.repo(repo);

    let config = api_repo
        .get("config.json")
        .map_err(|e| SearchError::Rerank(format!("failed to download config.json: {e}")))?;
    let tokenizer = api_repo
        .get("tokenizer.json")
        .map_err(|e| SearchError::Rerank(format!("failed to download tokenizer.json: {e}")))?;
    let weights = api_repo
        .get("model.safetensors")
        .map_err(|e| SearchError::Rerank(format!("failed to download model.safetensors: {e}")))?;

    Ok((config, tokenizer, weights))
}

/// Run the cross-encoder over `(query, candidate)` pairs and return one
/// relevance logit per pair.
fn score_pairs(
    model: &BertModel,
    classifier: &Linear,
    tokenizer: &Tokenizer,
    device: &Device,
    pairs: &[(String, String)],
    max_tokens: usize,
) -> Result<Vec<f32>> {
    let mut tokenizer = tokenizer.clone();
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..Default::default()
    }));
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_tokens,
            strategy: TruncationStrategy::LongestFirst,
            ..Default::default()
        }))
        .map_err(|e| SearchError::Rerank(format!("failed to configure truncation: {e}")))?;

    let inputs: Vec<(&str, &str)> = pairs
        .iter()
        .map(|(q, c)| (q.as_str(), c.as_str()))
        .collect();
    let encodings = tokenizer
        .encode_batch(inputs, true)
        .map_err(|e| SearchError::Rerank(format!("tokenization failed: {e}")))?;

    let token_ids: Vec<Tensor> = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_ids(), device))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SearchError::Rerank(format!("failed to create token tensor: {e}")))?;
    let token_type_ids: Vec<Tensor> = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_type_ids(), device))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SearchError::Rerank(format!("failed to create type id tensor: {e}")))?;
    let attention_masks: Vec<Tensor> = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_attention_mask(), device))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SearchError::Rerank(format!("failed to create attention mask: {e}")))?;

    let token_ids = Tensor::stack(&token_ids, 0)
        .map_err(|e| SearchError::Rerank(format!("failed to stack tokens: {e}")))?;
    let token_type_ids = Tensor::stack(&token_type_ids, 0)
        .map_err(|e| SearchError::Rerank(format!("failed to stack type ids: {e}")))?;
    let attention_mask = Tensor::stack(&attention_masks, 0)
        .map_err(|e| SearchError::Rerank(format!("failed to stack masks: {e}")))?;

    let hidden = model
        .forward(&token_ids, &token_type_ids, Some(&attention_mask))
        .map_err(|e| SearchError::Rerank(format!("forward pass failed: {e}")))?;

    debug!("reranking {} pairs", pairs.len());

    let cls = hidden
        .i((.., 0, ..))
        .map_err(|e| SearchError::Rerank(format!("CLS extraction failed: {e}")))?;
    let logits = classifier
        .forward(&cls)
        .map_err(|e| SearchError::Rerank(format!("classifier head failed: {e}")))?;

    logits
        .squeeze(1)
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(|e| SearchError::Rerank(format!("failed to read logits: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: i64, qid: &str, text: &str) -> SearchHit {
        SearchHit {
            id,
            qid: qid.to_string(),
            text: text.to_string(),
            distance: 0.1,
        }
    }

    #[test]
    fn reranker_construction_does_not_download() {
        let reranker = Reranker::new("BAAI/bge-reranker-base", 512);
        assert!(reranker.is_ok());
    }

    #[tokio::test]
    async fn rerank_empty_candidates_returns_empty() {
        let reranker = Reranker::new("BAAI/bge-reranker-base", 512).unwrap();
        let result = reranker.rerank("who wrote hitchhiker's guide", vec![], 5).await;
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn ranked_hit_carries_original_fields() {
        let h = hit(1, "Q42", "Douglas Adams was an English author.");
        let ranked = RankedHit {
            hit: h.clone(),
            score: 3.2,
        };
        assert_eq!(ranked.hit.qid, h.qid);
        assert_eq!(ranked.score, 3.2);
    }
}
