//! OpenAI-compatible embedding provider
//!
//! Provides embedding generation via OpenAI-compatible APIs including:
//! - OpenAI API
//! - Azure OpenAI (via `azure_mode`, which swaps the auth header)
//! - Ollama and other self-hosted servers speaking the same wire protocol
//!
//! # Endpoint Format
//!
//! - POST `{base_url}/v1/embeddings`
//! - Request: `{"model": "...", "input": ["text1", "text2", ...]}`
//! - Response: `{"data": [{"embedding": [...], "index": 0}, ...], ...}`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

#[cfg(feature = "rate-limit")]
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
#[cfg(feature = "rate-limit")]
use std::num::NonZeroU32;
#[cfg(feature = "rate-limit")]
use std::sync::Arc;

use super::provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
use crate::error::{Result, SearchError};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BATCH_SIZE: usize = 256;

/// Transient failures get exactly one retry, with jittered backoff.
const RETRY_BASE_DELAY_MS: u64 = 500;
const RETRY_JITTER_MS: u64 = 250;

/// Default requests-per-second cap applied when the rate-limit feature is
/// enabled but the caller leaves `requests_per_second` at its default.
#[cfg(feature = "rate-limit")]
const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;

#[cfg(feature = "rate-limit")]
type OpenAIRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Configuration for an OpenAI-compatible embedding provider.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API (e.g. "https://api.openai.com/v1").
    pub base_url: String,
    /// API key (optional for local servers like Ollama).
    pub api_key: Option<String>,
    /// Embedding model name (e.g. "text-embedding-3-small").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Use Azure OpenAI header format (`api-key` instead of `Bearer`).
    pub azure_mode: bool,
    /// Requests-per-second cap against the remote endpoint, enforced when
    /// the `rate-limit` feature is enabled. Self-hosted OpenAI-compatible
    /// servers (Ollama) have no such limit and leave this `None`.
    #[cfg(feature = "rate-limit")]
    pub requests_per_second: Option<u32>,
}

impl OpenAIConfig {
    /// Create config for Ollama's local OpenAI-compatible endpoint.
    pub fn ollama() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".into(),
            api_key: None,
            model: "nomic-embed-text".into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            azure_mode: false,
            #[cfg(feature = "rate-limit")]
            requests_per_second: None,
        }
    }

    /// Create config for the OpenAI API.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: Some(api_key.into()),
            model: "text-embedding-3-small".into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            azure_mode: false,
            #[cfg(feature = "rate-limit")]
            requests_per_second: None,
        }
    }

    /// Set the requests-per-second cap (only meaningful with the
    /// `rate-limit` feature enabled).
    #[cfg(feature = "rate-limit")]
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = Some(rps);
        self
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[allow(dead_code)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
    #[allow(dead_code)]
    model: Option<String>,
}

/// OpenAI-compatible embedding provider.
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
    /// Dimension detected from the first successful response.
    dimension: AtomicUsize,
    #[cfg(feature = "rate-limit")]
    rate_limiter: Option<Arc<OpenAIRateLimiter>>,
}

impl Clone for OpenAIProvider {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
            dimension: AtomicUsize::new(self.dimension.load(Ordering::Relaxed)),
            #[cfg(feature = "rate-limit")]
            rate_limiter: self.rate_limiter.clone(),
        }
    }
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::ProviderUnavailable(format!("HTTP client error: {e}")))?;

        #[cfg(feature = "rate-limit")]
        let rate_limiter = config.requests_per_second.map(|rps| {
            let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::new(DEFAULT_REQUESTS_PER_SECOND).unwrap());
            Arc::new(RateLimiter::direct(Quota::per_second(rps)))
        });

        Ok(Self {
            client,
            config,
            dimension: AtomicUsize::new(0),
            #[cfg(feature = "rate-limit")]
            rate_limiter,
        })
    }

    /// Block until the rate limiter grants a permit. A no-op when the
    /// `rate-limit` feature is disabled or no cap was configured.
    #[cfg(feature = "rate-limit")]
    async fn wait_for_permit(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }

    #[cfg(not(feature = "rate-limit"))]
    async fn wait_for_permit(&self) {}

    fn embeddings_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/embeddings")
        } else {
            format!("{base}/v1/embeddings")
        }
    }

    async fn request_with_retry(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.wait_for_permit().await;
        match self.send_request(texts.clone()).await {
            Ok(embeddings) => Ok(embeddings),
            Err(e) if is_transient(&e) => {
                let jitter = rand::thread_rng().gen_range(0..RETRY_JITTER_MS);
                tokio::time::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS + jitter)).await;
                self.wait_for_permit().await;
                self.send_request(texts).await
            }
            Err(e) => Err(e),
        }
    }

    async fn send_request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = self.embeddings_url();
        let request_body = EmbeddingsRequest {
            model: self.config.model.clone(),
            input: texts,
        };

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request_body);

        if let Some(ref api_key) = self.config.api_key {
            request = if self.config.azure_mode {
                request.header("api-key", api_key)
            } else {
                request.header("Authorization", format!("Bearer {api_key}"))
            };
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::ProviderUnavailable("request timed out".into())
            } else if e.is_connect() {
                SearchError::ProviderUnavailable(format!("connection failed: {e}"))
            } else {
                SearchError::ProviderUnavailable(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();

        match status {
            StatusCode::OK => {
                let embed_response: EmbeddingsResponse = response
                    .json()
                    .await
                    .map_err(|e| SearchError::ProviderUnavailable(format!("invalid response: {e}")))?;

                let embeddings: Vec<Vec<f32>> =
                    embed_response.data.into_iter().map(|d| d.embedding).collect();

                if let Some(first) = embeddings.first() {
                    let dim = first.len();
                    let cached = self.dimension.load(Ordering::Relaxed);
                    if cached == 0 {
                        self.dimension.store(dim, Ordering::Relaxed);
                    } else if cached != dim {
                        return Err(SearchError::DimensionMismatch {
                            expected: cached,
                            actual: dim,
                        });
                    }
                }

                Ok(embeddings)
            }
            StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::OpenAIAuth(format!("authentication failed: {body}")))
            }
            StatusCode::NOT_FOUND => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::OpenAIInvalidModel(format!("model not found: {body}")))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                Err(SearchError::OpenAIRateLimit { retry_after })
            }
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => Err(
                SearchError::ProviderUnavailable("service temporarily unavailable".into()),
            ),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::ProviderUnavailable(format!(
                    "request failed with status {status}: {body}"
                )))
            }
        }
    }

    async fn health_check(&self) -> Result<Duration> {
        let start = Instant::now();
        let result = self.send_request(vec!["health check".into()]).await;
        let latency = start.elapsed();

        match result {
            Ok(_) => Ok(latency),
            Err(SearchError::OpenAIRateLimit { .. }) => Ok(latency),
            Err(e) => Err(e),
        }
    }
}

/// Only HTTP-transport and server-side errors are worth retrying; auth
/// failures, missing models, and parse errors never are.
fn is_transient(err: &SearchError) -> bool {
    matches!(err, SearchError::ProviderUnavailable(_))
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed_documents(
        &self,
        texts: Vec<String>,
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };

        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size) {
            let mut vecs = self.request_with_retry(chunk.to_vec()).await?;
            out.append(&mut vecs);
        }
        Ok(out)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vecs = self.request_with_retry(vec![text.to_string()]).await?;
        vecs.into_iter()
            .next()
            .ok_or_else(|| SearchError::Embedding("query encode returned no vector".into()))
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        match self.health_check().await {
            Ok(latency) => Ok(
                ProviderStatus::healthy(EmbeddingProviderType::Openai, "Remote")
                    .with_latency(latency.as_millis() as u64),
            ),
            Err(e) => Ok(ProviderStatus::unavailable(
                EmbeddingProviderType::Openai,
                e.to_string(),
            )),
        }
    }

    async fn warmup(&self) -> Result<()> {
        let status = self.check_status().await?;
        if !status.available {
            return Err(SearchError::ProviderUnavailable(
                status.error.unwrap_or_else(|| "provider not ready".into()),
            ));
        }
        Ok(())
    }

    fn embedding_dim(&self) -> usize {
        let dim = self.dimension.load(Ordering::Relaxed);
        if dim > 0 {
            dim
        } else {
            match self.config.model.as_str() {
                "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
                "text-embedding-3-large" => 3072,
                "nomic-embed-text" => 768,
                _ => 384,
            }
        }
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Openai
    }
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("timeout_secs", &self.config.timeout_secs)
            .field("azure_mode", &self.config.azure_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_response(dim: usize, count: usize) -> serde_json::Value {
        let data: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "object": "embedding",
                    "embedding": vec![0.1_f32; dim],
                    "index": i
                })
            })
            .collect();

        serde_json::json!({
            "object": "list",
            "data": data,
            "model": "test-model",
        })
    }

    fn test_config(server: &MockServer) -> OpenAIConfig {
        OpenAIConfig {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            model: "test-model".into(),
            timeout_secs: 5,
            azure_mode: false,
            #[cfg(feature = "rate-limit")]
            requests_per_second: None,
        }
    }

    #[tokio::test]
    async fn test_embed_documents_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_json(&EmbeddingsRequest {
                model: "test-model".into(),
                input: vec!["hello world".into()],
            }))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(384, 1)))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let result = provider
            .embed_documents(vec!["hello world".into()], 256)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].len(), 384);
    }

    #[tokio::test]
    async fn test_embed_query_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(384, 1)))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let result = provider.embed_query("douglas adams").await.unwrap();
        assert_eq!(result.len(), 384);
    }

    #[tokio::test]
    async fn test_batching_splits_requests() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(384, 2)))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let texts = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        let result = provider.embed_documents(texts, 2).await.unwrap();
        assert_eq!(result.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let server = MockServer::start().await;
        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let result = provider.embed_documents(vec![], 256).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_does_not_retry() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let result = provider.embed_query("test").await;
        assert!(matches!(result, Err(SearchError::OpenAIAuth(_))));
    }

    #[tokio::test]
    async fn test_service_unavailable_retries_once() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let result = provider.embed_query("test").await;
        assert!(matches!(result, Err(SearchError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn test_model_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Model not found"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let result = provider.embed_query("test").await;
        assert!(matches!(result, Err(SearchError::OpenAIInvalidModel(_))));
    }

    #[tokio::test]
    async fn test_azure_mode_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("api-key", "azure-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(1536, 1)))
            .mount(&server)
            .await;

        let config = OpenAIConfig {
            base_url: server.uri(),
            api_key: Some("azure-key".into()),
            model: "text-embedding-ada-002".into(),
            timeout_secs: 5,
            azure_mode: true,
            #[cfg(feature = "rate-limit")]
            requests_per_second: None,
        };

        let provider = OpenAIProvider::new(config).unwrap();
        let result = provider.embed_query("test").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_provider_type() {
        let server = MockServer::start().await;
        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        assert_eq!(provider.provider_type(), EmbeddingProviderType::Openai);
    }

    #[tokio::test]
    async fn test_dimension_detection() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(1536, 1)))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let initial_dim = provider.embedding_dim();
        assert!(initial_dim > 0);

        let _ = provider.embed_query("test").await;
        assert_eq!(provider.embedding_dim(), 1536);
    }

    #[cfg(feature = "rate-limit")]
    #[test]
    fn config_with_rate_limit() {
        let config = OpenAIConfig::ollama().with_requests_per_second(20);
        assert_eq!(config.requests_per_second, Some(20));
    }

    #[cfg(feature = "rate-limit")]
    #[tokio::test]
    async fn rate_limiter_throttles_requests() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(768, 1)))
            .expect(4)
            .mount(&server)
            .await;

        // 2 RPS with governor's burst-equal-to-quota behavior: requests 1-2
        // are immediate, 3-4 each wait ~500ms.
        let config = OpenAIConfig {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            model: "test-model".into(),
            timeout_secs: 5,
            azure_mode: false,
            requests_per_second: Some(2),
        };
        let provider = OpenAIProvider::new(config).unwrap();

        let start = Instant::now();
        for _ in 0..4 {
            provider.embed_query("test").await.unwrap();
        }
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_millis(900),
            "rate limiting should throttle requests, elapsed: {elapsed:?}"
        );
    }
}
