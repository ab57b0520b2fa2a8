//! Remote HTTP adapter: dispatches a rendered prompt to a model-specific
//! HTTP endpoint (§6 "LLM HTTP").
//!
//! Wire contract: `POST {endpoint}` with body `{"inputs": prompt,
//! "parameters": {"max_new_tokens": N}}`, bearer-token auth from an
//! environment variable, response `[{"generated_text": "..."}]`. The
//! adapter strips the echoed prompt prefix and trims whitespace, matching
//! `original_source/askwikidata.py`'s `ask_mistral_hf`/`ask_llama_hf`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use wikidex_config::{LlmConfig, PromptFamily};

use crate::error::LlmError;
use crate::prompt;
use crate::traits::LlmAdapter;

/// Base delay before a single retry of a transient failure.
const RETRY_BASE_DELAY_MS: u64 = 500;
/// Jitter window added on top of the base delay.
const RETRY_JITTER_MS: u64 = 250;

#[derive(Debug, Serialize)]
struct GenerateParameters {
    max_new_tokens: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    inputs: String,
    parameters: GenerateParameters,
}

#[derive(Debug, Deserialize)]
struct GenerateResponseItem {
    generated_text: String,
}

/// Adapter that POSTs rendered prompts to a remote HTTP endpoint.
pub struct RemoteLlmAdapter {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    family: PromptFamily,
    max_new_tokens: u32,
    timeout_secs: u64,
}

impl RemoteLlmAdapter {
    /// Build an adapter from a fully-resolved `LlmConfig`. Reads the bearer
    /// token from `config.api_key_env` if set; a missing endpoint is a
    /// construction-time error, since the caller should have selected
    /// [`crate::local::LocalLlmAdapter`] instead.
    pub fn new(config: &LlmConfig) -> crate::error::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| LlmError::InvalidResponse("llm.endpoint is not set".to_string()))?;

        let api_key = match &config.api_key_env {
            Some(var) => Some(
                std::env::var(var).map_err(|_| LlmError::MissingApiKey(var.clone()))?,
            ),
            None => None,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            family: config.family,
            max_new_tokens: config.max_new_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    async fn send(&self, prompt: &str) -> crate::error::Result<String> {
        let mut request = self.client.post(&self.endpoint).json(&GenerateRequest {
            inputs: prompt.to_string(),
            parameters: GenerateParameters {
                max_new_tokens: self.max_new_tokens,
            },
        });
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout_secs)
            } else {
                LlmError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ServerError {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::InvalidResponse(format!(
                "status {status}: {body}"
            )));
        }

        let items: Vec<GenerateResponseItem> = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let first = items
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("empty response array".to_string()))?;

        Ok(first.generated_text.replace(prompt, "").trim().to_string())
    }

    /// Transient transport/server failures get exactly one retry with
    /// jitter (§9 "Retries"); anything else (auth, malformed response) is
    /// surfaced immediately.
    async fn send_with_retry(&self, prompt: &str) -> crate::error::Result<String> {
        match self.send(prompt).await {
            Ok(text) => Ok(text),
            Err(err) if is_transient(&err) => {
                let jitter = rand::thread_rng().gen_range(0..RETRY_JITTER_MS);
                tokio::time::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS + jitter)).await;
                self.send(prompt).await
            }
            Err(err) => Err(err),
        }
    }
}

fn is_transient(err: &LlmError) -> bool {
    matches!(
        err,
        LlmError::Http(_) | LlmError::Timeout(_) | LlmError::ServerError { .. }
    )
}

#[async_trait]
impl LlmAdapter for RemoteLlmAdapter {
    async fn generate(&self, query: &str, context: Option<&str>) -> crate::error::Result<String> {
        let system = context.map(|c| {
            let today = Utc::now().format("%Y-%m-%d").to_string();
            prompt::system_prompt(c, &today)
        });
        let rendered = prompt::render(self.family, query, system.as_deref());
        self.send_with_retry(&rendered).await
    }
}
