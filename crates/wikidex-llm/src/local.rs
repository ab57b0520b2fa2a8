//! In-process model runner.
//!
//! The concrete LLM used to generate answers is explicitly out of scope
//! (§1): this adapter exists so `wikidex-rag` and the CLI can select a
//! `LlmAdapter` without a network endpoint configured, but it does not ship
//! a real local model. Kept as a stub implementing the full trait so callers
//! can swap it for a real in-process runner later without changing call
//! sites.

use async_trait::async_trait;

use crate::error::{LlmError, Result};
use crate::traits::LlmAdapter;

/// A pluggable no-op stand-in for an in-process model runner.
pub struct LocalLlmAdapter {
    model_id: String,
}

impl LocalLlmAdapter {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl LlmAdapter for LocalLlmAdapter {
    async fn generate(&self, _query: &str, _context: Option<&str>) -> Result<String> {
        Err(LlmError::NotImplemented(format!(
            "no in-process runner is bundled for model '{}'; configure llm.endpoint to use RemoteLlmAdapter",
            self.model_id
        )))
    }
}
