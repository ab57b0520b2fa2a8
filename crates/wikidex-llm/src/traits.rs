//! `LlmAdapter` trait definition.
//!
//! The same narrow interface dispatches to either a remote HTTP endpoint or
//! an in-process model runner (§4.9); callers never see which.

use async_trait::async_trait;

use crate::error::LlmError;

/// Generates an answer to `query`, optionally grounded in `context`.
///
/// This trait defines the interface implemented by both the remote HTTP
/// adapter and the in-process runner. All operations are async so a remote
/// implementation can make network calls without a different trait shape.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Generate an answer. When `context` is `Some`, the adapter's system
    /// prompt instructs the model to answer only from it; when `None`, the
    /// model answers from its own knowledge with no grounding instructions.
    async fn generate(&self, query: &str, context: Option<&str>) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test that the trait is object-safe.
    fn _assert_object_safe(_: &dyn LlmAdapter) {}
}
