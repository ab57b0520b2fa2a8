//! Wikidex RAG - retrieval-augmented question answering (§4.8).
//!
//! Grounded in `original_source/askwikidata.py`'s `retrieve`/`rerank`/
//! `context`/`ask` methods: embed the query, recall an ANN shortlist,
//! cross-encoder rerank it, assemble a context window, then hand the
//! context to an [`wikidex_llm::LlmAdapter`] to produce an answer.

mod error;
mod sources;

pub use error::{RagError, Result};
pub use sources::{distinct_sources, source_url, DEFAULT_SOURCE_URL_TEMPLATE};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use wikidex_llm::LlmAdapter;
use wikidex_search::{EmbeddingProvider, RankedHit, Reranker, SearchHit, VectorStore};

/// How reranked chunks are ordered inside the assembled context string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOrder {
    /// Highest-scoring chunk first, descending.
    HighestFirst,
    /// Highest-scoring chunk last. Default: empirically improves downstream
    /// LLM answers, since most chat models attend more to recent context.
    HighestLast,
}

impl Default for ContextOrder {
    fn default() -> Self {
        ContextOrder::HighestLast
    }
}

/// Tunables for the retrieval step. Mirrors
/// `AskWikidata.__init__`'s `retrieval_chunks`/`context_chunks` constructor
/// arguments, generalized into an explicit config struct.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// ANN candidates to recall before reranking (typical 16-64).
    pub retrieval_k: usize,
    /// Reranked candidates kept for the final context (typical 5-7).
    pub context_k: usize,
    /// Ordering of chunks inside the assembled context.
    pub order: ContextOrder,
    /// Format string for source URLs; must contain a single `{id}` placeholder.
    pub source_url_template: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            retrieval_k: 32,
            context_k: 7,
            order: ContextOrder::default(),
            source_url_template: DEFAULT_SOURCE_URL_TEMPLATE.to_string(),
        }
    }
}

/// Narrows `VectorStore::ann` to the one method the retriever needs, so
/// tests can supply an in-memory fake instead of a live Postgres connection.
#[async_trait]
pub trait AnnSource: Send + Sync {
    async fn ann(
        &self,
        query: &[f32],
        k: usize,
        threshold: Option<f32>,
    ) -> wikidex_search::Result<Vec<SearchHit>>;
}

#[async_trait]
impl AnnSource for VectorStore {
    async fn ann(
        &self,
        query: &[f32],
        k: usize,
        threshold: Option<f32>,
    ) -> wikidex_search::Result<Vec<SearchHit>> {
        VectorStore::ann(self, query, k, threshold).await
    }
}

/// Context plus the distinct source URLs it was built from.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub context: String,
    pub sources: Vec<String>,
}

/// Embed -> ANN recall -> rerank -> context assembly.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn AnnSource>,
    reranker: Reranker,
    config: RagConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn AnnSource>,
        reranker: Reranker,
        config: RagConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            reranker,
            config,
        }
    }

    /// Run the full retrieval pipeline for `query` (§4.8 steps 1-6).
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        let vector = self.embedder.embed_query(query).await?;
        let candidates = self
            .store
            .ann(&vector, self.config.retrieval_k, None)
            .await?;
        debug!(candidates = candidates.len(), "recalled ANN candidates");

        let ranked = self
            .reranker
            .rerank(query, candidates, self.config.context_k)
            .await?;

        Ok(self.assemble(ranked))
    }

    fn assemble(&self, mut ranked: Vec<RankedHit>) -> RetrievalResult {
        // `rerank` already sorts descending by score; for `HighestLast` the
        // context string should read lowest-to-highest so the final line is
        // the most relevant chunk.
        if self.config.order == ContextOrder::HighestLast {
            ranked.reverse();
        }

        let context = ranked
            .iter()
            .map(|r| r.hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let sources = distinct_sources(
            &self.config.source_url_template,
            ranked.iter().map(|r| r.hit.qid.as_str()),
        );

        RetrievalResult { context, sources }
    }
}

/// A generated answer plus the sources its context was drawn from.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

/// Combines a [`Retriever`] with an [`LlmAdapter`] to answer a question end
/// to end, mirroring `AskWikidata.ask`.
pub struct Answerer {
    retriever: Retriever,
    llm: Arc<dyn LlmAdapter>,
}

impl Answerer {
    pub fn new(retriever: Retriever, llm: Arc<dyn LlmAdapter>) -> Self {
        Self { retriever, llm }
    }

    pub async fn ask(&self, query: &str) -> Result<Answer> {
        let RetrievalResult { context, sources } = self.retriever.retrieve(query).await?;
        let text = self.llm.generate(query, Some(&context)).await?;
        Ok(Answer { text, sources })
    }
}
