//! Wikidex Pipeline - bounded producer/consumer ingestion orchestration (§4.7).
//!
//! Connects three long-lived stages over two bounded `tokio::sync::mpsc`
//! channels, mirroring `original_source/wddump_textify.py`'s
//! `EMBED_QUEUE_SIZE`/`EMBED_BATCH_SIZE`/`INSERT_QUEUE_SIZE` architecture:
//!
//! ```text
//! [reader] --embed_queue(N1)--> [embedder] --insert_queue(N2)--> [inserter]
//! ```
//!
//! A full channel suspends the sender exactly like a blocking bounded
//! queue, so `Sender::send(...).await` on a full channel gives the
//! "blocking on full" backpressure contract without real OS threads or
//! processes (§5's "Idiomatic Rust translation of the scheduling model").
//! Dropping the reader's sender closes the channel, which stands in for the
//! source's `None` sentinel: each stage forwards the close after flushing
//! any partial batch.

mod error;
mod stats;

pub use error::{PipelineError, Result};
pub use stats::{PipelineStats, PipelineStatsSnapshot};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use wikidex_core::{CoreError, DumpReader, LabelStore, TextifyConfig, Textifier};
use wikidex_search::{Chunk, EmbeddingProvider, SearchError, VectorStore};

/// Configuration for the three stage queues and the embedder's batch size.
/// Deliberately independent of `wikidex-config`'s `PipelineConfig` (§9
/// "Globals as configuration": every component takes its configuration as
/// an explicit constructor input rather than reaching for process-wide
/// state); the CLI maps one onto the other when wiring the pipeline up.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Capacity of the `(id, text)` queue between reader and embedder (N1).
    pub embed_queue_capacity: usize,
    /// Capacity of the `(ids, texts, vectors)` queue between embedder and
    /// inserter (N2).
    pub insert_queue_capacity: usize,
    /// Number of sentences accumulated per embedder batch.
    pub embed_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embed_queue_capacity: 1024,
            insert_queue_capacity: 64,
            embed_batch_size: 256,
        }
    }
}

/// Destination for embedded chunks. Narrows `VectorStore::insert_many` to
/// the one method the inserter stage needs, so tests can supply an
/// in-memory fake instead of a live Postgres connection (§9 "Model clients
/// as interfaces", generalized from embedder/LLM to the vector store too).
#[async_trait]
pub trait ChunkSink: Send + Sync {
    async fn insert_many(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> wikidex_search::Result<()>;
}

#[async_trait]
impl ChunkSink for VectorStore {
    async fn insert_many(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> wikidex_search::Result<()> {
        VectorStore::insert_many(self, chunks, embeddings).await
    }
}

type EmbedItem = (String, String);
type InsertItem = (Vec<String>, Vec<String>, Vec<Vec<f32>>);

/// Run the full read -> textify -> embed -> insert pipeline to completion.
///
/// `stats` is owned by the caller so a progress reporter (e.g. the CLI's
/// `indicatif` bar) can poll it concurrently while this future runs.
pub async fn run_ingest(
    dump_path: impl Into<PathBuf>,
    labels: Arc<LabelStore>,
    textify_config: TextifyConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    sink: Arc<dyn ChunkSink>,
    config: PipelineConfig,
    stats: Arc<PipelineStats>,
) -> Result<()> {
    let (embed_tx, embed_rx) = mpsc::channel::<EmbedItem>(config.embed_queue_capacity);
    let (insert_tx, insert_rx) = mpsc::channel::<InsertItem>(config.insert_queue_capacity);

    let reader = tokio::spawn(reader_stage(
        dump_path.into(),
        labels,
        textify_config,
        embed_tx,
        stats.clone(),
    ));
    let embedder_task = tokio::spawn(embedder_stage(
        embed_rx,
        embedder,
        config.embed_batch_size,
        insert_tx,
        stats.clone(),
    ));
    let inserter = tokio::spawn(inserter_stage(insert_rx, sink, stats.clone()));

    let (reader_result, embedder_result, inserter_result) =
        tokio::try_join!(flatten(reader), flatten(embedder_task), flatten(inserter))?;

    reader_result?;
    embedder_result?;
    inserter_result?;
    Ok(())
}

async fn flatten<T>(handle: tokio::task::JoinHandle<Result<T>>) -> Result<Result<T>> {
    handle
        .await
        .map_err(|e| PipelineError::Join(e.to_string()))
}

/// Reads the dump, textifies each entity, and forwards `(entity_id, text)`
/// pairs onto `tx`. A parse error on a single line is recoverable and does
/// not stop the stage; any other reader error (e.g. the file could not be
/// opened) is fatal to the whole pipeline.
async fn reader_stage(
    dump_path: PathBuf,
    labels: Arc<LabelStore>,
    textify_config: TextifyConfig,
    tx: mpsc::Sender<EmbedItem>,
    stats: Arc<PipelineStats>,
) -> Result<()> {
    let mut rx = DumpReader::new(dump_path).spawn();
    let textifier = Textifier::with_config(labels.as_ref(), textify_config);

    while let Some(item) = rx.recv().await {
        let entity = match item {
            Ok(entity) => entity,
            Err(CoreError::Parse { line, source }) => {
                let truncated: String = line.chars().take(200).collect();
                warn!(error = %source, line = %truncated, "skipping unparsable dump line");
                PipelineStats::incr(&stats.parse_errors, 1);
                continue;
            }
            Err(other) => return Err(other.into()),
        };

        PipelineStats::incr(&stats.entities_read, 1);
        let sentences = textifier.textify(&entity);
        PipelineStats::incr(&stats.sentences_produced, sentences.len() as u64);

        for pair in sentences {
            if tx.send(pair).await.is_err() {
                // Downstream stage shut down early; stop feeding it.
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Accumulates `(id, text)` pairs into batches of `batch_size`, embeds each
/// batch, and forwards `(ids, texts, vectors)` onto `tx`. A failed embed
/// call drops that batch and continues (§7 "Model" error: persistent ->
/// failed batch, pipeline remains live).
async fn embedder_stage(
    mut rx: mpsc::Receiver<EmbedItem>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    tx: mpsc::Sender<InsertItem>,
    stats: Arc<PipelineStats>,
) -> Result<()> {
    let mut ids = Vec::with_capacity(batch_size);
    let mut texts = Vec::with_capacity(batch_size);

    while let Some((id, text)) = rx.recv().await {
        ids.push(id);
        texts.push(text);

        if ids.len() >= batch_size {
            if !embed_and_forward(&embedder, &mut ids, &mut texts, &tx, &stats).await? {
                return Ok(());
            }
        }
    }

    if !ids.is_empty() {
        embed_and_forward(&embedder, &mut ids, &mut texts, &tx, &stats).await?;
    }
    Ok(())
}

/// Embeds the current batch and sends it downstream, clearing both buffers
/// regardless of outcome. Returns `Ok(false)` if the downstream receiver
/// has gone away, signalling the caller to stop.
async fn embed_and_forward(
    embedder: &Arc<dyn EmbeddingProvider>,
    ids: &mut Vec<String>,
    texts: &mut Vec<String>,
    tx: &mpsc::Sender<InsertItem>,
    stats: &Arc<PipelineStats>,
) -> Result<bool> {
    let batch_ids = std::mem::take(ids);
    let batch_texts = std::mem::take(texts);
    let batch_size = batch_texts.len();

    match embedder.embed_documents(batch_texts.clone(), batch_size).await {
        Ok(vectors) => {
            PipelineStats::incr(&stats.batches_embedded, 1);
            debug!(batch_size, "embedded batch");
            Ok(tx.send((batch_ids, batch_texts, vectors)).await.is_ok())
        }
        Err(err) => {
            warn!(error = %err, batch_size, "embedding batch failed, dropping batch");
            PipelineStats::incr(&stats.embed_errors, 1);
            Ok(true)
        }
    }
}

/// Drains `(ids, texts, vectors)` tuples and inserts them into the vector
/// store. A dimension mismatch is an invariant violation (§7 "Invariant")
/// and aborts the pipeline; any other store error is logged and the batch
/// is dropped.
async fn inserter_stage(
    mut rx: mpsc::Receiver<InsertItem>,
    sink: Arc<dyn ChunkSink>,
    stats: Arc<PipelineStats>,
) -> Result<()> {
    while let Some((ids, texts, vectors)) = rx.recv().await {
        let chunks: Vec<Chunk> = ids
            .into_iter()
            .zip(texts)
            .map(|(qid, text)| Chunk { qid, text })
            .collect();
        let count = chunks.len();

        match sink.insert_many(&chunks, &vectors).await {
            Ok(()) => {
                PipelineStats::incr(&stats.rows_inserted, count as u64);
                info!(rows = count, "inserted chunk batch");
            }
            Err(err @ SearchError::DimensionMismatch { .. }) => {
                return Err(err.into());
            }
            Err(err) => {
                warn!(error = %err, rows = count, "insert batch failed, dropping batch");
                PipelineStats::incr(&stats.insert_errors, 1);
            }
        }
    }
    Ok(())
}
