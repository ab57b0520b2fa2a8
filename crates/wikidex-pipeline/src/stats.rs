//! Atomic progress counters for the ingestion pipeline (§4.7 addition).
//!
//! Grounded in `original_source/wddump_textify.py`'s ad hoc `print(...)`
//! timing output and this crate's own `indicatif`-based progress bars
//! (`wikidex-cli/src/progress.rs`): replaces print-based timing with
//! lock-free counters a caller can poll to render a progress bar without
//! coupling the pipeline to any particular UI.

use std::sync::atomic::{AtomicU64, Ordering};

/// A live snapshot of pipeline progress, safe to share across the reader,
/// embedder and inserter stages.
#[derive(Default)]
pub struct PipelineStats {
    pub entities_read: AtomicU64,
    pub parse_errors: AtomicU64,
    pub sentences_produced: AtomicU64,
    pub batches_embedded: AtomicU64,
    pub embed_errors: AtomicU64,
    pub rows_inserted: AtomicU64,
    pub insert_errors: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            entities_read: self.entities_read.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            sentences_produced: self.sentences_produced.load(Ordering::Relaxed),
            batches_embedded: self.batches_embedded.load(Ordering::Relaxed),
            embed_errors: self.embed_errors.load(Ordering::Relaxed),
            rows_inserted: self.rows_inserted.load(Ordering::Relaxed),
            insert_errors: self.insert_errors.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// A point-in-time copy of [`PipelineStats`], cheap to pass to a progress
/// bar renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub entities_read: u64,
    pub parse_errors: u64,
    pub sentences_produced: u64,
    pub batches_embedded: u64,
    pub embed_errors: u64,
    pub rows_inserted: u64,
    pub insert_errors: u64,
}
