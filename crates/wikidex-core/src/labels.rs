//! Persistent label/description side index, built once from a dump and
//! read-only thereafter. See § LabelStore contract.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lru::LruCache;
use rusqlite::{params, Connection, OptionalExtension};

use crate::dump::DumpReader;
use crate::error::{CoreError, Result};

/// Labels longer than this are dropped (with a warning) rather than
/// truncated, per the source's silent-truncation behavior turned into an
/// explicit, logged drop.
pub const MAX_LABEL_LEN: usize = 128;
/// Descriptions longer than this are dropped (with a warning).
pub const MAX_DESC_LEN: usize = 1024;

/// Rows are committed in batches of this size to bound write amplification
/// during the single-pass build.
const COMMIT_BATCH_SIZE: usize = 1024 * 1024;

/// Counters describing a `LabelStore::build` run.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildStats {
    pub lines_read: u64,
    pub inserted: u64,
    pub parse_errors: u64,
    pub missing_label: u64,
    pub missing_desc: u64,
    pub dropped_too_long: u64,
}

/// A read-by-id, append-only-at-build-time store of `(id, label_en,
/// desc_en)` records, backed by SQLite.
pub struct LabelStore {
    conn: Arc<Mutex<Connection>>,
}

impl LabelStore {
    /// Open (creating if absent) a label store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entities (
                id       TEXT PRIMARY KEY,
                label_en TEXT NOT NULL,
                desc_en  TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory label store, useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Single-pass build from a dump: reads every entity, keeps the ones
    /// with both an English label and description under the length caps,
    /// and commits in batches.
    pub async fn build(&self, dump_path: impl Into<PathBuf>) -> Result<BuildStats> {
        let mut rx = DumpReader::new(dump_path).spawn();
        let mut stats = BuildStats::default();
        let mut batch = Vec::with_capacity(COMMIT_BATCH_SIZE.min(8192));

        while let Some(item) = rx.recv().await {
            stats.lines_read += 1;
            let entity = match item {
                Ok(entity) => entity,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unparsable dump line during label build");
                    stats.parse_errors += 1;
                    continue;
                }
            };

            let Some(label) = entity.labels.get("en") else {
                stats.missing_label += 1;
                continue;
            };
            let Some(desc) = entity.descriptions.get("en") else {
                stats.missing_desc += 1;
                continue;
            };
            if label.len() > MAX_LABEL_LEN || desc.len() > MAX_DESC_LEN {
                tracing::warn!(id = %entity.id, "dropping label record exceeding length cap");
                stats.dropped_too_long += 1;
                continue;
            }

            batch.push((entity.id.clone(), label.clone(), desc.clone()));
            stats.inserted += 1;
            if batch.len() >= COMMIT_BATCH_SIZE {
                self.insert_batch(std::mem::take(&mut batch)).await?;
            }
        }

        if !batch.is_empty() {
            self.insert_batch(batch).await?;
        }
        Ok(stats)
    }

    async fn insert_batch(&self, rows: Vec<(String, String, String)>) -> Result<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = conn.lock().expect("label store mutex poisoned");
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO entities (id, label_en, desc_en) VALUES (?1, ?2, ?3)",
                )?;
                for (id, label, desc) in rows {
                    stmt.execute(params![id, label, desc])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| CoreError::Join(e.to_string()))?
    }

    pub fn get_label(&self, id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("label store mutex poisoned");
        conn.query_row(
            "SELECT label_en FROM entities WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(CoreError::from)
    }

    pub fn get_description(&self, id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("label store mutex poisoned");
        conn.query_row(
            "SELECT desc_en FROM entities WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(CoreError::from)
    }

    /// Number of records currently stored, for status reporting.
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().expect("label store mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// A bounded LRU cache in front of a [`LabelStore`], for callers doing
/// repeated point lookups against a cold disk-backed store (e.g. an
/// interactive `ask` session). Off by default — see SPEC_FULL.md §10.5.
pub struct CachedLabelStore {
    inner: LabelStore,
    labels: Mutex<LruCache<String, Option<String>>>,
    descriptions: Mutex<LruCache<String, Option<String>>>,
}

impl CachedLabelStore {
    pub fn new(inner: LabelStore, capacity: std::num::NonZeroUsize) -> Self {
        Self {
            inner,
            labels: Mutex::new(LruCache::new(capacity)),
            descriptions: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get_label(&self, id: &str) -> Result<Option<String>> {
        if let Some(hit) = self.labels.lock().expect("cache mutex poisoned").get(id) {
            return Ok(hit.clone());
        }
        let value = self.inner.get_label(id)?;
        self.labels
            .lock()
            .expect("cache mutex poisoned")
            .put(id.to_string(), value.clone());
        Ok(value)
    }

    pub fn get_description(&self, id: &str) -> Result<Option<String>> {
        if let Some(hit) = self
            .descriptions
            .lock()
            .expect("cache mutex poisoned")
            .get(id)
        {
            return Ok(hit.clone());
        }
        let value = self.inner.get_description(id)?;
        self.descriptions
            .lock()
            .expect("cache mutex poisoned")
            .put(id.to_string(), value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_dump(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[").unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        writeln!(file, "]").unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn build_skips_records_missing_en_label_or_desc() {
        let store = LabelStore::open_in_memory().unwrap();
        let dump = write_dump(&[
            r#"{"id": "Q1", "type": "item", "labels": {"en": {"language":"en","value":"Berlin"}}, "descriptions": {"en": {"language":"en","value":"capital of Germany"}}},"#,
            r#"{"id": "Q2", "type": "item", "labels": {}, "descriptions": {"en": {"language":"en","value":"no label"}}}"#,
        ]);
        let stats = store.build(dump.path()).await.unwrap();
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.missing_label, 1);
        assert_eq!(store.get_label("Q1").unwrap().as_deref(), Some("Berlin"));
        assert_eq!(store.get_label("Q2").unwrap(), None);
    }

    #[tokio::test]
    async fn build_drops_records_over_length_caps() {
        let store = LabelStore::open_in_memory().unwrap();
        let long_desc = "x".repeat(MAX_DESC_LEN + 1);
        let dump = write_dump(&[&format!(
            r#"{{"id": "Q1", "type": "item", "labels": {{"en": {{"language":"en","value":"Berlin"}}}}, "descriptions": {{"en": {{"language":"en","value":"{long_desc}"}}}}}}"#
        )]);
        let stats = store.build(dump.path()).await.unwrap();
        assert_eq!(stats.dropped_too_long, 1);
        assert_eq!(store.get_label("Q1").unwrap(), None);
    }

    #[test]
    fn cache_serves_repeated_lookups() {
        let store = LabelStore::open_in_memory().unwrap();
        let cached = CachedLabelStore::new(store, std::num::NonZeroUsize::new(4).unwrap());
        assert_eq!(cached.get_label("Q404").unwrap(), None);
        assert_eq!(cached.get_label("Q404").unwrap(), None);
    }
}
