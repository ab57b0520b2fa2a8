//! Streaming reader for the Wikidata-style NDJSON-in-an-array dump format.
//!
//! The file's logical content is a JSON array, but physically it is one
//! object per line so it can be streamed without ever materializing the
//! whole array. See § DumpReader contract.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::model::Entity;

/// Default large-read size, chosen to amortize syscall cost over a
/// multi-gigabyte file.
pub const DEFAULT_CHUNK_BYTES: usize = 1 << 30;

/// Number of lines decoded together on a blocking task before being
/// forwarded to the channel, preserving file order while keeping JSON
/// decoding off the async reactor.
const DECODE_BATCH_LINES: usize = 256;

/// Streams entities out of a dump file in file order.
pub struct DumpReader {
    path: PathBuf,
    chunk_bytes: usize,
}

impl DumpReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }

    /// Override the buffered-read chunk size (bytes).
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Spawn a background task that reads and decodes the dump, returning a
    /// channel of results in file order. A `Parse` error carries the
    /// offending line and does not stop the stream; only an `Io` error (the
    /// file could not be opened/read) terminates it.
    pub fn spawn(self) -> mpsc::Receiver<Result<Entity, CoreError>> {
        let (tx, rx) = mpsc::channel(DECODE_BATCH_LINES * 4);
        tokio::spawn(async move {
            if let Err(err) = self.run(&tx).await {
                let _ = tx.send(Err(err)).await;
            }
        });
        rx
    }

    async fn run(&self, tx: &mpsc::Sender<Result<Entity, CoreError>>) -> Result<(), CoreError> {
        let file = tokio::fs::File::open(&self.path).await?;
        let mut reader = BufReader::with_capacity(self.chunk_bytes, file);
        let mut batch = Vec::with_capacity(DECODE_BATCH_LINES);
        let mut buf = String::new();

        loop {
            buf.clear();
            let bytes_read = reader.read_line(&mut buf).await?;
            if bytes_read == 0 {
                break;
            }
            let trimmed = buf.trim_end_matches(['\n', '\r']);
            if trimmed == "[" || trimmed == "]" {
                continue;
            }
            batch.push(strip_trailing_comma(trimmed).to_string());
            if batch.len() >= DECODE_BATCH_LINES {
                decode_and_send(std::mem::take(&mut batch), tx).await?;
            }
        }

        if !batch.is_empty() {
            decode_and_send(batch, tx).await?;
        }
        Ok(())
    }
}

fn strip_trailing_comma(line: &str) -> &str {
    line.strip_suffix(',').unwrap_or(line)
}

async fn decode_and_send(
    lines: Vec<String>,
    tx: &mpsc::Sender<Result<Entity, CoreError>>,
) -> Result<(), CoreError> {
    let decoded = tokio::task::spawn_blocking(move || {
        lines
            .into_iter()
            .map(|line| Entity::from_json_line(&line))
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| CoreError::Join(e.to_string()))?;

    for item in decoded {
        // Receiver gone (consumer shut down early): stop feeding it.
        if tx.send(item).await.is_err() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn collect(path: &Path) -> Vec<Result<Entity, CoreError>> {
        let mut rx = DumpReader::new(path).spawn();
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn skips_brackets_and_strips_trailing_comma() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[").unwrap();
        writeln!(file, r#"{{"id": "Q1", "type": "item"}},"#).unwrap();
        writeln!(file, r#"{{"id": "Q2", "type": "item"}}"#).unwrap();
        writeln!(file, "]").unwrap();
        file.flush().unwrap();

        let results = collect(file.path()).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().id, "Q1");
        assert_eq!(results[1].as_ref().unwrap().id, "Q2");
    }

    #[tokio::test]
    async fn recoverable_parse_error_does_not_stop_the_stream() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[").unwrap();
        writeln!(file, "not valid json,").unwrap();
        writeln!(file, r#"{{"id": "Q2", "type": "item"}}"#).unwrap();
        writeln!(file, "]").unwrap();
        file.flush().unwrap();

        let results = collect(file.path()).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap().id, "Q2");
    }
}
