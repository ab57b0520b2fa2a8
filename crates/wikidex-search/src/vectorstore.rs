//! Postgres/pgvector-backed vector store for textified entity chunks.
//!
//! The wire schema is a single relational table rather than a point/payload
//! collection: `chunks(id serial pk, qid char(16), text text, embedding
//! vector(D))`, with an ANN index over `embedding`. Distance is computed
//! with pgvector's `<->` (L2) or `<=>` (cosine) operator depending on
//! configuration, and callers filter by a distance threshold client-side.

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Executor, Row};
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::schema::{Chunk, SearchHit};

/// Which pgvector distance operator the ANN index and queries use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    /// `<=>` cosine distance.
    Cosine,
    /// `<->` Euclidean (L2) distance, as the original pgvecto.rs-backed store used.
    Euclidean,
}

impl DistanceMetric {
    fn operator(self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::Euclidean => "<->",
        }
    }

    fn index_ops(self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "vector_cosine_ops",
            DistanceMetric::Euclidean => "vector_l2_ops",
        }
    }
}

/// Configuration for connecting to the vector store.
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Postgres connection string (DSN).
    pub connection_string: String,
    /// Fixed vector dimension `D`.
    pub dimension: usize,
    /// Distance metric for the ANN index.
    pub metric: DistanceMetric,
    /// Max pool connections.
    pub max_connections: u32,
}

impl VectorStoreConfig {
    pub fn new(connection_string: impl Into<String>, dimension: usize) -> Self {
        Self {
            connection_string: connection_string.into(),
            dimension,
            metric: DistanceMetric::Cosine,
            max_connections: 5,
        }
    }
}

/// Postgres + pgvector vector store for the `chunks` table.
pub struct VectorStore {
    pool: sqlx::PgPool,
    dimension: usize,
    metric: DistanceMetric,
}

impl VectorStore {
    /// Connect to Postgres and verify liveness with a trivial query.
    pub async fn connect(config: VectorStoreConfig) -> Result<Self> {
        info!("connecting to vector store");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string)
            .await
            .map_err(SearchError::Store)?;

        pool.execute("SELECT 1").await.map_err(SearchError::Store)?;

        info!("connected to vector store");

        Ok(Self {
            pool,
            dimension: config.dimension,
            metric: config.metric,
        })
    }

    /// Idempotently create the `vector` extension, the `chunks` table, and
    /// its ANN index. Safe to call on every startup: a repeat call with the
    /// same dimension is a no-op, but a dimension that disagrees with an
    /// existing `chunks.embedding` column is refused rather than silently
    /// accepted, since `CREATE TABLE IF NOT EXISTS` alone would ignore it.
    pub async fn init(&self) -> Result<()> {
        self.pool
            .execute("CREATE EXTENSION IF NOT EXISTS vector")
            .await
            .map_err(|e| SearchError::StoreInit(e.to_string()))?;

        if let Some(existing_dim) = self.existing_dimension().await? {
            if existing_dim != self.dimension {
                return Err(SearchError::StoreInit(format!(
                    "chunks.embedding is already dimension {existing_dim}, cannot reinitialize as {}",
                    self.dimension
                )));
            }
            debug!("vector store schema already present (dim={})", self.dimension);
            return Ok(());
        }

        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS chunks (
                id BIGSERIAL PRIMARY KEY,
                qid CHAR(16) NOT NULL,
                text TEXT NOT NULL,
                embedding vector({dim}) NOT NULL
            )",
            dim = self.dimension
        );
        self.pool
            .execute(create_table.as_str())
            .await
            .map_err(|e| SearchError::StoreInit(e.to_string()))?;

        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS chunks_embedding_idx ON chunks
             USING ivfflat (embedding {ops}) WITH (lists = 100)",
            ops = self.metric.index_ops()
        );
        self.pool
            .execute(create_index.as_str())
            .await
            .map_err(|e| SearchError::StoreInit(e.to_string()))?;

        debug!("vector store schema ready (dim={})", self.dimension);
        Ok(())
    }

    /// The `vector(D)` dimension already recorded on `chunks.embedding`, if
    /// the table exists. pgvector stores `D` as the column's `atttypmod`.
    async fn existing_dimension(&self) -> Result<Option<usize>> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT atttypmod FROM pg_attribute
             WHERE attrelid = to_regclass('chunks') AND attname = 'embedding' AND attnum > 0",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SearchError::StoreInit(e.to_string()))?;

        Ok(row.map(|(typmod,)| typmod as usize))
    }

    /// Insert a batch of chunks with their embeddings, atomically. Every
    /// embedding must match the store's configured dimension.
    pub async fn insert_many(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::InvalidConfig(format!(
                "chunk count {} does not match embedding count {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        if chunks.is_empty() {
            return Ok(());
        }

        for embedding in embeddings {
            if embedding.len() != self.dimension {
                return Err(SearchError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        let mut tx = self.pool.begin().await.map_err(SearchError::Store)?;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let vector = pgvector::Vector::from(embedding.clone());
            sqlx::query("INSERT INTO chunks (qid, text, embedding) VALUES ($1, $2, $3)")
                .bind(&chunk.qid)
                .bind(&chunk.text)
                .bind(vector)
                .execute(&mut *tx)
                .await
                .map_err(SearchError::Store)?;
        }
        tx.commit().await.map_err(SearchError::Store)?;

        debug!("inserted {} chunks", chunks.len());
        Ok(())
    }

    /// Approximate nearest-neighbor search: return the `k` closest chunks
    /// to `query`, sorted ascending by distance, filtered to `distance <
    /// threshold` when a threshold is given.
    pub async fn ann(
        &self,
        query: &[f32],
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let vector = pgvector::Vector::from(query.to_vec());
        let op = self.metric.operator();
        let sql = format!(
            "SELECT id, qid, text, embedding {op} $1 AS distance
             FROM chunks
             ORDER BY embedding {op} $1
             LIMIT $2"
        );

        let rows = sqlx::query(sql.as_str())
            .bind(vector)
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(SearchError::Store)?;

        let hits: Vec<SearchHit> = rows
            .into_iter()
            .map(row_to_hit)
            .collect::<Result<Vec<_>>>()?;

        Ok(match threshold {
            Some(t) => hits.into_iter().filter(|h| h.distance < t).collect(),
            None => hits,
        })
    }

    /// Number of rows currently committed to `chunks`, for status reporting.
    pub async fn count_rows(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(SearchError::Store)?;
        Ok(count as u64)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn row_to_hit(row: PgRow) -> Result<SearchHit> {
    let distance: f64 = row.try_get("distance").map_err(SearchError::Store)?;
    Ok(SearchHit {
        id: row.try_get("id").map_err(SearchError::Store)?,
        qid: row.try_get("qid").map_err(SearchError::Store)?,
        text: row.try_get("text").map_err(SearchError::Store)?,
        distance: distance as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_metric_operators() {
        assert_eq!(DistanceMetric::Cosine.operator(), "<=>");
        assert_eq!(DistanceMetric::Euclidean.operator(), "<->");
    }

    #[test]
    fn config_defaults_to_cosine() {
        let config = VectorStoreConfig::new("postgres://localhost/wikidex", 384);
        assert_eq!(config.metric, DistanceMetric::Cosine);
        assert_eq!(config.dimension, 384);
    }
}
