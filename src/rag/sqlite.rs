//! SQLite-backed vector index.
//!
//! In-process store using SQLite for segment rows and
//! brute-force cosine similarity for search.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ScoredSegment, VectorIndex};
use super::types::Segment;
use crate::core::config::AppPaths;
use crate::core::errors::RagError;

pub struct SqliteVectorIndex {
    pool: SqlitePool,
    min_score: f64,
}

impl SqliteVectorIndex {
    pub async fn new(paths: &AppPaths, min_score: f64) -> Result<Self, RagError> {
        Self::with_path(paths.index_db_path.clone(), min_score).await
    }

    pub async fn with_path(db_path: PathBuf, min_score: f64) -> Result<Self, RagError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(RagError::storage)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::storage)?;

        let index = Self { pool, min_score };
        index.init_schema().await?;
        tracing::info!("Vector index opened at {}", db_path.display());
        Ok(index)
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_segments (
                segment_id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                ordinal INTEGER NOT NULL,
                start_offset INTEGER NOT NULL DEFAULT 0,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_rag_segments_document ON rag_segments(document_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    /// Maps cosine in [-1, 1] onto relevance in [0, 1].
    fn relevance(cosine: f32) -> f64 {
        ((cosine as f64 + 1.0) / 2.0).clamp(0.0, 1.0)
    }

    fn row_to_segment(row: &sqlx::sqlite::SqliteRow) -> Segment {
        let ordinal: i64 = row.get("ordinal");
        let start_offset: i64 = row.get("start_offset");
        Segment {
            source_document_id: row.get("document_id"),
            ordinal: ordinal.max(0) as usize,
            start_offset: start_offset.max(0) as usize,
            text: row.get("content"),
        }
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn add(&self, segment: &Segment, embedding: &[f32]) -> Result<(), RagError> {
        if embedding.is_empty() {
            return Err(RagError::InvalidInput(
                "cannot index a segment with an empty embedding".to_string(),
            ));
        }

        let segment_id = format!("{}:{}", segment.source_document_id, segment.ordinal);
        let blob = Self::serialize_embedding(embedding);

        sqlx::query(
            "INSERT INTO rag_segments (segment_id, document_id, ordinal, start_offset, content, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&segment_id)
        .bind(&segment.source_document_id)
        .bind(segment.ordinal as i64)
        .bind(segment.start_offset as i64)
        .bind(&segment.text)
        .bind(&blob)
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredSegment>, RagError> {
        if k == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT document_id, ordinal, start_offset, content, embedding
             FROM rag_segments",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        let mut scored: Vec<ScoredSegment> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let stored = Self::deserialize_embedding(&embedding_bytes);
                if stored.len() != query.len() {
                    return None;
                }
                let score = Self::relevance(Self::cosine_similarity(query, &stored));
                if score < self.min_score {
                    return None;
                }

                Some(ScoredSegment {
                    segment: Self::row_to_segment(row),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn count(&self, document_id: Option<&str>) -> Result<usize, RagError> {
        let count: i64 = if let Some(document_id) = document_id {
            sqlx::query_scalar("SELECT COUNT(*) FROM rag_segments WHERE document_id = ?1")
                .bind(document_id)
                .fetch_one(&self.pool)
                .await
                .map_err(RagError::storage)?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM rag_segments")
                .fetch_one(&self.pool)
                .await
                .map_err(RagError::storage)?
        };

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_index(min_score: f64) -> (tempfile::TempDir, SqliteVectorIndex) {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteVectorIndex::with_path(dir.path().join("index.db"), min_score)
            .await
            .unwrap();
        (dir, index)
    }

    fn segment(document_id: &str, ordinal: usize, text: &str) -> Segment {
        Segment {
            source_document_id: document_id.to_string(),
            ordinal,
            start_offset: ordinal * 450,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn add_and_search_ranks_by_similarity() {
        let (_dir, index) = test_index(0.0).await;

        index
            .add(&segment("d1", 0, "about cats"), &[1.0, 0.0, 0.0])
            .await
            .unwrap();
        index
            .add(&segment("d1", 1, "about dogs"), &[0.0, 1.0, 0.0])
            .await
            .unwrap();
        index
            .add(&segment("d2", 0, "about both"), &[0.7, 0.7, 0.0])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].segment.text, "about cats");
        assert!(results[0].score > 0.99);
        assert_eq!(results[1].segment.text, "about both");
        assert!(results[0].score >= results[1].score);
        assert_eq!(results[0].segment.start_offset, 0);
    }

    #[tokio::test]
    async fn empty_index_returns_no_matches() {
        let (_dir, index) = test_index(0.0).await;
        assert!(index.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
        assert_eq!(index.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn relevance_floor_drops_weak_matches() {
        let (_dir, index) = test_index(0.8).await;

        index.add(&segment("d", 0, "same"), &[1.0, 0.0]).await.unwrap();
        index
            .add(&segment("d", 1, "orthogonal"), &[0.0, 1.0])
            .await
            .unwrap();
        index
            .add(&segment("d", 2, "opposite"), &[-1.0, 0.0])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].segment.text, "same");
    }

    #[tokio::test]
    async fn scores_stay_within_unit_interval() {
        let (_dir, index) = test_index(0.0).await;
        index
            .add(&segment("d", 0, "opposite"), &[-1.0, 0.0])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score.abs() < 1e-6);
    }

    #[tokio::test]
    async fn count_filters_by_document() {
        let (_dir, index) = test_index(0.0).await;
        index.add(&segment("a", 0, "x"), &[1.0]).await.unwrap();
        index.add(&segment("a", 1, "y"), &[1.0]).await.unwrap();
        index.add(&segment("b", 0, "z"), &[1.0]).await.unwrap();

        assert_eq!(index.count(None).await.unwrap(), 3);
        assert_eq!(index.count(Some("a")).await.unwrap(), 2);
        assert_eq!(index.count(Some("missing")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn index_is_append_only() {
        let (_dir, index) = test_index(0.0).await;
        let seg = segment("a", 0, "x");
        index.add(&seg, &[1.0]).await.unwrap();

        let err = index.add(&seg, &[1.0]).await.unwrap_err();
        assert!(matches!(err, RagError::Storage(_)));
        assert_eq!(index.count(None).await.unwrap(), 1);
    }
}
