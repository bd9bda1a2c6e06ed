//! VectorIndex trait: abstract interface for similarity-search backends.
//!
//! The primary implementation is `SqliteVectorIndex` in the `sqlite` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::{RetrievedMatch, Segment};
use crate::core::errors::RagError;

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredSegment {
    pub segment: Segment,
    /// Relevance in [0, 1] (higher = better).
    pub score: f64,
}

impl From<ScoredSegment> for RetrievedMatch {
    fn from(scored: ScoredSegment) -> Self {
        RetrievedMatch {
            segment_text: scored.segment.text,
            similarity_score: scored.score,
        }
    }
}

/// Stores (embedding, segment) pairs and answers nearest-neighbour queries.
///
/// Implementations must tolerate concurrent writers. Entries are only ever
/// appended.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert a segment with its embedding vector.
    async fn add(&self, segment: &Segment, embedding: &[f32]) -> Result<(), RagError>;

    /// Up to `k` segments ordered by descending score. Matches below the
    /// index's relevance floor are dropped; an empty index yields no matches.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredSegment>, RagError>;

    /// Number of stored segments, optionally for one document.
    async fn count(&self, document_id: Option<&str>) -> Result<usize, RagError>;
}
