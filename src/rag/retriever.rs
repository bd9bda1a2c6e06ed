use std::sync::Arc;
use std::time::Duration;

use super::store::VectorIndex;
use super::types::RetrievedMatch;
use crate::core::errors::RagError;
use crate::llm::{bounded, Embedder};

/// Embeds a question once and looks up its nearest segments.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    call_timeout: Duration,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            index,
            call_timeout,
        }
    }

    /// Up to `k` matches, best first. No data is an empty result, not an error.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedMatch>, RagError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = bounded(
            "embedding",
            self.call_timeout,
            self.embedder.embed(question),
        )
        .await?;

        let mut scored = bounded(
            "vector search",
            self.call_timeout,
            self.index.search(&query, k),
        )
        .await?;

        // Backends promise descending order; enforce it for the composer.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        tracing::debug!("Retrieved {} matches (k = {})", scored.len(), k);
        Ok(scored.into_iter().map(RetrievedMatch::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::test_support::{FixedIndex, MemoryIndex, StubEmbedder};
    use crate::rag::types::Segment;

    fn segment(ordinal: usize, text: &str) -> Segment {
        Segment {
            source_document_id: "doc".to_string(),
            ordinal,
            start_offset: 0,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn returns_most_similar_segments_first() {
        let index = Arc::new(MemoryIndex::default());
        for (i, text) in ["zzzz zzzz", "vacation days", "vacation policy days"]
            .iter()
            .enumerate()
        {
            index
                .add(&segment(i, text), &StubEmbedder::vector_for(text))
                .await
                .unwrap();
        }
        let retriever = Retriever::new(
            Arc::new(StubEmbedder::default()),
            index,
            Duration::from_secs(5),
        );

        let matches = retriever.retrieve("vacation days", 2).await.unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].segment_text, "vacation days");
        assert!(matches[0].similarity_score >= matches[1].similarity_score);
    }

    #[tokio::test]
    async fn empty_index_yields_empty_result() {
        let embedder = Arc::new(StubEmbedder::default());
        let retriever = Retriever::new(
            embedder.clone(),
            Arc::new(MemoryIndex::default()),
            Duration::from_secs(5),
        );

        assert!(retriever.retrieve("anything", 5).await.unwrap().is_empty());
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn unordered_backend_results_are_sorted() {
        let index = Arc::new(FixedIndex::new(&[("low", 0.2), ("high", 0.9), ("mid", 0.5)]));
        let retriever = Retriever::new(
            Arc::new(StubEmbedder::default()),
            index,
            Duration::from_secs(5),
        );

        let scores: Vec<f64> = retriever
            .retrieve("q", 3)
            .await
            .unwrap()
            .iter()
            .map(|m| m.similarity_score)
            .collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    }

    #[tokio::test]
    async fn zero_k_skips_embedding() {
        let embedder = Arc::new(StubEmbedder::default());
        let retriever = Retriever::new(
            embedder.clone(),
            Arc::new(MemoryIndex::default()),
            Duration::from_secs(5),
        );

        assert!(retriever.retrieve("q", 0).await.unwrap().is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let retriever = Retriever::new(
            Arc::new(StubEmbedder::failing_from(1)),
            Arc::new(MemoryIndex::default()),
            Duration::from_secs(5),
        );

        let err = retriever.retrieve("q", 5).await.unwrap_err();
        assert!(matches!(err, RagError::DownstreamFailure { .. }));
    }
}
