//! Deterministic stand-ins for the external collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::progress::{IngestionProgress, ProgressReporter};
use super::store::{ScoredSegment, VectorIndex};
use super::types::Segment;
use crate::core::errors::RagError;
use crate::llm::{ChatModel, Embedder};

/// Letter-frequency embedder: similar texts get similar vectors.
#[derive(Default)]
pub struct StubEmbedder {
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
    delay: Option<Duration>,
}

impl StubEmbedder {
    /// Fails the `n`-th call (1-based) and every call after it.
    pub fn failing_from(n: usize) -> Self {
        Self {
            fail_on_call: Some(n),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; 27];
        for c in text.chars().flat_map(char::to_lowercase) {
            let slot = if c.is_ascii_lowercase() {
                (c as u8 - b'a') as usize
            } else {
                26
            };
            vector[slot] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on_call.is_some_and(|n| call >= n) {
            return Err(RagError::downstream("embedding", "stub embedder failure"));
        }
        Ok(Self::vector_for(text))
    }
}

/// In-memory index scoring by cosine relevance, like the sqlite backend.
#[derive(Default)]
pub struct MemoryIndex {
    entries: Mutex<Vec<(Segment, Vec<f32>)>>,
}

impl MemoryIndex {
    pub fn segments(&self) -> Vec<Segment> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(segment, _)| segment.clone())
            .collect()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn add(&self, segment: &Segment, embedding: &[f32]) -> Result<(), RagError> {
        self.entries
            .lock()
            .unwrap()
            .push((segment.clone(), embedding.to_vec()));
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredSegment>, RagError> {
        let mut scored: Vec<ScoredSegment> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(segment, embedding)| ScoredSegment {
                segment: segment.clone(),
                score: relevance(query, embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self, document_id: Option<&str>) -> Result<usize, RagError> {
        let entries = self.entries.lock().unwrap();
        Ok(match document_id {
            Some(id) => entries
                .iter()
                .filter(|(segment, _)| segment.source_document_id == id)
                .count(),
            None => entries.len(),
        })
    }
}

fn relevance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt() * b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return 0.5;
    }
    ((dot / norm) as f64 + 1.0) / 2.0
}

/// Returns a fixed, pre-ranked match list regardless of the query.
pub struct FixedIndex {
    matches: Vec<ScoredSegment>,
}

impl FixedIndex {
    pub fn new(scored_texts: &[(&str, f64)]) -> Self {
        let matches = scored_texts
            .iter()
            .enumerate()
            .map(|(ordinal, (text, score))| ScoredSegment {
                segment: Segment {
                    source_document_id: "fixed".to_string(),
                    ordinal,
                    start_offset: 0,
                    text: text.to_string(),
                },
                score: *score,
            })
            .collect();
        Self { matches }
    }
}

#[async_trait]
impl VectorIndex for FixedIndex {
    async fn add(&self, _segment: &Segment, _embedding: &[f32]) -> Result<(), RagError> {
        Err(RagError::storage("fixed index is read-only"))
    }

    async fn search(&self, _query: &[f32], k: usize) -> Result<Vec<ScoredSegment>, RagError> {
        Ok(self.matches.iter().take(k).cloned().collect())
    }

    async fn count(&self, _document_id: Option<&str>) -> Result<usize, RagError> {
        Ok(self.matches.len())
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<IngestionProgress>>,
    always_fail: bool,
}

impl RecordingReporter {
    /// Records events but reports every publish as failed.
    pub fn unreachable() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<IngestionProgress> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressReporter for RecordingReporter {
    async fn publish(&self, event: &IngestionProgress) -> Result<(), RagError> {
        self.events.lock().unwrap().push(event.clone());
        if self.always_fail {
            return Err(RagError::downstream("progress publish", "subscriber unreachable"));
        }
        Ok(())
    }
}

/// Chat model that replies with a fixed text and records prompts.
pub struct ScriptedChat {
    reply: Result<String, String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(reply: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::replying(reply)
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .map_err(|message| RagError::downstream("chat completion", message))
    }
}
