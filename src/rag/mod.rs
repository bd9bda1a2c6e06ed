//! RAG (Retrieval-Augmented Generation) module.
//!
//! This module provides:
//! - `IngestionPipeline`: parse → split → embed → index for one upload, with progress events
//! - `Retriever`: top-k similarity lookup for a question
//! - `AnswerComposer`: grounded prompt, model call, sources and confidence
//! - `SqliteVectorIndex`: the default `VectorIndex` backend

pub mod composer;
mod legacy_doc;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod retriever;
pub mod segmenter;
pub mod sqlite;
pub mod storage;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use composer::AnswerComposer;
pub use parser::DocumentFormat;
pub use pipeline::IngestionPipeline;
pub use progress::{IngestionPhase, IngestionProgress, ProgressHub, ProgressReporter};
pub use retriever::Retriever;
pub use segmenter::{Segmenter, SegmenterConfig};
pub use sqlite::SqliteVectorIndex;
pub use storage::DocumentStorage;
pub use store::{ScoredSegment, VectorIndex};
pub use types::{Answer, Document, IngestionSummary, Question, RetrievedMatch, Segment};
