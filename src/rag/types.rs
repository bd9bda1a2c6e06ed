//! Data types shared across the ingestion and question-answering paths.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// An uploaded file after it has been written to durable storage.
///
/// Identity is `id`; filenames are not unique across uploads.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub byte_size: u64,
    pub stored_path: PathBuf,
}

/// A bounded slice of a document's parsed text, the unit that gets embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub source_document_id: String,
    /// Position within the document, contiguous from 0.
    pub ordinal: usize,
    /// Character offset of the first character in the parsed text.
    pub start_offset: usize,
    pub text: String,
}

/// A segment returned from a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedMatch {
    pub segment_text: String,
    pub similarity_score: f64,
}

/// Result of a successful ingestion, also the upload endpoint's response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    pub document_id: String,
    pub filename: String,
    #[serde(rename = "size")]
    pub byte_size: u64,
    #[serde(rename = "message")]
    pub status_message: String,
    #[serde(rename = "segmentsCreated")]
    pub segment_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    #[serde(default)]
    pub max_results: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "answer")]
    pub text: String,
    pub sources: Vec<String>,
    /// Mean similarity of the matches used as context; not a calibrated probability.
    pub confidence: f64,
}
