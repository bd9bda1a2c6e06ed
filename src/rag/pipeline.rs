//! Upload ingestion: save → parse → split → embed → index.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::parser::DocumentFormat;
use super::progress::{IngestionPhase, IngestionProgress, ProgressReporter};
use super::segmenter::Segmenter;
use super::storage::{sanitize_filename, DocumentStorage};
use super::store::VectorIndex;
use super::types::IngestionSummary;
use crate::core::config::defaults::{DEFAULT_PROGRESS_EVERY, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::core::errors::RagError;
use crate::llm::{bounded, Embedder};

const PARSING_PERCENT: u8 = 10;
const SPLITTING_PERCENT: u8 = 20;
const EMBEDDING_START_PERCENT: u8 = 30;
const LOG_EVERY_SEGMENTS: usize = 50;
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

pub struct IngestionPipeline {
    storage: DocumentStorage,
    segmenter: Segmenter,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    reporter: Arc<dyn ProgressReporter>,
    progress_every: usize,
    call_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(
        storage: DocumentStorage,
        segmenter: Segmenter,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            storage,
            segmenter,
            embedder,
            index,
            reporter,
            progress_every: DEFAULT_PROGRESS_EVERY,
            call_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn storage(&self) -> &DocumentStorage {
        &self.storage
    }

    /// Runs `ingest` on its own task so the run is not cancelled when the
    /// caller goes away.
    pub async fn ingest_detached(
        self: &Arc<Self>,
        bytes: Vec<u8>,
        filename: String,
    ) -> Result<IngestionSummary, RagError> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.ingest(&bytes, &filename).await })
            .await
            .map_err(|e| RagError::Storage(format!("ingestion task aborted: {}", e)))?
    }

    pub async fn ingest(&self, bytes: &[u8], filename: &str) -> Result<IngestionSummary, RagError> {
        let mut run = IngestionRun::new(self, Uuid::new_v4().to_string(), filename);

        let validated = sanitize_filename(filename).and_then(|name| {
            let format = DocumentFormat::from_filename(&name)?;
            Ok((name, format))
        });
        let (filename, format) = match validated {
            Ok(valid) => valid,
            Err(err) => {
                tracing::warn!("Rejected upload {:?}: {}", filename, err);
                run.fail(&err).await;
                return Err(err);
            }
        };
        run.filename = filename;

        tracing::info!(
            "Starting ingestion of {} ({} bytes) as document {}",
            run.filename,
            bytes.len(),
            run.document_id
        );

        match self.run_stages(&mut run, bytes, format).await {
            Ok(summary) => {
                tracing::info!(
                    "Ingested document {} ({}): {} segments",
                    summary.document_id,
                    summary.filename,
                    summary.segment_count
                );
                Ok(summary)
            }
            Err(err) => {
                tracing::error!(
                    "Ingestion of document {} ({}) failed at {}%: {}; {} segments were already indexed and remain",
                    run.document_id,
                    run.filename,
                    run.percent,
                    err,
                    run.indexed
                );
                run.fail(&err).await;
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        run: &mut IngestionRun<'_>,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> Result<IngestionSummary, RagError> {
        run.emit(IngestionPhase::Started, 0, "Ingestion started").await;

        run.emit(IngestionPhase::Saving, 0, "Saving file").await;
        let document = self
            .storage
            .store(&run.document_id, &run.filename, bytes)
            .await?;
        tracing::debug!("Saved upload to {}", document.stored_path.display());

        let text = format.parse(bytes).await?;
        tracing::debug!(
            "Parsed {} as {} ({} chars)",
            document.filename,
            format.as_str(),
            text.chars().count()
        );
        run.emit(IngestionPhase::Parsing, PARSING_PERCENT, "Document parsed")
            .await;

        let segments = self.segmenter.split(&document.id, &text);
        let total = segments.len();
        tracing::info!("Split document {} into {} segments", document.id, total);
        run.emit_segments(
            IngestionPhase::Splitting,
            SPLITTING_PERCENT,
            0,
            total,
            format!("Created {} segments", total),
        )
        .await;

        run.emit_segments(
            IngestionPhase::Embedding,
            EMBEDDING_START_PERCENT,
            0,
            total,
            "Embedding segments",
        )
        .await;

        for segment in &segments {
            let embedding = bounded(
                "embedding",
                self.call_timeout,
                self.embedder.embed(&segment.text),
            )
            .await?;
            bounded(
                "vector index write",
                self.call_timeout,
                self.index.add(segment, &embedding),
            )
            .await?;
            run.indexed += 1;

            let processed = run.indexed;
            if processed % self.progress_every == 0 || processed == total {
                run.emit_segments(
                    IngestionPhase::Embedding,
                    embedding_percent(processed, total),
                    processed,
                    total,
                    format!("Embedded {}/{} segments", processed, total),
                )
                .await;
            }
            if processed % LOG_EVERY_SEGMENTS == 0 {
                tracing::info!(
                    "Document {}: embedded {}/{} segments",
                    document.id,
                    processed,
                    total
                );
            }
        }

        run.emit_segments(
            IngestionPhase::Completed,
            100,
            total,
            total,
            "Document processed successfully",
        )
        .await;

        Ok(IngestionSummary {
            document_id: document.id,
            filename: document.filename,
            byte_size: document.byte_size,
            status_message: "Document uploaded and processed successfully".to_string(),
            segment_count: total,
        })
    }

    /// Publishing is best-effort; failures never reach the ingestion caller.
    async fn publish_quietly(&self, event: &IngestionProgress) {
        let result = bounded("progress publish", PUBLISH_TIMEOUT, self.reporter.publish(event)).await;
        if let Err(err) = result {
            tracing::debug!(
                "Progress event {:?} for {} not delivered: {}",
                event.phase,
                event.document_id,
                err
            );
        }
    }
}

/// Linear interpolation of the embedding stage across 30..=100.
fn embedding_percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return EMBEDDING_START_PERCENT;
    }
    let span = (100 - EMBEDDING_START_PERCENT) as usize;
    let percent = EMBEDDING_START_PERCENT as usize + processed.min(total) * span / total;
    percent as u8
}

/// Per-run bookkeeping. Keeps the published percent non-decreasing.
struct IngestionRun<'a> {
    pipeline: &'a IngestionPipeline,
    document_id: String,
    filename: String,
    percent: u8,
    indexed: usize,
    total: usize,
}

impl<'a> IngestionRun<'a> {
    fn new(pipeline: &'a IngestionPipeline, document_id: String, filename: &str) -> Self {
        Self {
            pipeline,
            document_id,
            filename: filename.to_string(),
            percent: 0,
            indexed: 0,
            total: 0,
        }
    }

    async fn emit(&mut self, phase: IngestionPhase, percent: u8, message: impl Into<String>) {
        let (current, total) = (self.indexed, self.total);
        self.emit_segments(phase, percent, current, total, message)
            .await;
    }

    async fn emit_segments(
        &mut self,
        phase: IngestionPhase,
        percent: u8,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) {
        self.percent = self.percent.max(percent);
        self.total = total;
        let event = IngestionProgress::new(
            &self.document_id,
            &self.filename,
            phase,
            self.percent,
            message,
        )
        .with_segments(current, total);
        self.pipeline.publish_quietly(&event).await;
    }

    async fn fail(&mut self, err: &RagError) {
        let event = IngestionProgress::new(
            &self.document_id,
            &self.filename,
            IngestionPhase::Failed,
            self.percent,
            "Document processing failed",
        )
        .with_segments(self.indexed, self.total)
        .with_error(err.to_string());
        self.pipeline.publish_quietly(&event).await;
    }
}
