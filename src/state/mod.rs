use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, RagSettings};
use crate::core::security::{init_session_token, SessionToken};
use crate::llm::{ChatModel, Embedder, OpenAiCompatibleClient};
use crate::rag::{
    AnswerComposer, DocumentStorage, IngestionPipeline, ProgressHub, Retriever, Segmenter,
    SegmenterConfig, SqliteVectorIndex, VectorIndex,
};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// Collaborators are constructed once here and injected into the pipeline
/// and composer; nothing is looked up from a global registry.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigService,
    pub settings: RagSettings,
    pub session_token: SessionToken,
    pub progress: ProgressHub,
    pub index: Arc<dyn VectorIndex>,
    pub pipeline: Arc<IngestionPipeline>,
    pub composer: Arc<AnswerComposer>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Setting up paths and loading configuration
    /// 2. Creating the OpenAI-compatible model client
    /// 3. Opening the SQLite vector index
    /// 4. Wiring the ingestion pipeline and answer composer
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        Self::initialize_with_paths(Arc::new(AppPaths::new())).await
    }

    pub async fn initialize_with_paths(
        paths: Arc<AppPaths>,
    ) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;
        let session_token = init_session_token();

        let client = Arc::new(
            OpenAiCompatibleClient::from_settings(&settings.models)
                .map_err(|e| InitializationError::Models(e.into()))?,
        );
        if settings.models.api_key.is_none() {
            tracing::warn!("No model API key configured; requests go out unauthenticated");
        }

        let index = Arc::new(
            SqliteVectorIndex::new(paths.as_ref(), settings.retrieval.min_score)
                .await
                .map_err(|e| InitializationError::Index(e.into()))?,
        );

        Self::from_components(
            config,
            settings,
            session_token,
            client.clone(),
            client,
            index,
        )
    }

    /// Wires state from explicit collaborators.
    pub fn from_components(
        config: ConfigService,
        settings: RagSettings,
        session_token: SessionToken,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Arc<Self>, InitializationError> {
        let timeout = settings.models.request_timeout();
        let progress = ProgressHub::default();

        let segmenter = Segmenter::new(SegmenterConfig {
            chunk_size: settings.ingestion.chunk_size,
            chunk_overlap: settings.ingestion.chunk_overlap,
        })
        .map_err(|e| InitializationError::Pipeline(e.into()))?;

        let pipeline = IngestionPipeline::new(
            DocumentStorage::new(settings.upload_dir.clone()),
            segmenter,
            embedder.clone(),
            index.clone(),
            Arc::new(progress.clone()),
        )
        .with_progress_every(settings.ingestion.progress_every)
        .with_call_timeout(timeout);

        let retriever = Retriever::new(embedder, index.clone(), timeout);
        let composer = AnswerComposer::new(retriever, chat, timeout);

        tracing::info!(
            "RAG service ready (chunk_size={}, chunk_overlap={}, uploads={})",
            settings.ingestion.chunk_size,
            settings.ingestion.chunk_overlap,
            settings.upload_dir.display()
        );

        Ok(Arc::new(AppState {
            config,
            settings,
            session_token,
            progress,
            index,
            pipeline: Arc::new(pipeline),
            composer: Arc::new(composer),
        }))
    }
}
