use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to initialize model client: {0}")]
    Models(#[source] anyhow::Error),

    #[error("Failed to initialize vector index: {0}")]
    Index(#[source] anyhow::Error),

    #[error("Failed to build ingestion pipeline: {0}")]
    Pipeline(#[source] anyhow::Error),
}
