use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::errors::RagError;

/// Maps text to a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

/// Single-turn completion: prompt in, text out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, RagError>;
}

/// Runs a downstream call under a deadline, turning an elapsed deadline into
/// `DownstreamTimeout`.
pub async fn bounded<T, F>(operation: &str, timeout: Duration, call: F) -> Result<T, RagError>
where
    F: Future<Output = Result<T, RagError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(RagError::DownstreamTimeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
