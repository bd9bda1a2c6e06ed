//! Ingestion progress events and their in-process fan-out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::errors::RagError;

const DEFAULT_HUB_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionPhase {
    Started,
    Saving,
    Parsing,
    Splitting,
    Embedding,
    Completed,
    Failed,
}

impl IngestionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One lifecycle notification for an ingestion run. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionProgress {
    pub document_id: String,
    pub filename: String,
    #[serde(rename = "status")]
    pub phase: IngestionPhase,
    pub current_segment: usize,
    pub total_segments: usize,
    pub progress_percentage: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl IngestionProgress {
    pub fn new(
        document_id: &str,
        filename: &str,
        phase: IngestionPhase,
        percent: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.to_string(),
            filename: filename.to_string(),
            phase,
            current_segment: 0,
            total_segments: 0,
            progress_percentage: percent.min(100),
            message: message.into(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_segments(mut self, current: usize, total: usize) -> Self {
        self.current_segment = current;
        self.total_segments = total;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Publishes progress events to whoever is listening.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn publish(&self, event: &IngestionProgress) -> Result<(), RagError>;
}

/// Broadcast topic shared by every ingestion. Subscribers see all documents
/// and filter on `documentId` themselves.
#[derive(Debug, Clone)]
pub struct ProgressHub {
    sender: broadcast::Sender<IngestionProgress>,
}

impl ProgressHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IngestionProgress> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

#[async_trait]
impl ProgressReporter for ProgressHub {
    async fn publish(&self, event: &IngestionProgress) -> Result<(), RagError> {
        self.sender
            .send(event.clone())
            .map(|_| ())
            .map_err(|_| RagError::downstream("progress publish", "no active subscribers"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_serializes_with_client_field_names() {
        let event = IngestionProgress::new("doc-1", "a.txt", IngestionPhase::Embedding, 65, "Embedding")
            .with_segments(5, 10);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["documentId"], json!("doc-1"));
        assert_eq!(value["status"], json!("embedding"));
        assert_eq!(value["currentSegment"], json!(5));
        assert_eq!(value["totalSegments"], json!(10));
        assert_eq!(value["progressPercentage"], json!(65));
        assert!(value.get("error").is_none());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn failed_event_carries_error() {
        let event = IngestionProgress::new("d", "f.pdf", IngestionPhase::Failed, 20, "Failed")
            .with_error("boom");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], json!("failed"));
        assert_eq!(value["error"], json!("boom"));
        assert!(IngestionPhase::Failed.is_terminal());
        assert!(!IngestionPhase::Embedding.is_terminal());
    }

    #[tokio::test]
    async fn hub_fans_out_to_every_subscriber() {
        let hub = ProgressHub::new(8);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        let event = IngestionProgress::new("d", "f.txt", IngestionPhase::Started, 0, "Started");
        hub.publish(&event).await.unwrap();

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
        assert_eq!(hub.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_an_error() {
        let hub = ProgressHub::default();
        let event = IngestionProgress::new("d", "f.txt", IngestionPhase::Started, 0, "Started");
        assert!(hub.publish(&event).await.is_err());
    }
}
