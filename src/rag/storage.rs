use std::path::{Path, PathBuf};

use tokio::fs;

use super::types::Document;
use crate::core::errors::RagError;

/// Durable storage for raw uploads, laid out as `{root}/{documentId}_{filename}`.
#[derive(Debug, Clone)]
pub struct DocumentStorage {
    root: PathBuf,
}

impl DocumentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn store(
        &self,
        document_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Document, RagError> {
        let filename = sanitize_filename(filename)?;

        fs::create_dir_all(&self.root)
            .await
            .map_err(RagError::storage)?;

        let stored_path = self.root.join(format!("{}_{}", document_id, filename));
        fs::write(&stored_path, bytes)
            .await
            .map_err(RagError::storage)?;

        Ok(Document {
            id: document_id.to_string(),
            filename,
            byte_size: bytes.len() as u64,
            stored_path,
        })
    }
}

/// Reduces a client-supplied name to its final path component.
pub fn sanitize_filename(filename: &str) -> Result<String, RagError> {
    let base = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .map(str::trim)
        .unwrap_or_default();

    if base.is_empty() || base == "." || base == ".." {
        return Err(RagError::InvalidInput("Invalid filename".to_string()));
    }
    Ok(base.to_string())
}
