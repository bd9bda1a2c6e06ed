use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::defaults::*;
use super::paths::AppPaths;
use crate::core::errors::ApiError;

/// Typed view over the merged configuration tree.
#[derive(Debug, Clone)]
pub struct RagSettings {
    pub ingestion: IngestionSettings,
    pub retrieval: RetrievalSettings,
    pub models: ModelSettings,
    pub server: ServerSettings,
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub progress_every: usize,
    pub max_upload_bytes: u64,
    pub upload_dir: Option<String>,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            progress_every: DEFAULT_PROGRESS_EVERY,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_max_results: usize,
    pub max_results_limit: usize,
    pub min_score: f64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_max_results: DEFAULT_MAX_RESULTS,
            max_results_limit: DEFAULT_MAX_RESULTS_LIMIT,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MODEL_BASE_URL.to_string(),
            api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ModelSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub cors_allowed_origins: Vec<String>,
}

impl RagSettings {
    pub fn from_config(config: &Value, paths: &AppPaths) -> Result<Self, ApiError> {
        let ingestion: IngestionSettings = section(config, "ingestion")?;
        let retrieval: RetrievalSettings = section(config, "retrieval")?;
        let models: ModelSettings = section(config, "models")?;
        let server: ServerSettings = section(config, "server")?;

        let upload_dir = match ingestion.upload_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => {
                let candidate = PathBuf::from(dir);
                if candidate.is_absolute() {
                    candidate
                } else {
                    paths.user_data_dir.join(candidate)
                }
            }
            _ => paths.upload_dir.clone(),
        };

        Ok(Self {
            ingestion,
            retrieval,
            models,
            server,
            upload_dir,
        })
    }
}

impl Default for RagSettings {
    fn default() -> Self {
        let paths = AppPaths::with_data_dir(PathBuf::from("."), PathBuf::from("."));
        Self {
            ingestion: IngestionSettings::default(),
            retrieval: RetrievalSettings::default(),
            models: ModelSettings::default(),
            server: ServerSettings::default(),
            upload_dir: paths.upload_dir,
        }
    }
}

fn section<T>(config: &Value, key: &str) -> Result<T, ApiError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    match config.get(key) {
        Some(value) if !value.is_null() => serde_json::from_value(value.clone())
            .map_err(|err| ApiError::BadRequest(format!("Invalid config at '{}': {}", key, err))),
        _ => Ok(T::default()),
    }
}
