use serde_json::{json, Value};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_PROGRESS_EVERY: usize = 10;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const DEFAULT_MAX_RESULTS_LIMIT: usize = 50;
pub const DEFAULT_MIN_SCORE: f64 = 0.0;
pub const DEFAULT_MODEL_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Baseline configuration tree that `config.yml` and `secrets.yaml` are merged over.
pub fn default_config() -> Value {
    json!({
        "ingestion": {
            "chunk_size": DEFAULT_CHUNK_SIZE,
            "chunk_overlap": DEFAULT_CHUNK_OVERLAP,
            "progress_every": DEFAULT_PROGRESS_EVERY,
            "max_upload_bytes": DEFAULT_MAX_UPLOAD_BYTES,
        },
        "retrieval": {
            "default_max_results": DEFAULT_MAX_RESULTS,
            "max_results_limit": DEFAULT_MAX_RESULTS_LIMIT,
            "min_score": DEFAULT_MIN_SCORE,
        },
        "models": {
            "base_url": DEFAULT_MODEL_BASE_URL,
            "chat_model": DEFAULT_CHAT_MODEL,
            "embedding_model": DEFAULT_EMBEDDING_MODEL,
            "request_timeout_secs": DEFAULT_REQUEST_TIMEOUT_SECS,
        },
        "server": {
            "cors_allowed_origins": [
                "http://localhost:4200",
                "http://127.0.0.1:4200",
                "http://localhost:3000",
            ],
        },
    })
}
