use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::authorize;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn rag_health() -> &'static str {
    "RAG Service is running"
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&headers, &state.session_token)?;
    let indexed_segments = state.index.count(None).await?;
    Ok(Json(json!({
        "status": "ok",
        "indexedSegments": indexed_segments,
        "uploadDir": state.pipeline.storage().root().display().to_string(),
        "progressSubscribers": state.progress.subscriber_count(),
        "chatModel": state.settings.models.chat_model,
        "embeddingModel": state.settings.models.embedding_model
    })))
}
