use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use crate::core::config::settings::RetrievalSettings;
use crate::core::errors::ApiError;
use crate::core::security::authorize;
use crate::rag::Question;
use crate::state::AppState;

pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<Question>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = authorize(&headers, &state.session_token)?;
    let Json(question) =
        payload.map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;

    if question.question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question must not be empty".to_string()));
    }
    let max_results = resolve_max_results(question.max_results, &state.settings.retrieval)?;

    tracing::info!(
        "Question from {} (maxResults={}, {} chars)",
        caller,
        max_results,
        question.question.chars().count()
    );

    let answer = state
        .composer
        .answer(&question.question, max_results)
        .await?;
    Ok(Json(answer))
}

fn resolve_max_results(
    requested: Option<i64>,
    retrieval: &RetrievalSettings,
) -> Result<usize, ApiError> {
    match requested {
        None => Ok(retrieval.default_max_results),
        Some(n) if n >= 1 && n as u64 <= retrieval.max_results_limit as u64 => Ok(n as usize),
        Some(n) => Err(ApiError::BadRequest(format!(
            "maxResults must be between 1 and {} (got {})",
            retrieval.max_results_limit, n
        ))),
    }
}
