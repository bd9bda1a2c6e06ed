use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use crate::core::errors::ApiError;
use crate::core::security::authorize;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let caller = authorize(&headers, &state.session_token)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::BadRequest(
            "Missing multipart field 'file'".to_string(),
        ));
    };

    tracing::info!(
        "Upload of {:?} ({} bytes) from {}",
        filename,
        bytes.len(),
        caller
    );

    let summary = state
        .pipeline
        .ingest_detached(bytes.to_vec(), filename)
        .await?;
    Ok(Json(summary))
}
