use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use super::protocol::{ProgressQuery, SubscriptionAck, WS_APP_PROTOCOL, WS_TOKEN_PREFIX};
use crate::core::errors::ApiError;
use crate::rag::IngestionProgress;
use crate::server::router::allowed_origins;
use crate::state::AppState;

/// Streams ingestion progress events, optionally only for one document.
pub async fn upload_progress_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProgressQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let origin_ok = validate_origin(&headers, &state);
    let token_ok = validate_token(&headers, &state);
    let filter = query.document_id.filter(|id| !id.trim().is_empty());

    ws.protocols([WS_APP_PROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, state, filter, origin_ok, token_ok))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    filter: Option<String>,
    origin_ok: bool,
    token_ok: bool,
) {
    let (mut sender, mut receiver) = socket.split();

    if !origin_ok {
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: 4003,
                reason: "Forbidden: Invalid Origin".into(),
            })))
            .await;
        return;
    }

    if !token_ok {
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: 4001,
                reason: "Unauthorized: Invalid Token".into(),
            })))
            .await;
        return;
    }

    let mut events = state.progress.subscribe();
    if send_json(&mut sender, &SubscriptionAck::new(filter.as_deref()))
        .await
        .is_err()
    {
        return;
    }
    tracing::debug!("Progress subscriber connected (filter: {:?})", filter);

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if !matches_filter(&event, filter.as_deref()) {
                        continue;
                    }
                    if send_json(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Progress subscriber lagged; skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::debug!("Progress subscriber disconnected");
}

fn matches_filter(event: &IngestionProgress, filter: Option<&str>) -> bool {
    filter.map_or(true, |id| event.document_id == id)
}

pub async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: &T,
) -> Result<(), ApiError> {
    let text = serde_json::to_string(payload).map_err(ApiError::internal)?;
    sender
        .send(Message::Text(text))
        .await
        .map_err(ApiError::internal)?;
    Ok(())
}

/// Browsers always send `Origin`; other clients may omit it and rely on the token.
fn validate_origin(headers: &HeaderMap, state: &AppState) -> bool {
    let Some(origin) = headers.get("origin").and_then(|v| v.to_str().ok()) else {
        return true;
    };

    allowed_origins(&state.settings.server.cors_allowed_origins)
        .iter()
        .any(|allowed| origin == allowed || origin.starts_with(&format!("{}/", allowed)))
}

fn validate_token(headers: &HeaderMap, state: &AppState) -> bool {
    extract_token_from_protocol_header(headers)
        .map(|token| token == state.session_token.value())
        .unwrap_or(false)
}

fn extract_token_from_protocol_header(headers: &HeaderMap) -> Option<String> {
    let protocol_header = headers.get("sec-websocket-protocol")?.to_str().ok()?;
    for item in protocol_header.split(',') {
        let protocol = item.trim();
        let Some(encoded) = protocol.strip_prefix(WS_TOKEN_PREFIX) else {
            continue;
        };
        if encoded.is_empty() {
            return None;
        }
        let bytes = hex::decode(encoded).ok()?;
        let token = String::from_utf8(bytes).ok()?;
        if !token.is_empty() {
            return Some(token);
        }
    }
    None
}
