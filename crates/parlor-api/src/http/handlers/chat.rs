//! Chat turn HTTP handler.
//!
//! POST /api/v1/sessions/{id}/chat
//!
//! Submits one user message to the session actor and returns the
//! assistant's reply together with the full pruned history. Clients
//! should replace their local conversation state with the returned
//! history rather than appending to it.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use parlor_core::session::ChatReply;

use crate::http::error::AppError;
use crate::http::handlers::{client_key, validate_session_id};
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for the chat endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user message to send.
    pub message: String,
}

/// POST /api/v1/sessions/{id}/chat - submit a chat turn.
pub async fn submit_chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ApiResponse<ChatReply>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    validate_session_id(&session_id)?;
    let client = client_key(&headers);

    let reply = state
        .runtime
        .chat(&session_id, &client, &body.message)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(reply, request_id, elapsed)))
}
