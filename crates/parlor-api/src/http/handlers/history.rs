//! History query and clear HTTP handlers.
//!
//! Endpoints:
//! - GET  /api/v1/sessions/{id}/history - Read the session's turns
//! - POST /api/v1/sessions/{id}/clear   - Clear history and cancel jobs

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use parlor_types::chat::Turn;

use crate::http::error::AppError;
use crate::http::handlers::validate_session_id;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/sessions/{id}/history - read the stored turns.
pub async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Turn>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    validate_session_id(&session_id)?;

    let turns = state.runtime.history(&session_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(turns, request_id, elapsed)))
}

/// POST /api/v1/sessions/{id}/clear - clear history and cancel all
/// pending jobs for the session.
pub async fn clear_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    validate_session_id(&session_id)?;

    state.runtime.clear(&session_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({"cleared": true}),
        request_id,
        elapsed,
    )))
}
