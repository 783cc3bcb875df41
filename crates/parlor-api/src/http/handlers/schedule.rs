//! Deferred-invocation scheduling HTTP handler.
//!
//! POST /api/v1/sessions/{id}/schedule
//!
//! Schedules an assistant invocation for a future instant. Due times
//! within the actor's immediate horizon run inline and return the reply
//! in the ack; later ones are queued and fire from the wake-up timer.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use parlor_types::job::ScheduleAck;

use crate::http::error::AppError;
use crate::http::handlers::{client_key, validate_session_id};
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for the schedule endpoint.
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    /// When the assistant should be invoked (RFC 3339).
    pub due_at: DateTime<Utc>,
    /// The prompt delivered as the final user message at fire time.
    pub prompt: String,
}

/// POST /api/v1/sessions/{id}/schedule - schedule a deferred invocation.
pub async fn submit_schedule(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ScheduleRequest>,
) -> Result<Json<ApiResponse<ScheduleAck>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    validate_session_id(&session_id)?;
    let client = client_key(&headers);

    let ack = state
        .runtime
        .schedule(&session_id, &client, body.due_at, &body.prompt)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(ack, request_id, elapsed)))
}
