//! HTTP request handlers.

pub mod chat;
pub mod history;
pub mod schedule;

use axum::http::HeaderMap;

use crate::http::error::AppError;

/// Client key used when the request carries no `x-client-key` header.
/// Identification is the auth layer's job; the actor only needs a stable
/// key per client for its token buckets.
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Extract the rate-limit client key from the request headers.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-client-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}

/// Validate a session id path parameter.
pub fn validate_session_id(session_id: &str) -> Result<(), AppError> {
    if session_id.is_empty() || session_id.len() > 128 {
        return Err(AppError::Validation(format!(
            "invalid session id: '{session_id}'"
        )));
    }
    Ok(())
}
