use thiserror::Error;

/// Errors from session store operations (used by trait definitions in
/// parlor-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced by session actor entry points.
///
/// The taxonomy distinguishes caller mistakes (`Validation`), admission
/// denial (`RateLimited`), assistant-call failures (`Upstream`), and
/// persistence failures (`Storage`). The first three leave no state
/// change behind; `Storage` aborts the current operation before any
/// partial history write.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("rate limited")]
    RateLimited,

    #[error("upstream invocation failed: {0}")]
    Upstream(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}
