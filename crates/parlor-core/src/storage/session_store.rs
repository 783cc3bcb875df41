//! Session store trait.
//!
//! Defines the interface for session-scoped persistent storage: a JSON
//! key-value namespace per session plus the platform's single wake-up
//! alarm slot per session. Implementations live in parlor-infra.
//!
//! The store offers no secondary indexing and no cross-key transactions;
//! callers persist fully-constructed values in single puts. Mutual
//! exclusion within a session is supplied by the session runtime, not by
//! the store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parlor_types::error::RepositoryError;

/// Store key holding the conversation history (JSON array of turns).
pub const KEY_HISTORY: &str = "history";

/// Store key holding the pending job queue (JSON array, insertion order).
pub const KEY_JOBS: &str = "jobs";

/// Store key holding the next maintenance due time (RFC 3339 string).
pub const KEY_NEXT_MAINTENANCE: &str = "nextMaintenanceAt";

/// Store key for a client's token bucket. Expires after the bucket TTL.
pub fn bucket_key(key: &str) -> String {
    format!("tb:{key}")
}

/// Trait for session-scoped persistent key-value storage with one alarm
/// slot per session.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in parlor-infra.
pub trait SessionStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist or its
    /// TTL has elapsed.
    fn get(
        &self,
        session_id: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send;

    /// Set a value for a key (upsert). Clears any TTL on the entry.
    fn put(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Set a value for a key (upsert) that expires `ttl` from now.
    /// Re-putting an entry refreshes its expiry.
    fn put_with_ttl(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a key. No-op if the key does not exist.
    fn delete(
        &self,
        session_id: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Read the session's armed wake-up time, if any.
    fn get_alarm(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<DateTime<Utc>>, RepositoryError>> + Send;

    /// Arm the session's single wake-up timer for `at`.
    ///
    /// A session has at most one pending alarm; setting a new one replaces
    /// any previously armed time.
    fn set_alarm(
        &self,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_key_format() {
        assert_eq!(bucket_key("chat:alice"), "tb:chat:alice");
    }

    #[test]
    fn test_well_known_keys() {
        assert_eq!(KEY_HISTORY, "history");
        assert_eq!(KEY_JOBS, "jobs");
        assert_eq!(KEY_NEXT_MAINTENANCE, "nextMaintenanceAt");
    }
}
