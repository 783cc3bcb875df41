//! SQLite session store implementation.
//!
//! Implements `SessionStore` from `parlor-core` using sqlx with split
//! read/write pools. Values are stored as JSON text. TTL entries carry an
//! `expires_at` timestamp and are deleted lazily when a read finds them
//! expired -- there is no background sweeper. The per-session alarm slot
//! is a single upserted row in `session_alarms`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parlor_core::storage::SessionStore;
use parlor_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    /// Create a new session store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn upsert(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let now = format_datetime(&Utc::now());
        let value_str = serde_json::to_string(value)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize value: {e}")))?;
        let expires_str = expires_at.as_ref().map(format_datetime);

        sqlx::query(
            r#"INSERT INTO session_kv (session_id, key, value, expires_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT (session_id, key) DO UPDATE SET
                   value = excluded.value,
                   expires_at = excluded.expires_at,
                   updated_at = excluded.updated_at"#,
        )
        .bind(session_id)
        .bind(key)
        .bind(&value_str)
        .bind(&expires_str)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// SessionStore implementation
// ---------------------------------------------------------------------------

impl SessionStore for SqliteSessionStore {
    async fn get(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        let row = sqlx::query(
            "SELECT value, expires_at FROM session_kv WHERE session_id = ? AND key = ?",
        )
        .bind(session_id)
        .bind(key)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: Option<String> = row
            .try_get("expires_at")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        if let Some(expires_at) = expires_at {
            if parse_datetime(&expires_at)? <= Utc::now() {
                // Lazy expiry: drop the stale row and report absence.
                tracing::debug!(session_id, key, "expired entry dropped on read");
                self.delete(session_id, key).await?;
                return Ok(None);
            }
        }

        let value_str: String = row
            .try_get("value")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let value: serde_json::Value = serde_json::from_str(&value_str)
            .map_err(|e| RepositoryError::Query(format!("invalid JSON value: {e}")))?;
        Ok(Some(value))
    }

    async fn put(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        self.upsert(session_id, key, value, None).await
    }

    async fn put_with_ttl(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), RepositoryError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        self.upsert(session_id, key, value, Some(expires_at)).await
    }

    async fn delete(&self, session_id: &str, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM session_kv WHERE session_id = ? AND key = ?")
            .bind(session_id)
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_alarm(&self, session_id: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let row = sqlx::query("SELECT fire_at FROM session_alarms WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let fire_at: String = row
                    .try_get("fire_at")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(parse_datetime(&fire_at)?))
            }
            None => Ok(None),
        }
    }

    async fn set_alarm(&self, session_id: &str, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let now = format_datetime(&Utc::now());

        sqlx::query(
            r#"INSERT INTO session_alarms (session_id, fire_at, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT (session_id) DO UPDATE SET
                   fire_at = excluded.fire_at,
                   updated_at = excluded.updated_at"#,
        )
        .bind(session_id)
        .bind(format_datetime(&at))
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    async fn test_store() -> SqliteSessionStore {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        let pool = DatabasePool::new(&url).await.unwrap();
        SqliteSessionStore::new(pool)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = test_store().await;

        let value = serde_json::json!({"turns": [1, 2, 3]});
        store.put("s1", "history", &value).await.unwrap();

        let got = store.get("s1", "history").await.unwrap();
        assert_eq!(got, Some(value));
    }

    #[tokio::test]
    async fn test_get_nonexistent_returns_none() {
        let store = test_store().await;
        let got = store.get("s1", "missing").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_put_upserts() {
        let store = test_store().await;

        store.put("s1", "counter", &serde_json::json!(1)).await.unwrap();
        store.put("s1", "counter", &serde_json::json!(2)).await.unwrap();

        let got = store.get("s1", "counter").await.unwrap();
        assert_eq!(got, Some(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = test_store().await;

        store.put("s1", "temp", &serde_json::json!("value")).await.unwrap();
        store.delete("s1", "temp").await.unwrap();

        let got = store.get("s1", "temp").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_noop() {
        let store = test_store().await;

        // Should not error
        store.delete("s1", "nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let store = test_store().await;

        store
            .put_with_ttl("s1", "tb:chat:alice", &serde_json::json!({"tokens": 0}), Duration::ZERO)
            .await
            .unwrap();

        let got = store.get("s1", "tb:chat:alice").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_unexpired_ttl_entry_is_readable() {
        let store = test_store().await;

        store
            .put_with_ttl(
                "s1",
                "tb:chat:alice",
                &serde_json::json!({"tokens": 3}),
                Duration::from_secs(180),
            )
            .await
            .unwrap();

        let got = store.get("s1", "tb:chat:alice").await.unwrap();
        assert_eq!(got, Some(serde_json::json!({"tokens": 3})));
    }

    #[tokio::test]
    async fn test_reput_refreshes_ttl() {
        let store = test_store().await;

        store
            .put_with_ttl("s1", "bucket", &serde_json::json!(1), Duration::ZERO)
            .await
            .unwrap();
        // Re-putting with a fresh TTL revives the key.
        store
            .put_with_ttl("s1", "bucket", &serde_json::json!(2), Duration::from_secs(60))
            .await
            .unwrap();

        let got = store.get("s1", "bucket").await.unwrap();
        assert_eq!(got, Some(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn test_plain_put_clears_ttl() {
        let store = test_store().await;

        store
            .put_with_ttl("s1", "key", &serde_json::json!("ephemeral"), Duration::ZERO)
            .await
            .unwrap();
        store.put("s1", "key", &serde_json::json!("durable")).await.unwrap();

        let got = store.get("s1", "key").await.unwrap();
        assert_eq!(got, Some(serde_json::json!("durable")));
    }

    #[tokio::test]
    async fn test_alarm_missing_by_default() {
        let store = test_store().await;
        assert!(store.get_alarm("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_alarm_replaces_previous() {
        let store = test_store().await;

        let first = Utc::now() + ChronoDuration::hours(1);
        let second = Utc::now() + ChronoDuration::hours(5);

        store.set_alarm("s1", first).await.unwrap();
        store.set_alarm("s1", second).await.unwrap();

        // One slot per session: the second arm replaced the first.
        let got = store.get_alarm("s1").await.unwrap().unwrap();
        assert!((got - second).num_seconds().abs() < 1);
    }

    #[tokio::test]
    async fn test_session_isolation() {
        let store = test_store().await;

        store.put("a", "name", &serde_json::json!("Alice")).await.unwrap();
        store.put("b", "name", &serde_json::json!("Bob")).await.unwrap();

        assert_eq!(
            store.get("a", "name").await.unwrap(),
            Some(serde_json::json!("Alice"))
        );
        assert_eq!(
            store.get("b", "name").await.unwrap(),
            Some(serde_json::json!("Bob"))
        );

        store.set_alarm("a", Utc::now()).await.unwrap();
        assert!(store.get_alarm("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_value_types() {
        let store = test_store().await;

        for (key, value) in [
            ("string", serde_json::json!("hello")),
            ("number", serde_json::json!(42)),
            ("bool", serde_json::json!(true)),
            ("array", serde_json::json!([1, "two", 3])),
            ("nested", serde_json::json!({"a": {"b": {"c": true}}})),
        ] {
            store.put("s1", key, &value).await.unwrap();
            assert_eq!(store.get("s1", key).await.unwrap(), Some(value));
        }
    }
}
