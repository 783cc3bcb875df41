//! Per-client token-bucket admission control over the session store.
//!
//! Bucket state is persisted under `tb:<key>` with a short TTL, refreshed
//! on every check. Refill is lazy -- a pure function of elapsed wall-clock
//! time evaluated at check time -- so no background refill task exists.
//! After the TTL of inactivity the entry expires and the next check starts
//! from a fresh bucket with full burst.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parlor_types::error::RepositoryError;
use parlor_types::limiter::{BucketState, RatePolicy};

use crate::storage::session_store::bucket_key;
use crate::storage::SessionStore;

/// Admission gate for one session's clients.
pub struct RateLimiter<S> {
    store: Arc<S>,
    session_id: String,
    ttl: Duration,
}

impl<S: SessionStore> RateLimiter<S> {
    pub fn new(store: Arc<S>, session_id: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            ttl,
        }
    }

    /// Check admission for `key` under `policy` at the current instant.
    ///
    /// Returns false when the bucket is empty; the caller must surface a
    /// rate-limited error and make no further state changes.
    pub async fn admit(&self, key: &str, policy: &RatePolicy) -> Result<bool, RepositoryError> {
        self.admit_at(key, policy, Utc::now()).await
    }

    /// Check admission at an explicit instant. Split out so tests can
    /// drive the clock.
    pub async fn admit_at(
        &self,
        key: &str,
        policy: &RatePolicy,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let storage_key = bucket_key(key);

        let bucket = match self.store.get(&self.session_id, &storage_key).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| RepositoryError::Query(format!("invalid bucket: {e}")))?,
            None => BucketState::full(policy, now),
        };

        let mut bucket = bucket.refilled(policy, now);

        let admitted = bucket.tokens > 0;
        if admitted {
            bucket.tokens -= 1;
        }

        // Persist either way: a denied check still refreshes the TTL so a
        // client hammering the endpoint cannot reset its bucket by waiting
        // for expiry mid-burst.
        let value = serde_json::to_value(&bucket)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize bucket: {e}")))?;
        self.store
            .put_with_ttl(&self.session_id, &storage_key, &value, self.ttl)
            .await?;

        Ok(admitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;
    use chrono::Duration as ChronoDuration;

    const POLICY: RatePolicy = RatePolicy {
        rate_per_minute: 30,
        burst: 3,
    };

    fn limiter(store: Arc<MemoryStore>) -> RateLimiter<MemoryStore> {
        RateLimiter::new(store, "s1", Duration::from_secs(180))
    }

    #[tokio::test]
    async fn test_burst_then_denial() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter(store);
        let now = Utc::now();

        for _ in 0..3 {
            assert!(limiter.admit_at("chat:alice", &POLICY, now).await.unwrap());
        }
        // Burst exhausted within zero elapsed time: denied.
        assert!(!limiter.admit_at("chat:alice", &POLICY, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_one_interval_grants_exactly_one() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter(store);
        let now = Utc::now();

        for _ in 0..3 {
            assert!(limiter.admit_at("chat:alice", &POLICY, now).await.unwrap());
        }
        assert!(!limiter.admit_at("chat:alice", &POLICY, now).await.unwrap());

        // One refill interval later (2s at 30/min): exactly one more.
        let later = now + ChronoDuration::milliseconds(POLICY.refill_interval_ms());
        assert!(limiter.admit_at("chat:alice", &POLICY, later).await.unwrap());
        assert!(!limiter.admit_at("chat:alice", &POLICY, later).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter(store);
        let now = Utc::now();

        for _ in 0..3 {
            assert!(limiter.admit_at("chat:alice", &POLICY, now).await.unwrap());
        }
        assert!(!limiter.admit_at("chat:alice", &POLICY, now).await.unwrap());
        // A different client key has its own bucket.
        assert!(limiter.admit_at("chat:bob", &POLICY, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_bucket_starts_fresh() {
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(store.clone(), "s1", Duration::from_secs(0));
        let now = Utc::now();

        for _ in 0..3 {
            assert!(limiter.admit_at("chat:alice", &POLICY, now).await.unwrap());
        }
        // With a zero TTL the persisted bucket is already expired, so the
        // next check sees a fresh full-burst bucket.
        assert!(limiter.admit_at("chat:alice", &POLICY, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_denied_check_refreshes_ttl() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter(store.clone());
        let now = Utc::now();

        for _ in 0..4 {
            limiter.admit_at("chat:alice", &POLICY, now).await.unwrap();
        }
        // The bucket is persisted (with a TTL) even though the last check
        // was denied.
        let stored = store.get("s1", "tb:chat:alice").await.unwrap();
        assert!(stored.is_some());
        let bucket: BucketState = serde_json::from_value(stored.unwrap()).unwrap();
        assert_eq!(bucket.tokens, 0);
    }
}
