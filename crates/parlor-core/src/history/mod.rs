//! History ledger: bounded conversation retention over the session store.
//!
//! History is an append-only log of turns, pruned on every persist by
//! three policies applied in sequence -- age, then count, then total
//! size -- so the stored history is monotonically non-increasing in size
//! across writes. Pruning itself is a pure function; the ledger wraps it
//! with load/persist plumbing.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parlor_types::chat::Turn;
use parlor_types::config::RetentionConfig;
use parlor_types::error::RepositoryError;

use crate::storage::{SessionStore, KEY_HISTORY, KEY_JOBS};

/// Apply the three retention policies to `turns`, newest-preserving.
///
/// 1. age: turns older than `max_age_days` are dropped.
/// 2. count: the oldest turns beyond `max_turns` are dropped.
/// 3. size: most recent turns are retained until the `max_chars` budget is
///    exhausted; the oldest remainder is dropped. A single turn larger
///    than the whole budget does not survive.
pub fn prune(mut turns: Vec<Turn>, now: DateTime<Utc>, limits: &RetentionConfig) -> Vec<Turn> {
    let cutoff = now - Duration::days(i64::from(limits.max_age_days));
    turns.retain(|t| t.timestamp >= cutoff);

    if turns.len() > limits.max_turns {
        let excess = turns.len() - limits.max_turns;
        turns.drain(..excess);
    }

    let mut total = 0usize;
    let mut oldest_kept = turns.len();
    for (i, turn) in turns.iter().enumerate().rev() {
        let len = turn.content_len();
        if total + len > limits.max_chars {
            break;
        }
        total += len;
        oldest_kept = i;
    }
    turns.drain(..oldest_kept);

    turns
}

/// Append-only conversation log for one session, persisted under
/// [`KEY_HISTORY`].
///
/// The ledger never locks: the single-writer-per-session guarantee of the
/// runtime makes read-modify-write races impossible, and sessions are
/// isolated by storage namespace.
pub struct HistoryLedger<S> {
    store: Arc<S>,
    session_id: String,
    limits: RetentionConfig,
}

impl<S: SessionStore> HistoryLedger<S> {
    pub fn new(store: Arc<S>, session_id: impl Into<String>, limits: RetentionConfig) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            limits,
        }
    }

    /// Load the stored history. A missing key is an empty history.
    pub async fn load(&self) -> Result<Vec<Turn>, RepositoryError> {
        let value = self.store.get(&self.session_id, KEY_HISTORY).await?;
        match value {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| RepositoryError::Query(format!("invalid history: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    /// Prune `turns` as of `now` and persist the result in a single put.
    ///
    /// Returns the pruned history, which callers should treat as the
    /// authoritative state.
    pub async fn persist(
        &self,
        turns: Vec<Turn>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Turn>, RepositoryError> {
        let pruned = prune(turns, now, &self.limits);
        let value = serde_json::to_value(&pruned)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize history: {e}")))?;
        self.store.put(&self.session_id, KEY_HISTORY, &value).await?;
        Ok(pruned)
    }

    /// Load, append one turn, prune, persist.
    pub async fn append(&self, turn: Turn, now: DateTime<Utc>) -> Result<Vec<Turn>, RepositoryError> {
        let mut turns = self.load().await?;
        turns.push(turn);
        self.persist(turns, now).await
    }

    /// Delete the history and all pending jobs.
    ///
    /// A cleared conversation must not later receive an assistant message,
    /// so clearing cancels the session's deferred work along with its log.
    pub async fn clear(&self) -> Result<(), RepositoryError> {
        self.store.delete(&self.session_id, KEY_HISTORY).await?;
        self.store.delete(&self.session_id, KEY_JOBS).await?;
        Ok(())
    }
}
