//! Job queue and wake-up reconciliation helpers.
//!
//! The session store exposes at most one pending alarm per session, yet a
//! session must honor an arbitrary number of independently-due jobs plus a
//! recurring maintenance pass. These helpers keep that reconciliation
//! explicit: the due/future partition and the next-wake minimum are pure
//! functions recomputed on every arm and every fire -- the armed time is
//! never trusted as a source of truth.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parlor_types::error::RepositoryError;
use parlor_types::job::ScheduledJob;

use crate::storage::{SessionStore, KEY_JOBS};

// ---------------------------------------------------------------------------
// Pure reconciliation helpers
// ---------------------------------------------------------------------------

/// Split `jobs` into (due, future) as of `now`.
///
/// Due jobs are ordered by ascending due time; the sort is stable, so jobs
/// due at the same instant keep their insertion order.
pub fn partition_due(
    jobs: Vec<ScheduledJob>,
    now: DateTime<Utc>,
) -> (Vec<ScheduledJob>, Vec<ScheduledJob>) {
    let (mut due, future): (Vec<_>, Vec<_>) = jobs.into_iter().partition(|j| j.due_at <= now);
    due.sort_by_key(|j| j.due_at);
    (due, future)
}

/// The earliest instant the session must wake at: the sooner of the next
/// maintenance pass and any future job's due time.
pub fn next_wake(future: &[ScheduledJob], maintenance_at: DateTime<Utc>) -> DateTime<Utc> {
    future
        .iter()
        .map(|j| j.due_at)
        .min()
        .map_or(maintenance_at, |earliest| earliest.min(maintenance_at))
}

// ---------------------------------------------------------------------------
// JobQueue
// ---------------------------------------------------------------------------

/// Pending deferred invocations for one session, persisted under
/// [`KEY_JOBS`] in insertion order.
pub struct JobQueue<S> {
    store: Arc<S>,
    session_id: String,
}

impl<S: SessionStore> JobQueue<S> {
    pub fn new(store: Arc<S>, session_id: impl Into<String>) -> Self {
        Self {
            store,
            session_id: session_id.into(),
        }
    }

    /// Load the pending jobs. A missing key is an empty queue.
    pub async fn load(&self) -> Result<Vec<ScheduledJob>, RepositoryError> {
        let value = self.store.get(&self.session_id, KEY_JOBS).await?;
        match value {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| RepositoryError::Query(format!("invalid job queue: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    /// Persist `jobs`, replacing the stored queue.
    pub async fn save(&self, jobs: &[ScheduledJob]) -> Result<(), RepositoryError> {
        let value = serde_json::to_value(jobs)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize jobs: {e}")))?;
        self.store.put(&self.session_id, KEY_JOBS, &value).await
    }

    /// Append one job to the queue.
    pub async fn push(&self, job: ScheduledJob) -> Result<(), RepositoryError> {
        let mut jobs = self.load().await?;
        jobs.push(job);
        self.save(&jobs).await
    }
}
