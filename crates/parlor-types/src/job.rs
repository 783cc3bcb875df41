//! Deferred-invocation job types for Parlor.
//!
//! A [`ScheduledJob`] is a pending assistant invocation with a due time,
//! created by a schedule request and destroyed when it fires or when the
//! session's history is cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// A pending deferred assistant invocation.
///
/// Jobs are persisted in insertion order; two jobs due at the same instant
/// fire in the order they were scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub due_at: DateTime<Utc>,
    pub prompt: String,
}

impl ScheduledJob {
    /// Create a new job with a fresh time-sortable id.
    pub fn new(due_at: DateTime<Utc>, prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            due_at,
            prompt: prompt.into(),
        }
    }
}

/// How a schedule request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    /// The due time was within the immediate horizon; the invocation ran
    /// inline and the reply is in the ack.
    Immediate,
    /// A job was enqueued and the wake-up timer armed.
    Scheduled,
}

impl fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleMode::Immediate => write!(f, "immediate"),
            ScheduleMode::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// Acknowledgement returned by a schedule request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAck {
    pub id: Uuid,
    pub mode: ScheduleMode,
    /// The assistant's reply, present only for [`ScheduleMode::Immediate`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_ids_are_unique() {
        let now = Utc::now();
        let a = ScheduledJob::new(now, "a");
        let b = ScheduledJob::new(now, "b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_schedule_mode_serde() {
        let json = serde_json::to_string(&ScheduleMode::Immediate).unwrap();
        assert_eq!(json, "\"immediate\"");
        let json = serde_json::to_string(&ScheduleMode::Scheduled).unwrap();
        assert_eq!(json, "\"scheduled\"");
    }

    #[test]
    fn test_ack_omits_reply_when_scheduled() {
        let ack = ScheduleAck {
            id: Uuid::now_v7(),
            mode: ScheduleMode::Scheduled,
            reply: None,
        };
        let json = serde_json::to_string(&ack).unwrap();
        assert!(!json.contains("reply"));
    }

    #[test]
    fn test_job_roundtrip() {
        let job = ScheduledJob::new(Utc::now(), "check in on the deploy");
        let json = serde_json::to_string(&job).unwrap();
        let parsed: ScheduledJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, job);
    }
}
