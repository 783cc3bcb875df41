//! The per-conversation session actor.
//!
//! One actor owns all durable state for one conversation: its history,
//! its job queue, its maintenance schedule, and its clients' token
//! buckets. Entry points are serialized by the [`super::runtime`] (one
//! task per session), so none of them lock.
//!
//! Retention limits, rate policies, and scheduler timing all come from
//! [`ParlorConfig`].

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parlor_types::chat::{Turn, TurnRole};
use parlor_types::config::ParlorConfig;
use parlor_types::error::{RepositoryError, SessionError};
use parlor_types::job::{ScheduleAck, ScheduleMode, ScheduledJob};
use parlor_types::llm::{CompletionRequest, Message, MessageRole};

use crate::history::HistoryLedger;
use crate::limiter::RateLimiter;
use crate::llm::LlmProvider;
use crate::scheduler::{next_wake, partition_due, JobQueue};
use crate::storage::{SessionStore, KEY_NEXT_MAINTENANCE};

/// Result of a chat turn: the assistant's reply plus the full pruned
/// history. Clients should replace their local state with the returned
/// history rather than appending to it.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub history: Vec<Turn>,
}

/// Durable, single-writer state machine for one conversation.
pub struct SessionActor<S, P> {
    session_id: String,
    store: Arc<S>,
    provider: Arc<P>,
    config: Arc<ParlorConfig>,
    ledger: HistoryLedger<S>,
    limiter: RateLimiter<S>,
    jobs: JobQueue<S>,
}

impl<S: SessionStore, P: LlmProvider> SessionActor<S, P> {
    pub fn new(
        session_id: impl Into<String>,
        store: Arc<S>,
        provider: Arc<P>,
        config: Arc<ParlorConfig>,
    ) -> Self {
        let session_id = session_id.into();
        let ledger = HistoryLedger::new(
            store.clone(),
            session_id.clone(),
            config.retention.clone(),
        );
        let limiter = RateLimiter::new(
            store.clone(),
            session_id.clone(),
            StdDuration::from_secs(config.limits.bucket_ttl_secs),
        );
        let jobs = JobQueue::new(store.clone(), session_id.clone());

        Self {
            session_id,
            store,
            provider,
            config,
            ledger,
            limiter,
            jobs,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The currently armed wake-up time, if any. The runtime polls this
    /// after every entry point to keep its timer in sync.
    pub async fn armed_alarm(&self) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        self.store.get_alarm(&self.session_id).await
    }

    // --- Request entry points ---

    /// Handle one ordinary chat turn.
    ///
    /// The candidate history (stored turns + the new user turn + the
    /// assistant's reply) is built in memory and persisted in a single
    /// pruned write after the invocation succeeds, so a failed upstream
    /// call leaves no trace in history.
    pub async fn handle_chat_turn(
        &self,
        client_key: &str,
        text: &str,
    ) -> Result<ChatReply, SessionError> {
        if !self
            .limiter
            .admit(&format!("chat:{client_key}"), &self.config.limits.chat)
            .await?
        {
            return Err(SessionError::RateLimited);
        }

        let text = text.trim();
        self.validate_text(text, "message")?;

        let now = Utc::now();
        let mut turns = self.ledger.load().await?;
        turns.push(Turn::new(TurnRole::User, text, now));

        let request = self.build_request(&turns, None);
        let response = self
            .provider
            .complete(&request)
            .await
            .map_err(|e| SessionError::Upstream(e.to_string()))?;

        let reply = response.content;
        turns.push(Turn::new(TurnRole::Assistant, reply.clone(), Utc::now()));
        let history = self.ledger.persist(turns, Utc::now()).await?;

        debug!(
            session_id = %self.session_id,
            turns = history.len(),
            "chat turn completed"
        );

        Ok(ChatReply { reply, history })
    }

    /// Handle a request to schedule a deferred assistant invocation.
    ///
    /// Due times within the immediate horizon run inline and return the
    /// reply synchronously; anything later is enqueued, recorded in
    /// history as a marker turn, and armed on the wake-up timer.
    pub async fn handle_schedule_request(
        &self,
        client_key: &str,
        due_at: DateTime<Utc>,
        prompt: &str,
    ) -> Result<ScheduleAck, SessionError> {
        if !self
            .limiter
            .admit(&format!("sched:{client_key}"), &self.config.limits.schedule)
            .await?
        {
            return Err(SessionError::RateLimited);
        }

        let prompt = prompt.trim();
        self.validate_text(prompt, "prompt")?;

        let now = Utc::now();
        if due_at < now {
            return Err(SessionError::Validation(
                "due time is in the past".to_string(),
            ));
        }

        let horizon = Duration::seconds(self.config.scheduler.immediate_horizon_secs as i64);
        if due_at - now < horizon {
            // Near-immediate deadline: platform timer latency could exceed
            // it, so run inline and skip the queue entirely.
            let mut turns = self.ledger.load().await?;
            let request = self.build_request(&turns, Some(prompt));
            let response = self
                .provider
                .complete(&request)
                .await
                .map_err(|e| SessionError::Upstream(e.to_string()))?;

            let reply = response.content;
            turns.push(Turn::new(TurnRole::Assistant, reply.clone(), Utc::now()));
            self.ledger.persist(turns, Utc::now()).await?;

            return Ok(ScheduleAck {
                id: Uuid::now_v7(),
                mode: ScheduleMode::Immediate,
                reply: Some(reply),
            });
        }

        let job = ScheduledJob::new(due_at, prompt);
        let id = job.id;
        self.jobs.push(job).await?;

        // Marker turn so the pending job is visible to history readers
        // before it fires.
        let marker = Turn::new(
            TurnRole::System,
            format!("Scheduled: {prompt} (due {})", due_at.to_rfc3339()),
            now,
        );
        self.ledger.append(marker, now).await?;

        self.arm_if_earlier(due_at).await?;

        info!(
            session_id = %self.session_id,
            job_id = %id,
            due_at = %due_at,
            "job scheduled"
        );

        Ok(ScheduleAck {
            id,
            mode: ScheduleMode::Scheduled,
            reply: None,
        })
    }

    /// Return the stored history.
    pub async fn handle_history_query(&self) -> Result<Vec<Turn>, SessionError> {
        Ok(self.ledger.load().await?)
    }

    /// Clear the history and cancel all pending jobs.
    pub async fn handle_history_clear(&self) -> Result<(), SessionError> {
        self.ledger.clear().await?;
        info!(session_id = %self.session_id, "history cleared");
        Ok(())
    }

    // --- Timer entry point ---

    /// Process a wake-up fire: run due jobs, run maintenance if due, and
    /// re-arm the timer for the earliest remaining deadline.
    ///
    /// One job's invocation failure never blocks the rest: the job is
    /// logged and dropped (a retry with the same due time would re-fire
    /// immediately), and the re-arm still happens.
    pub async fn on_wake_up(&self) -> Result<(), SessionError> {
        let now = Utc::now();
        let (due, future) = partition_due(self.jobs.load().await?, now);

        let mut turns = self.ledger.load().await?;
        let mut appended = false;
        for job in &due {
            let request = self.build_request(&turns, Some(&job.prompt));
            match self.provider.complete(&request).await {
                Ok(response) => {
                    turns.push(Turn::new(TurnRole::Assistant, response.content, Utc::now()));
                    appended = true;
                }
                Err(e) => {
                    warn!(
                        session_id = %self.session_id,
                        job_id = %job.id,
                        error = %e,
                        "dropping job after failed invocation"
                    );
                }
            }
        }
        if appended {
            self.ledger.persist(turns, Utc::now()).await?;
        }

        // Maintenance re-arming is decided here, never as a side effect of
        // the job-path persist above.
        let period = Duration::hours(self.config.scheduler.maintenance_period_hours as i64);
        let mut maintenance_at = match self.load_maintenance_at().await? {
            Some(at) => at,
            // First fire of an untouched schedule: start the recurrence
            // one period out without running maintenance now.
            None => now + period,
        };
        if now >= maintenance_at {
            let stored = self.ledger.load().await?;
            self.ledger.persist(stored, now).await?;
            // Relative to the run time, not the previous due time, so the
            // daily tick drifts under late fires.
            maintenance_at = now + period;
            debug!(session_id = %self.session_id, next = %maintenance_at, "maintenance ran");
        }

        let wake_at = next_wake(&future, maintenance_at);
        self.jobs.save(&future).await?;
        self.save_maintenance_at(maintenance_at).await?;
        self.store
            .set_alarm(&self.session_id, wake_at)
            .await
            .map_err(SessionError::from)?;

        debug!(
            session_id = %self.session_id,
            fired = due.len(),
            remaining = future.len(),
            wake_at = %wake_at,
            "wake-up processed"
        );

        Ok(())
    }

    // --- Helpers ---

    fn validate_text(&self, text: &str, what: &str) -> Result<(), SessionError> {
        if text.is_empty() {
            return Err(SessionError::Validation(format!("{what} is empty")));
        }
        let max = self.config.llm.max_message_chars;
        if text.chars().count() > max {
            return Err(SessionError::Validation(format!(
                "{what} exceeds {max} characters"
            )));
        }
        Ok(())
    }

    /// Build a completion request from the conversation.
    ///
    /// System marker turns are bookkeeping, not conversation: they stay in
    /// history but are excluded from the message list. `final_user`, when
    /// present, becomes the last user message without being part of
    /// history (the job-prompt convention).
    fn build_request(&self, turns: &[Turn], final_user: Option<&str>) -> CompletionRequest {
        let mut messages: Vec<Message> = turns
            .iter()
            .filter_map(|t| match t.role {
                TurnRole::User => Some(Message {
                    role: MessageRole::User,
                    content: t.content.clone(),
                }),
                TurnRole::Assistant => Some(Message {
                    role: MessageRole::Assistant,
                    content: t.content.clone(),
                }),
                TurnRole::System => None,
            })
            .collect();

        if let Some(text) = final_user {
            messages.push(Message {
                role: MessageRole::User,
                content: text.to_string(),
            });
        }

        CompletionRequest {
            model: self.config.llm.model.clone(),
            messages,
            system: self.config.llm.system_prompt.clone(),
            max_tokens: self.config.llm.max_tokens,
        }
    }

    /// Arm the wake-up timer for `at` only if it improves on (is earlier
    /// than) the currently armed time. Arming earlier is always safe: the
    /// fire handler re-derives the true minimum from stored state.
    async fn arm_if_earlier(&self, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        match self.store.get_alarm(&self.session_id).await? {
            Some(current) if current <= at => Ok(()),
            _ => self.store.set_alarm(&self.session_id, at).await,
        }
    }

    async fn load_maintenance_at(&self) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        match self.store.get(&self.session_id, KEY_NEXT_MAINTENANCE).await? {
            Some(value) => {
                let raw: String = serde_json::from_value(value).map_err(|e| {
                    RepositoryError::Query(format!("invalid maintenance time: {e}"))
                })?;
                DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| Some(dt.with_timezone(&Utc)))
                    .map_err(|e| RepositoryError::Query(format!("invalid maintenance time: {e}")))
            }
            None => Ok(None),
        }
    }

    async fn save_maintenance_at(&self, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let value = serde_json::Value::String(at.to_rfc3339());
        self.store
            .put(&self.session_id, KEY_NEXT_MAINTENANCE, &value)
            .await
    }
}
