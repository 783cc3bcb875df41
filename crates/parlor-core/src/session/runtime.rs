//! Session runtime: one task and one command channel per session.
//!
//! The runtime supplies the platform guarantees the actor is written
//! against: at most one in-flight entry point per session (commands drain
//! from a single mpsc channel inside a single task), and the single
//! wake-up timer (a `sleep_until` arm in the task's `select!` loop, re-read
//! from the store after every command so a request-path re-arm takes
//! effect immediately). A fire and a request can never interleave because
//! both run on the same task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use parlor_types::chat::Turn;
use parlor_types::config::ParlorConfig;
use parlor_types::error::{RepositoryError, SessionError};
use parlor_types::job::ScheduleAck;

use crate::llm::LlmProvider;
use crate::session::actor::{ChatReply, SessionActor};
use crate::storage::SessionStore;

/// Commands accepted by a session task. Each carries a oneshot channel
/// for its reply.
pub enum SessionCommand {
    Chat {
        client_key: String,
        text: String,
        respond: oneshot::Sender<Result<ChatReply, SessionError>>,
    },
    Schedule {
        client_key: String,
        due_at: DateTime<Utc>,
        prompt: String,
        respond: oneshot::Sender<Result<ScheduleAck, SessionError>>,
    },
    History {
        respond: oneshot::Sender<Result<Vec<Turn>, SessionError>>,
    },
    Clear {
        respond: oneshot::Sender<Result<(), SessionError>>,
    },
}

/// Depth of each session's command channel. Backpressure is the token
/// bucket, not this buffer; it only smooths handoff between the HTTP
/// layer and the session task.
const COMMAND_BUFFER: usize = 32;

/// Registry of live session tasks, keyed by session id.
///
/// Sessions are spawned lazily on first use and run until shutdown. The
/// runtime is cheap to clone-share behind an `Arc`.
pub struct SessionRuntime<S, P> {
    store: Arc<S>,
    provider: Arc<P>,
    config: Arc<ParlorConfig>,
    sessions: DashMap<String, mpsc::Sender<SessionCommand>>,
    cancel: CancellationToken,
}

impl<S, P> SessionRuntime<S, P>
where
    S: SessionStore + Send + Sync + 'static,
    P: LlmProvider + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, provider: Arc<P>, config: Arc<ParlorConfig>) -> Self {
        Self {
            store,
            provider,
            config,
            sessions: DashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Submit a chat turn to a session.
    pub async fn chat(
        &self,
        session_id: &str,
        client_key: &str,
        text: &str,
    ) -> Result<ChatReply, SessionError> {
        let (respond, rx) = oneshot::channel();
        self.dispatch(
            session_id,
            SessionCommand::Chat {
                client_key: client_key.to_string(),
                text: text.to_string(),
                respond,
            },
            rx,
        )
        .await
    }

    /// Submit a schedule request to a session.
    pub async fn schedule(
        &self,
        session_id: &str,
        client_key: &str,
        due_at: DateTime<Utc>,
        prompt: &str,
    ) -> Result<ScheduleAck, SessionError> {
        let (respond, rx) = oneshot::channel();
        self.dispatch(
            session_id,
            SessionCommand::Schedule {
                client_key: client_key.to_string(),
                due_at,
                prompt: prompt.to_string(),
                respond,
            },
            rx,
        )
        .await
    }

    /// Read a session's history.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Turn>, SessionError> {
        let (respond, rx) = oneshot::channel();
        self.dispatch(session_id, SessionCommand::History { respond }, rx)
            .await
    }

    /// Clear a session's history and cancel its pending jobs.
    pub async fn clear(&self, session_id: &str) -> Result<(), SessionError> {
        let (respond, rx) = oneshot::channel();
        self.dispatch(session_id, SessionCommand::Clear { respond }, rx)
            .await
    }

    /// Stop all session tasks. In-flight commands finish; queued ones are
    /// dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Number of live session tasks.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    async fn dispatch<T>(
        &self,
        session_id: &str,
        command: SessionCommand,
        rx: oneshot::Receiver<Result<T, SessionError>>,
    ) -> Result<T, SessionError> {
        let sender = self.sender_for(session_id);
        sender
            .send(command)
            .await
            .map_err(|_| SessionError::Storage(RepositoryError::Connection))?;
        rx.await
            .map_err(|_| SessionError::Storage(RepositoryError::Connection))?
    }

    fn sender_for(&self, session_id: &str) -> mpsc::Sender<SessionCommand> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
                let actor = SessionActor::new(
                    session_id,
                    self.store.clone(),
                    self.provider.clone(),
                    self.config.clone(),
                );
                let cancel = self.cancel.clone();
                tokio::spawn(run_session(actor, rx, cancel));
                debug!(session_id, "session task spawned");
                tx
            })
            .clone()
    }
}

/// A session task's main loop: drain commands and fire the armed alarm,
/// strictly serialized.
async fn run_session<S, P>(
    actor: SessionActor<S, P>,
    mut rx: mpsc::Receiver<SessionCommand>,
    cancel: CancellationToken,
) where
    S: SessionStore,
    P: LlmProvider,
{
    loop {
        // Re-read the armed time every iteration: a command handled in the
        // previous iteration may have re-armed it.
        let alarm = match actor.armed_alarm().await {
            Ok(alarm) => alarm,
            Err(e) => {
                warn!(session_id = actor.session_id(), error = %e, "failed to read alarm");
                None
            }
        };
        let deadline = alarm.map_or_else(Instant::now, |at| {
            let remaining = (at - Utc::now()).to_std().unwrap_or_default();
            Instant::now() + remaining
        });

        tokio::select! {
            _ = cancel.cancelled() => break,

            command = rx.recv() => match command {
                Some(command) => handle_command(&actor, command).await,
                None => break,
            },

            _ = tokio::time::sleep_until(deadline), if alarm.is_some() => {
                if let Err(e) = actor.on_wake_up().await {
                    warn!(session_id = actor.session_id(), error = %e, "wake-up failed");
                    // A failed fire leaves the stale alarm armed; back off
                    // instead of spinning on it.
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
    }
    debug!(session_id = actor.session_id(), "session task stopped");
}

async fn handle_command<S, P>(actor: &SessionActor<S, P>, command: SessionCommand)
where
    S: SessionStore,
    P: LlmProvider,
{
    // A dropped receiver means the caller abandoned the request; the work
    // is already done and is not rolled back.
    match command {
        SessionCommand::Chat {
            client_key,
            text,
            respond,
        } => {
            let result = actor.handle_chat_turn(&client_key, &text).await;
            let _ = respond.send(result);
        }
        SessionCommand::Schedule {
            client_key,
            due_at,
            prompt,
            respond,
        } => {
            let result = actor
                .handle_schedule_request(&client_key, due_at, &prompt)
                .await;
            let _ = respond.send(result);
        }
        SessionCommand::History { respond } => {
            let _ = respond.send(actor.handle_history_query().await);
        }
        SessionCommand::Clear { respond } => {
            let _ = respond.send(actor.handle_history_clear().await);
        }
    }
}
