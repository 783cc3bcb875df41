//! In-memory test doubles shared by the core test modules.
//!
//! `MemoryStore` implements [`SessionStore`] over hash maps with the same
//! lazy-TTL semantics as the SQLite implementation. `ScriptedProvider`
//! implements [`LlmProvider`] with a queue of canned outcomes and records
//! every request it receives for assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parlor_types::error::RepositoryError;
use parlor_types::llm::{CompletionRequest, CompletionResponse, LlmError, StopReason, Usage};

use crate::llm::LlmProvider;
use crate::storage::SessionStore;

struct StoredEntry {
    value: serde_json::Value,
    expires_at: Option<DateTime<Utc>>,
}

/// Hash-map backed [`SessionStore`] with lazy TTL expiry.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), StoredEntry>>,
    alarms: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session's armed alarm, for synchronous test assertions.
    pub fn alarm(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.alarms.lock().unwrap().get(session_id).copied()
    }
}

impl SessionStore for MemoryStore {
    async fn get(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        let mut entries = self.entries.lock().unwrap();
        let map_key = (session_id.to_string(), key.to_string());
        let expired = match entries.get(&map_key) {
            Some(entry) => entry.expires_at.is_some_and(|at| at <= Utc::now()),
            None => return Ok(None),
        };
        if expired {
            entries.remove(&map_key);
            return Ok(None);
        }
        Ok(Some(entries[&map_key].value.clone()))
    }

    async fn put(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        self.entries.lock().unwrap().insert(
            (session_id.to_string(), key.to_string()),
            StoredEntry {
                value: value.clone(),
                expires_at: None,
            },
        );
        Ok(())
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
        self.entries.lock().unwrap().insert(
            (session_id.to_string(), key.to_string()),
            StoredEntry {
                value: value.clone(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn delete(&self, session_id: &str, key: &str) -> Result<(), RepositoryError> {
        self.entries
            .lock()
            .unwrap()
            .remove(&(session_id.to_string(), key.to_string()));
        Ok(())
    }

    async fn get_alarm(&self, session_id: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(self.alarms.lock().unwrap().get(session_id).copied())
    }

    async fn set_alarm(&self, session_id: &str, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.alarms
            .lock()
            .unwrap()
            .insert(session_id.to_string(), at);
        Ok(())
    }
}

/// Scripted [`LlmProvider`]: pops one outcome per `complete` call and
/// records the requests it receives.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, String>>>,
    default_reply: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    /// Provider that answers every call with `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_reply: Some(reply.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider that plays back `outcomes` in order and errors once the
    /// script is exhausted.
    pub fn script(outcomes: Vec<Result<&str, &str>>) -> Self {
        Self {
            script: Mutex::new(
                outcomes
                    .into_iter()
                    .map(|o| o.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            default_reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of completion calls made.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.default_reply.clone().map(Ok));

        match outcome {
            Some(Ok(content)) => Ok(CompletionResponse {
                id: format!("msg-{}", self.call_count()),
                content,
                model: request.model.clone(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            }),
            Some(Err(message)) => Err(LlmError::Provider { message }),
            None => Err(LlmError::Provider {
                message: "script exhausted".to_string(),
            }),
        }
    }
}
