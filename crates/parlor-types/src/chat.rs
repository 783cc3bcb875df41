//! Conversation turn types for Parlor.
//!
//! A conversation is an ordered sequence of [`Turn`]s, owned by exactly one
//! session actor. Turns are immutable once appended; ordering is append
//! order, which equals chronological order under the single-writer model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Role of a turn in a conversation.
///
/// `System` is used for synthetic bookkeeping turns (e.g., the marker
/// recording a pending scheduled job), not for the LLM system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::System => write!(f, "system"),
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for TurnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(TurnRole::System),
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            other => Err(format!("invalid turn role: '{other}'")),
        }
    }
}

/// A single turn within a conversation.
///
/// Immutable once appended. The timestamp is assigned by the session actor
/// at append time, so timestamps are monotonic within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn with the given role and content, stamped `now`.
    pub fn new(role: TurnRole, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now,
        }
    }

    /// Content length in Unicode scalar values, as counted by the
    /// history size budget.
    pub fn content_len(&self) -> usize {
        self.content.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_role_roundtrip() {
        for role in [TurnRole::System, TurnRole::User, TurnRole::Assistant] {
            let s = role.to_string();
            let parsed: TurnRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_turn_role_serde() {
        let json = serde_json::to_string(&TurnRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let parsed: TurnRole = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TurnRole::Assistant);
    }

    #[test]
    fn test_turn_serialize() {
        let turn = Turn::new(TurnRole::User, "hello", Utc::now());
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"content\":\"hello\""));
    }

    #[test]
    fn test_content_len_counts_chars_not_bytes() {
        let turn = Turn::new(TurnRole::User, "héllo", Utc::now());
        assert_eq!(turn.content_len(), 5);
        assert_eq!(turn.content.len(), 6);
    }
}
