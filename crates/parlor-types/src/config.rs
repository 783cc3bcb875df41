//! Global configuration types for Parlor.
//!
//! `ParlorConfig` represents the top-level `config.toml` that controls
//! history retention, rate-limit policies, scheduler timing, and the LLM
//! model settings. All fields have sensible defaults so an empty file (or
//! no file at all) yields a working configuration.

use serde::{Deserialize, Serialize};

use crate::limiter::RatePolicy;

/// Top-level configuration for the Parlor service.
///
/// Loaded from `$PARLOR_DATA_DIR/config.toml` (default `~/.parlor/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParlorConfig {
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// History retention limits, applied age -> count -> size on every persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Turns older than this are dropped.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
    /// Maximum number of retained turns; oldest dropped first.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Maximum total content length (Unicode scalars) across all turns.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_age_days() -> u32 {
    14
}

fn default_max_turns() -> usize {
    300
}

fn default_max_chars() -> usize {
    120_000
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
            max_turns: default_max_turns(),
            max_chars: default_max_chars(),
        }
    }
}

/// Per-client admission policies.
///
/// The schedule policy is stricter than the chat policy because each
/// admitted schedule call can trigger an inference invocation later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Seconds of inactivity before a persisted bucket expires and a
    /// fresh one (full burst) is created.
    #[serde(default = "default_bucket_ttl_secs")]
    pub bucket_ttl_secs: u64,
    #[serde(default = "default_chat_policy")]
    pub chat: RatePolicy,
    #[serde(default = "default_schedule_policy")]
    pub schedule: RatePolicy,
}

fn default_bucket_ttl_secs() -> u64 {
    180
}

fn default_chat_policy() -> RatePolicy {
    RatePolicy {
        rate_per_minute: 30,
        burst: 10,
    }
}

fn default_schedule_policy() -> RatePolicy {
    RatePolicy {
        rate_per_minute: 6,
        burst: 3,
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            bucket_ttl_secs: default_bucket_ttl_secs(),
            chat: default_chat_policy(),
            schedule: default_schedule_policy(),
        }
    }
}

/// Wake-up scheduler timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Schedule requests due sooner than this run inline instead of
    /// through the timer path.
    #[serde(default = "default_immediate_horizon_secs")]
    pub immediate_horizon_secs: u64,
    /// Period of the recurring retention-maintenance pass.
    #[serde(default = "default_maintenance_period_hours")]
    pub maintenance_period_hours: u64,
}

fn default_immediate_horizon_secs() -> u64 {
    30
}

fn default_maintenance_period_hours() -> u64 {
    24
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            immediate_horizon_secs: default_immediate_horizon_secs(),
            maintenance_period_hours: default_maintenance_period_hours(),
        }
    }
}

/// LLM invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// System prompt prepended to every completion request.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Maximum length of a user-supplied message or schedule prompt.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1_024
}

fn default_max_message_chars() -> usize {
    4_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            max_message_chars: default_max_message_chars(),
        }
    }
}
