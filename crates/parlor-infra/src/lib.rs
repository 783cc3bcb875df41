//! Infrastructure layer for Parlor.
//!
//! Contains implementations of the traits defined in `parlor-core`:
//! the SQLite session store (key-value namespace plus the per-session
//! alarm slot) and the Anthropic LLM provider, along with config-file
//! loading and data-directory resolution.

pub mod config;
pub mod llm;
pub mod sqlite;
