//! Shared domain types for Parlor.
//!
//! This crate contains the core domain types used across the Parlor chat
//! service: conversation turns, scheduled jobs, token-bucket state,
//! configuration, LLM request/response shapes, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod job;
pub mod limiter;
pub mod llm;
