//! Business logic and storage trait definitions for Parlor.
//!
//! This crate defines the "ports" (the session store and LLM provider
//! traits) that the infrastructure layer implements, plus everything that
//! runs behind them: the history ledger, the token-bucket limiter, the job
//! queue and wake-up scheduler, and the per-session actor and runtime.
//! It depends only on `parlor-types` -- never on `parlor-infra` or any
//! database/HTTP crate.

pub mod history;
pub mod limiter;
pub mod llm;
pub mod scheduler;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;
