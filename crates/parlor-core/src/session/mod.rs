//! Per-conversation session actor and its serializing runtime.

pub mod actor;
pub mod runtime;

pub use actor::{ChatReply, SessionActor};
pub use runtime::{SessionCommand, SessionRuntime};
