//! Storage abstractions for Parlor.

pub mod session_store;

pub use session_store::{SessionStore, KEY_HISTORY, KEY_JOBS, KEY_NEXT_MAINTENANCE};
