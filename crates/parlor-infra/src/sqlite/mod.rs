//! SQLite-backed persistence for Parlor.

pub mod pool;
pub mod store;

pub use pool::DatabasePool;
pub use store::SqliteSessionStore;
