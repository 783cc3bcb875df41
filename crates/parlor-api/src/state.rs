//! Application state wiring the session runtime together.
//!
//! AppState holds the concrete runtime instance used by the REST API.
//! The runtime is generic over the session store and LLM provider traits,
//! but AppState pins it to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use parlor_core::session::SessionRuntime;
use parlor_infra::config::{database_url, load_config, resolve_data_dir};
use parlor_infra::llm::AnthropicProvider;
use parlor_infra::sqlite::{DatabasePool, SqliteSessionStore};
use parlor_types::config::ParlorConfig;

/// Concrete type alias for the runtime pinned to infra implementations.
pub type ConcreteSessionRuntime = SessionRuntime<SqliteSessionStore, AnthropicProvider>;

/// Shared application state holding the session runtime.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ConcreteSessionRuntime>,
    pub config: Arc<ParlorConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to the DB, build the
    /// provider, wire the runtime.
    ///
    /// The Anthropic API key comes from `PARLOR_ANTHROPIC_API_KEY`,
    /// falling back to `ANTHROPIC_API_KEY`.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = Arc::new(load_config(&data_dir)?);

        // Initialize database
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;
        let store = Arc::new(SqliteSessionStore::new(db_pool.clone()));

        // Build the LLM provider
        let api_key = std::env::var("PARLOR_ANTHROPIC_API_KEY")
            .or_else(|_| std::env::var("ANTHROPIC_API_KEY"))
            .map_err(|_| {
                anyhow::anyhow!(
                    "missing API key: set PARLOR_ANTHROPIC_API_KEY or ANTHROPIC_API_KEY"
                )
            })?;
        let provider = Arc::new(AnthropicProvider::new(
            SecretString::from(api_key),
            config.llm.model.clone(),
        ));

        let runtime = Arc::new(SessionRuntime::new(store, provider, config.clone()));

        Ok(Self {
            runtime,
            config,
            data_dir,
            db_pool,
        })
    }
}
