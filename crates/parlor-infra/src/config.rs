//! Configuration loading and data-directory resolution.
//!
//! The data directory comes from `PARLOR_DATA_DIR`, falling back to
//! `~/.parlor`. The configuration file is `config.toml` inside the data
//! directory; a missing file yields the defaults, a malformed one is an
//! error (silently ignoring a typo'd config is worse than failing).

use std::path::{Path, PathBuf};

use parlor_types::config::ParlorConfig;

/// Resolve the Parlor data directory.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PARLOR_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".parlor")
}

/// The SQLite database URL inside `data_dir`.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("parlor.db").display())
}

/// Load `config.toml` from `data_dir`, defaulting when absent.
pub fn load_config(data_dir: &Path) -> anyhow::Result<ParlorConfig> {
    let path = data_dir.join("config.toml");
    if !path.exists() {
        return Ok(ParlorConfig::default());
    }
    let raw = std::fs::read_to_string(&path)?;
    let config = toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("invalid config at {}: {e}", path.display()))?;
    Ok(config)
}
