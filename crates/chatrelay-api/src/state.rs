//! Application state shared by the CLI commands.
//!
//! Resolves the data directory and the config file path. Commands load the
//! configuration through [`AppState::load_config`] so every command sees
//! the same validation.

use std::path::PathBuf;

use chatrelay_core::config::{CONFIG_FILE_NAME, load_config};
use chatrelay_types::config::RelayConfig;

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "CHATRELAY_HOME";

/// Resolve the data directory.
///
/// Order: `$CHATRELAY_HOME`, then `~/.chatrelay`, then `./.chatrelay`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".chatrelay");
    }

    PathBuf::from(".chatrelay")
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
}

impl AppState {
    /// State for an explicit `--config` path, or the file in the data directory.
    pub fn new(config: Option<PathBuf>) -> Self {
        let data_dir = resolve_data_dir();
        let config_path = config.unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME));
        Self {
            data_dir,
            config_path,
        }
    }

    /// Load and validate the configuration file.
    pub async fn load_config(&self) -> anyhow::Result<RelayConfig> {
        let config = load_config(&self.config_path).await?;
        Ok(config)
    }
}
