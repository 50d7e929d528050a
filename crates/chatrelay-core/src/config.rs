//! Configuration loader for ChatRelay.
//!
//! Reads `config.toml` and deserializes it into [`RelayConfig`]. A missing
//! file yields the defaults; a file that exists but cannot be read, parsed
//! or validated is an error, so an agent definition is never silently
//! ignored.

use std::path::Path;

use chatrelay_types::config::RelayConfig;
use chatrelay_types::error::ConfigError;

/// File name of the configuration inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Load and validate the configuration at `path`.
pub async fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return Ok(RelayConfig::default());
        }
        Err(err) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                message: err.to_string(),
            });
        }
    };

    let config = parse_config(&content)?;
    tracing::debug!(
        agents = config.agents.len(),
        "Loaded config from {}",
        path.display()
    );
    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<RelayConfig, ConfigError> {
    let config: RelayConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
