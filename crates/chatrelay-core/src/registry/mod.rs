//! Plugin registry: maps plugin kinds to factories and caches instances.
//!
//! Plugins are registered at startup by the embedding binary; there is no
//! dynamic code loading.

pub mod factory;

use chatrelay_types::config::RelayConfig;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::bot::{BotParams, BoxBot};
use crate::skill::{BoxSkill, SkillParams};
use crate::source::{BoxSource, SourceParams};

pub use factory::{Factory, FactoryRegistry};

/// Errors from plugin registration and instantiation.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown {category} kind '{kind}'")]
    UnknownKind { category: &'static str, kind: String },

    #[error("{category} kind '{kind}' is already registered")]
    DuplicateKind { category: &'static str, kind: String },

    #[error("{category} instance '{name}' already exists")]
    DuplicateInstance { category: &'static str, name: String },

    #[error("invalid options for '{name}': {message}")]
    InvalidOptions { name: String, message: String },

    #[error("{category} instance '{name}' was never created")]
    MissingInstance { category: &'static str, name: String },
}

/// Parse a plugin's opaque options table into its own options type.
pub fn parse_options<T: DeserializeOwned>(
    name: &str,
    options: &serde_json::Value,
) -> Result<T, RegistryError> {
    let value = if options.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        options.clone()
    };
    serde_json::from_value(value).map_err(|e| RegistryError::InvalidOptions {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// Registered source, bot and skill kinds plus their live instances.
pub struct PluginRegistry {
    pub sources: FactoryRegistry<BoxSource, SourceParams>,
    pub bots: FactoryRegistry<BoxBot, BotParams>,
    pub skills: FactoryRegistry<BoxSkill, SkillParams>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            sources: FactoryRegistry::new("source"),
            bots: FactoryRegistry::new("bot"),
            skills: FactoryRegistry::new("skill"),
        }
    }

    /// Create every plugin instance declared in `config`.
    pub fn instantiate(&mut self, config: &RelayConfig) -> Result<(), RegistryError> {
        for instance in &config.sources {
            self.sources
                .create(&instance.kind, &instance.name, &instance.options)?;
        }
        for instance in &config.bots {
            self.bots
                .create(&instance.kind, &instance.name, &instance.options)?;
        }
        for instance in &config.skills {
            self.skills
                .create(&instance.kind, &instance.name, &instance.options)?;
        }
        tracing::debug!(
            sources = config.sources.len(),
            bots = config.bots.len(),
            skills = config.skills.len(),
            "plugin instances created"
        );
        Ok(())
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("sources", &self.sources.kinds())
            .field("bots", &self.bots.kinds())
            .field("skills", &self.skills.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct EchoOptions {
        #[serde(default)]
        latency_ms: u64,
    }

    #[test]
    fn parse_options_accepts_null_and_tables() {
        let parsed: EchoOptions = parse_options("echo", &serde_json::Value::Null).unwrap();
        assert_eq!(parsed, EchoOptions { latency_ms: 0 });

        let parsed: EchoOptions =
            parse_options("echo", &serde_json::json!({"latency_ms": 25})).unwrap();
        assert_eq!(parsed.latency_ms, 25);
    }

    #[test]
    fn parse_options_reports_instance_name() {
        let err = parse_options::<EchoOptions>("echo-1", &serde_json::json!({"latency_ms": "slow"}))
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid options for 'echo-1'"));
    }

    #[test]
    fn instantiate_unknown_kind_fails() {
        let mut registry = PluginRegistry::new();
        let config: RelayConfig = toml::from_str(
            r#"
[[bots]]
kind = "missing"
name = "b"
"#,
        )
        .unwrap();
        let err = registry.instantiate(&config).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownKind { category: "bot", .. }));
    }
}
