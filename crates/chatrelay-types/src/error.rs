use thiserror::Error;

use crate::message::MessageType;

/// Errors reported by source adapters.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("message type {0} is not supported by this source")]
    Unsupported(MessageType),

    #[error("source is closed")]
    Closed,
}

/// Errors reported by bot adapters.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("backend request failed: {0}")]
    Request(String),

    #[error("backend returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("cannot prepare message: {0}")]
    Prepare(String),
}

/// Errors reported by skills.
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("skill failed: {0}")]
    Failed(String),

    #[error("skill is missing capability '{0}'")]
    MissingCapability(String),
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {message}")]
    Read { path: String, message: String },

    #[error("malformed config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("agent '{agent}' references unknown {kind} instance '{name}'")]
    UnknownInstance {
        agent: String,
        kind: &'static str,
        name: String,
    },
}
