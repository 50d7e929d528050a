//! Conversation history types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    Bot,
    User,
}

impl fmt::Display for HistoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryRole::Bot => write!(f, "bot"),
            HistoryRole::User => write!(f, "user"),
        }
    }
}

/// One stored history message.
///
/// `data` is opaque to the relay: each bot stores whatever shape its backend
/// expects and reads it back on the next turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: HistoryRole,
    pub data: serde_json::Value,
}

impl HistoryMessage {
    pub fn user(data: impl Into<serde_json::Value>) -> Self {
        Self {
            role: HistoryRole::User,
            data: data.into(),
        }
    }

    pub fn bot(data: impl Into<serde_json::Value>) -> Self {
        Self {
            role: HistoryRole::Bot,
            data: data.into(),
        }
    }

    /// Text to count when no explicit counting text is given.
    pub fn counting_text(&self) -> String {
        match &self.data {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Limits of a per-conversation history buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryOptions {
    /// Entries older than this are evicted on the next insert or read.
    #[serde(default = "default_expire_in_seconds")]
    pub expire_in_seconds: u64,
    /// Upper bound on the summed word count of all entries.
    #[serde(default = "default_max_words_count")]
    pub max_words_count: usize,
    #[serde(default = "default_max_items_count")]
    pub max_items_count: usize,
}

fn default_expire_in_seconds() -> u64 {
    300
}

fn default_max_words_count() -> usize {
    10_240
}

fn default_max_items_count() -> usize {
    30
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            expire_in_seconds: default_expire_in_seconds(),
            max_words_count: default_max_words_count(),
            max_items_count: default_max_items_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_options_defaults() {
        let opts: HistoryOptions = toml::from_str("").unwrap();
        assert_eq!(opts, HistoryOptions::default());
        assert_eq!(opts.expire_in_seconds, 300);
        assert_eq!(opts.max_words_count, 10_240);
        assert_eq!(opts.max_items_count, 30);
    }

    #[test]
    fn test_counting_text_prefers_raw_string() {
        assert_eq!(HistoryMessage::user("你好").counting_text(), "你好");
        let structured = HistoryMessage::bot(serde_json::json!({"role": "assistant"}));
        assert_eq!(structured.counting_text(), r#"{"role":"assistant"}"#);
        assert_eq!(structured.role.to_string(), "bot");
    }
}
