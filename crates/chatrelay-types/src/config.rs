//! Configuration types for ChatRelay.
//!
//! `RelayConfig` represents the top-level `config.toml`: agent definitions
//! plus the source, bot and skill instances they refer to. All agent options
//! have defaults so a minimal agent only names its sources and rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::history::HistoryOptions;
use crate::rule::{ContentRuleKind, MessageRule};

/// Top-level configuration.
///
/// Loaded from `~/.chatrelay/config.toml` unless overridden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub sources: Vec<PluginInstanceConfig>,
    #[serde(default)]
    pub bots: Vec<PluginInstanceConfig>,
    #[serde(default)]
    pub skills: Vec<PluginInstanceConfig>,
}

impl RelayConfig {
    /// Check cross references between agents and plugin instances.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sources = unique_names("source", &self.sources)?;
        let bots = unique_names("bot", &self.bots)?;
        let skills = unique_names("skill", &self.skills)?;

        let mut agent_names = HashSet::new();
        for agent in &self.agents {
            if !agent_names.insert(agent.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
            if agent.source_instance_names.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "agent '{}' has no source instances",
                    agent.name
                )));
            }
            for source in &agent.source_instance_names {
                if !sources.contains(source.as_str()) {
                    return Err(ConfigError::UnknownInstance {
                        agent: agent.name.clone(),
                        kind: "source",
                        name: source.clone(),
                    });
                }
            }
            for rule in &agent.bot_response_rule {
                if !bots.contains(rule.instance_name.as_str()) {
                    return Err(ConfigError::UnknownInstance {
                        agent: agent.name.clone(),
                        kind: "bot",
                        name: rule.instance_name.clone(),
                    });
                }
            }
            for rule in &agent.skill_rules {
                if !skills.contains(rule.instance_name.as_str()) {
                    return Err(ConfigError::UnknownInstance {
                        agent: agent.name.clone(),
                        kind: "skill",
                        name: rule.instance_name.clone(),
                    });
                }
            }
            for rule in agent.bot_response_rule.iter().chain(&agent.skill_rules) {
                check_patterns(&agent.name, rule)?;
            }
        }
        Ok(())
    }
}

/// Reject regex content rules that do not compile.
fn check_patterns(agent: &str, rule: &MessageRule) -> Result<(), ConfigError> {
    let patterns = [&rule.group_name_rule, &rule.content_filter]
        .into_iter()
        .flatten()
        .filter(|content| content.kind == ContentRuleKind::Regex);
    for content in patterns {
        if let Err(err) = regex::Regex::new(&content.content) {
            return Err(ConfigError::Invalid(format!(
                "agent '{agent}': rule for '{}' has an invalid regex: {err}",
                rule.instance_name
            )));
        }
    }
    Ok(())
}

fn unique_names<'a>(
    kind: &str,
    instances: &'a [PluginInstanceConfig],
) -> Result<HashSet<&'a str>, ConfigError> {
    let mut names = HashSet::new();
    for instance in instances {
        if !names.insert(instance.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate {kind} instance name '{}'",
                instance.name
            )));
        }
    }
    Ok(names)
}

/// One configured plugin instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInstanceConfig {
    /// Registered plugin kind, e.g. `"console"` or `"echo"`.
    pub kind: String,
    /// Unique instance name referenced by agents and rules.
    pub name: String,
    /// Opaque options handed to the plugin factory.
    #[serde(default = "empty_options")]
    pub options: serde_json::Value,
}

fn empty_options() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// How outbound fragments are paced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// Send as soon as the fragment is ready (still in order).
    Now,
    /// At most one send per `min_send_interval_ms`.
    #[default]
    Queue,
}

/// What happens to a question that arrives while the conversation is busy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowMode {
    /// Queue silently and answer after the current turn.
    #[default]
    Pool,
    /// Reply with `busy_tips` and drop the question.
    Tips,
    /// Queue and reply with `busy_tips`.
    PoolTips,
}

impl OverflowMode {
    pub fn queues(&self) -> bool {
        matches!(self, OverflowMode::Pool | OverflowMode::PoolTips)
    }

    pub fn tips(&self) -> bool {
        matches!(self, OverflowMode::Tips | OverflowMode::PoolTips)
    }
}

/// Sentinel `split_characters` value selecting pure length-based splitting.
pub const SPLIT_NONE: &str = "none";

/// One agent: a set of sources, routing rules and delivery policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,

    /// Source instances whose events this agent handles.
    #[serde(default)]
    pub source_instance_names: Vec<String>,
    #[serde(default)]
    pub bot_response_rule: Vec<MessageRule>,
    #[serde(default)]
    pub skill_rules: Vec<MessageRule>,

    // -- splitting --
    /// Minimum buffered characters before a fragment is cut; negative sends
    /// the whole answer as one fragment.
    #[serde(default = "default_buffer_words_min_count")]
    pub buffer_words_min_count: i64,
    #[serde(default = "default_max_split_count")]
    pub max_split_count: usize,
    #[serde(default = "default_max_split_count")]
    pub max_reasoning_split_count: usize,
    #[serde(default = "default_split_characters")]
    pub split_characters: Vec<String>,
    #[serde(default)]
    pub split_image_from_text: bool,
    #[serde(default)]
    pub remove_image_after_split: bool,

    // -- history --
    #[serde(default = "default_true")]
    pub history_enabled: bool,
    #[serde(default)]
    pub history: HistoryOptions,

    // -- delivery --
    #[serde(default)]
    pub send_mode: SendMode,
    #[serde(default = "default_min_send_interval_ms")]
    pub min_send_interval_ms: u64,

    // -- concurrency --
    #[serde(default)]
    pub overflow_mode: OverflowMode,
    #[serde(default = "default_busy_tips")]
    pub busy_tips: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_tips: Option<String>,

    // -- answers --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_answer: Option<String>,
    #[serde(default = "default_error_tips")]
    pub error_tips: String,
    #[serde(default)]
    pub send_error_detail: bool,

    // -- reasoning --
    #[serde(default)]
    pub send_reasoning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_prefix: Option<String>,
}

fn default_buffer_words_min_count() -> i64 {
    70
}

fn default_max_split_count() -> usize {
    3
}

fn default_split_characters() -> Vec<String> {
    vec!["！".to_string(), "。".to_string(), "？".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_min_send_interval_ms() -> u64 {
    1000
}

fn default_busy_tips() -> String {
    "Still working on your previous question, please wait a moment.".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_error_tips() -> String {
    "Sorry, something went wrong. Please try again later.".to_string()
}

impl AgentConfig {
    /// An agent with default options.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_instance_names: Vec::new(),
            bot_response_rule: Vec::new(),
            skill_rules: Vec::new(),
            buffer_words_min_count: default_buffer_words_min_count(),
            max_split_count: default_max_split_count(),
            max_reasoning_split_count: default_max_split_count(),
            split_characters: default_split_characters(),
            split_image_from_text: false,
            remove_image_after_split: false,
            history_enabled: true,
            history: HistoryOptions::default(),
            send_mode: SendMode::default(),
            min_send_interval_ms: default_min_send_interval_ms(),
            overflow_mode: OverflowMode::default(),
            busy_tips: default_busy_tips(),
            timeout_seconds: default_timeout_seconds(),
            timeout_tips: None,
            fallback_answer: None,
            error_tips: default_error_tips(),
            send_error_detail: false,
            send_reasoning: false,
            reasoning_prefix: None,
            content_prefix: None,
        }
    }

    /// Whether splitting ignores sentence boundaries.
    pub fn length_only_split(&self) -> bool {
        self.split_characters.len() == 1 && self.split_characters[0] == SPLIT_NONE
    }
}
