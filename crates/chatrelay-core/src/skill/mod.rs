//! Skill port: content transforms applied around bot invocation.
//!
//! A skill may rewrite or veto the inbound message before the bot sees it
//! (`apply_on_source`) and rewrite or drop each outbound reply
//! (`apply_on_reply`). Skills compose through [`SkillContext`], which gives
//! them the conversation and a way to answer directly.

pub mod box_skill;
pub mod port;

use chatrelay_types::message::{ChatContent, ChatMessage, ConversationKey, ReplyStatus};
use serde::{Deserialize, Serialize};

use crate::agent::ReplyHandle;

pub use box_skill::{BoxSkill, SkillDyn};
pub use port::Skill;

/// Capabilities a skill declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillParams {
    #[serde(default = "default_true")]
    pub apply_on_source: bool,
    #[serde(default = "default_true")]
    pub apply_on_reply: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SkillParams {
    fn default() -> Self {
        Self {
            apply_on_source: true,
            apply_on_reply: true,
        }
    }
}

/// One outbound reply as seen by a reply skill.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyDraft {
    pub content: ChatContent,
    pub status: ReplyStatus,
    /// The whole accumulated answer; only set once the reply stream has
    /// completed.
    pub full_text: Option<String>,
}

impl ReplyDraft {
    pub fn text(text: impl Into<String>, status: ReplyStatus) -> Self {
        Self {
            content: ChatContent::text(text),
            status,
            full_text: None,
        }
    }
}

/// What a skill knows about the turn it runs in.
#[derive(Debug, Clone)]
pub struct SkillContext {
    pub key: ConversationKey,
    /// The inbound message that started the turn.
    pub origin: ChatMessage,
    /// Sends messages into the same conversation.
    pub reply: ReplyHandle,
}
