//! Skill trait definition.

use std::future::Future;

use chatrelay_types::error::SkillError;
use chatrelay_types::message::ChatMessage;

use super::{ReplyDraft, SkillContext, SkillParams};

/// Trait for content transforms (keyword answers, speech synthesis, image
/// extraction, moderation).
///
/// Both hooks default to passing their input through unchanged.
pub trait Skill: Send + Sync {
    /// Instance name, unique within a relay.
    fn name(&self) -> &str;

    /// Which hooks the agent calls.
    fn params(&self) -> &SkillParams;

    /// Rewrite the inbound message. `Ok(None)` vetoes the turn.
    fn apply_on_source(
        &self,
        message: ChatMessage,
        _ctx: &SkillContext,
    ) -> impl Future<Output = Result<Option<ChatMessage>, SkillError>> + Send {
        async move { Ok(Some(message)) }
    }

    /// Rewrite one outbound reply. `Ok(None)` drops it.
    fn apply_on_reply(
        &self,
        draft: ReplyDraft,
        _ctx: &SkillContext,
    ) -> impl Future<Output = Result<Option<ReplyDraft>, SkillError>> + Send {
        async move { Ok(Some(draft)) }
    }
}
