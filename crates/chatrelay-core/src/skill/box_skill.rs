//! BoxSkill -- object-safe dynamic dispatch wrapper for Skill.

use std::future::Future;
use std::pin::Pin;

use chatrelay_types::error::SkillError;
use chatrelay_types::message::ChatMessage;

use super::port::Skill;
use super::{ReplyDraft, SkillContext, SkillParams};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`Skill`] with boxed futures.
pub trait SkillDyn: Send + Sync {
    fn name(&self) -> &str;

    fn params(&self) -> &SkillParams;

    fn apply_on_source_boxed<'a>(
        &'a self,
        message: ChatMessage,
        ctx: &'a SkillContext,
    ) -> BoxFuture<'a, Result<Option<ChatMessage>, SkillError>>;

    fn apply_on_reply_boxed<'a>(
        &'a self,
        draft: ReplyDraft,
        ctx: &'a SkillContext,
    ) -> BoxFuture<'a, Result<Option<ReplyDraft>, SkillError>>;
}

impl<T: Skill> SkillDyn for T {
    fn name(&self) -> &str {
        Skill::name(self)
    }

    fn params(&self) -> &SkillParams {
        Skill::params(self)
    }

    fn apply_on_source_boxed<'a>(
        &'a self,
        message: ChatMessage,
        ctx: &'a SkillContext,
    ) -> BoxFuture<'a, Result<Option<ChatMessage>, SkillError>> {
        Box::pin(self.apply_on_source(message, ctx))
    }

    fn apply_on_reply_boxed<'a>(
        &'a self,
        draft: ReplyDraft,
        ctx: &'a SkillContext,
    ) -> BoxFuture<'a, Result<Option<ReplyDraft>, SkillError>> {
        Box::pin(self.apply_on_reply(draft, ctx))
    }
}

/// Type-erased skill for runtime plugin selection.
pub struct BoxSkill {
    inner: Box<dyn SkillDyn + Send + Sync>,
}

impl BoxSkill {
    /// Wrap a concrete `Skill` in a type-erased box.
    pub fn new<T: Skill + 'static>(skill: T) -> Self {
        Self {
            inner: Box::new(skill),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn params(&self) -> &SkillParams {
        self.inner.params()
    }

    pub async fn apply_on_source(
        &self,
        message: ChatMessage,
        ctx: &SkillContext,
    ) -> Result<Option<ChatMessage>, SkillError> {
        self.inner.apply_on_source_boxed(message, ctx).await
    }

    pub async fn apply_on_reply(
        &self,
        draft: ReplyDraft,
        ctx: &SkillContext,
    ) -> Result<Option<ReplyDraft>, SkillError> {
        self.inner.apply_on_reply_boxed(draft, ctx).await
    }
}

impl std::fmt::Debug for BoxSkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxSkill").field("name", &self.name()).finish()
    }
}
