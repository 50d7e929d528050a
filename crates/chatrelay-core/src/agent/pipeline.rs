//! Reply pipeline: turns bot output into ordered outbound messages.
//!
//! Output is split into fragments, decorated with the configured prefixes,
//! optionally stripped of markdown images, passed through the reply skills
//! and finally submitted to the conversation's delivery queue. Receipts are
//! collected so the turn can wait for every fragment.

use std::sync::Arc;

use chatrelay_types::config::{AgentConfig, SendMode};
use chatrelay_types::error::SourceError;
use chatrelay_types::message::{ChatContent, ChatMessage, MediaRef, ReplyStatus};

use super::orchestrator::Agent;
use super::turn::{TurnError, TurnProgress};
use crate::bot::BotOutput;
use crate::delivery::{DeliveryReceipt, SlotOutcome};
use crate::reply::{Fragment, ResponseSplitter, SplitOptions, extract_markdown_images};
use crate::skill::{BoxSkill, ReplyDraft, SkillContext};
use crate::source::SourceParams;

pub(crate) type Receipt = DeliveryReceipt<Result<(), SourceError>>;

pub(crate) struct ReplyPipeline<'a> {
    agent: &'a Agent,
    source: &'a str,
    origin: Arc<ChatMessage>,
    ctx: &'a SkillContext,
    progress: &'a mut TurnProgress,
    source_params: SourceParams,
    /// Skills applied to each fragment.
    part_skills: Vec<Arc<BoxSkill>>,
    /// Skills applied once to the whole answer.
    complete_skills: Vec<Arc<BoxSkill>>,
    content: ResponseSplitter,
    reasoning: ResponseSplitter,
    full_text: String,
    answered: bool,
    reasoning_sent: bool,
    receipts: Vec<Receipt>,
}

impl<'a> ReplyPipeline<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        agent: &'a Agent,
        source: &'a str,
        source_params: SourceParams,
        origin: Arc<ChatMessage>,
        ctx: &'a SkillContext,
        progress: &'a mut TurnProgress,
        part_skills: Vec<Arc<BoxSkill>>,
        complete_skills: Vec<Arc<BoxSkill>>,
    ) -> Self {
        let config = agent.config();
        Self {
            agent,
            source,
            origin,
            ctx,
            progress,
            source_params,
            part_skills,
            complete_skills,
            content: ResponseSplitter::new(SplitOptions::for_content(config), ReplyStatus::Content),
            reasoning: ResponseSplitter::new(
                SplitOptions::for_reasoning(config),
                ReplyStatus::Reasoning,
            ),
            full_text: String::new(),
            answered: false,
            reasoning_sent: false,
            receipts: Vec::new(),
        }
    }

    fn config(&self) -> &AgentConfig {
        self.agent.config()
    }

    /// Whether the bot produced any answer content or media.
    pub(crate) fn answered(&self) -> bool {
        self.answered
    }

    pub(crate) fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Handle one streamed output.
    pub(crate) async fn accept(&mut self, output: BotOutput) -> Result<(), TurnError> {
        match output {
            BotOutput::Content(text) => {
                if text.is_empty() {
                    return Ok(());
                }
                self.answered = true;
                self.flush_reasoning().await?;
                self.full_text.push_str(&text);
                for fragment in self.content.push(&text) {
                    self.emit(fragment).await?;
                }
            }
            BotOutput::Reasoning(text) => {
                if !self.config().send_reasoning || text.is_empty() {
                    return Ok(());
                }
                for fragment in self.reasoning.push(&text) {
                    self.emit(fragment).await?;
                }
            }
            BotOutput::Media(content) => {
                self.answered = true;
                self.progress.deliver_fragment();
                self.submit(ReplyDraft {
                    content,
                    status: ReplyStatus::Content,
                    full_text: None,
                })
                .await?;
            }
        }
        Ok(())
    }

    /// Note that the bot call returned with nothing streamed.
    pub(crate) fn await_answer(&mut self) {
        self.progress.await_answer();
    }

    /// Handle the complete answer of a blocking bot.
    ///
    /// An empty answer counts as answered and sends nothing.
    pub(crate) async fn accept_answer(&mut self, text: &str) -> Result<(), TurnError> {
        self.answered = true;
        self.full_text.push_str(text);
        for fragment in self.content.push(text) {
            self.emit(fragment).await?;
        }
        Ok(())
    }

    /// Send the configured fallback instead of an answer.
    pub(crate) async fn accept_fallback(&mut self, text: &str) -> Result<(), TurnError> {
        for fragment in self.content.push(text) {
            self.emit(fragment).await?;
        }
        Ok(())
    }

    /// Flush both splitters and run the complete-status skills.
    pub(crate) async fn finish(&mut self) -> Result<(), TurnError> {
        self.flush_reasoning().await?;
        if let Some(fragment) = self.content.finish() {
            self.emit(fragment).await?;
        }

        if !self.answered || self.full_text.is_empty() {
            return Ok(());
        }
        for skill in self.complete_skills.clone() {
            let draft = ReplyDraft {
                content: ChatContent::text(self.full_text.clone()),
                status: ReplyStatus::Content,
                full_text: Some(self.full_text.clone()),
            };
            let applied = skill
                .apply_on_reply(draft, self.ctx)
                .await
                .map_err(|error| TurnError::Skill {
                    skill: skill.name().to_string(),
                    error,
                })?;
            if let Some(draft) = applied {
                self.enqueue(draft)?;
            }
        }
        Ok(())
    }

    /// Wait until every submitted message was handled by the source.
    ///
    /// Returns the number of delivered messages, or the first delivery
    /// error. Later messages are still attempted after a failure.
    pub(crate) async fn wait_delivered(&mut self) -> Result<usize, TurnError> {
        let mut delivered = 0;
        let mut first_error = None;
        for receipt in self.receipts.drain(..) {
            match receipt.wait().await {
                SlotOutcome::Delivered(Ok(())) => delivered += 1,
                SlotOutcome::Delivered(Err(err)) => {
                    first_error.get_or_insert(TurnError::Delivery(err));
                }
                SlotOutcome::Failed(message) => {
                    first_error.get_or_insert(TurnError::Delivery(SourceError::Send(message)));
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(delivered),
        }
    }

    async fn flush_reasoning(&mut self) -> Result<(), TurnError> {
        if let Some(fragment) = self.reasoning.finish() {
            self.emit(fragment).await?;
        }
        Ok(())
    }

    async fn emit(&mut self, fragment: Fragment) -> Result<(), TurnError> {
        self.progress.deliver_fragment();

        let mut text = fragment.text;
        let mut images = Vec::new();
        match fragment.status {
            ReplyStatus::Reasoning => {
                if fragment.index == 0 {
                    if let Some(prefix) = &self.config().reasoning_prefix {
                        text.insert_str(0, prefix);
                    }
                }
                self.reasoning_sent = true;
            }
            ReplyStatus::Content => {
                if fragment.index == 0 && self.reasoning_sent {
                    if let Some(prefix) = &self.config().content_prefix {
                        text.insert_str(0, prefix);
                    }
                }
                if self.config().split_image_from_text {
                    let found = extract_markdown_images(&text);
                    if self.config().remove_image_after_split {
                        text = found.stripped;
                    }
                    images = found.urls;
                }
            }
        }

        if !text.trim().is_empty() {
            self.submit(ReplyDraft::text(text, fragment.status)).await?;
        }
        for url in images {
            self.submit(ReplyDraft {
                content: ChatContent::Image(MediaRef::from_url(url)),
                status: ReplyStatus::Content,
                full_text: None,
            })
            .await?;
        }
        Ok(())
    }

    /// Run the per-fragment skills, then enqueue what is left.
    async fn submit(&mut self, mut draft: ReplyDraft) -> Result<(), TurnError> {
        for skill in &self.part_skills {
            let applied = skill
                .apply_on_reply(draft, self.ctx)
                .await
                .map_err(|error| TurnError::Skill {
                    skill: skill.name().to_string(),
                    error,
                })?;
            match applied {
                Some(next) => draft = next,
                None => {
                    tracing::debug!(skill = skill.name(), "reply dropped by skill");
                    return Ok(());
                }
            }
        }
        self.enqueue(draft)
    }

    fn enqueue(&mut self, draft: ReplyDraft) -> Result<(), TurnError> {
        let Some(content) = self.source_params.sendable(draft.content) else {
            tracing::debug!(source = self.source, "reply type not supported by source, skipped");
            return Ok(());
        };
        let message = ChatMessage::reply_to(&self.origin, content, draft.status);
        let now = self.config().send_mode == SendMode::Now;
        let receipt =
            self.agent
                .enqueue(self.source, message, now, Some(Arc::clone(&self.origin)))?;
        self.receipts.push(receipt);
        Ok(())
    }
}
