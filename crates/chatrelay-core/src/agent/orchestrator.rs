//! Agent orchestrator: answers inbound messages on its sources.
//!
//! One turn runs through these steps:
//! 1. match the bot rule and the skill rules
//! 2. admit, queue or reject on the conversation
//! 3. apply source-side skills
//! 4. prepare the message and call the bot
//! 5. split, transform and deliver the answer in order
//! 6. record history and release the conversation
//!
//! An agent is cheap to clone; every clone drives the same conversations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chatrelay_types::config::{AgentConfig, SendMode};
use chatrelay_types::event::{RelayEvent, TurnState};
use chatrelay_types::history::HistoryMessage;
use chatrelay_types::message::{ChatContent, ChatMessage, ConversationKey, ReplyStatus, UserInfo};
use chatrelay_types::error::{BotError, SourceError};
use chatrelay_types::rule::{GroupMode, MessageRule, SkillWhenReplyStatus};
use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

use super::handle::{Outbound, ReplyHandle, SourceSink};
use super::notice::Notice;
use super::pipeline::{Receipt, ReplyPipeline};
use super::turn::{TurnError, TurnOutcome, TurnProgress};
use crate::bot::{BoxBot, ContentReceiver};
use crate::conversation::{Admission, ConversationStateTracker};
use crate::delivery::{OrderedDeliveryQueue, SendThrottle, SlotOutcome};
use crate::event::{EventBus, EventFilter, FilteredReceiver};
use crate::history::HistoryMessageManager;
use crate::registry::{PluginRegistry, RegistryError};
use crate::rule::{SenderInfo, addressed_to_me, match_all, match_rule};
use crate::skill::{BoxSkill, SkillContext};
use crate::source::BoxSource;

type DeliveryQueue = OrderedDeliveryQueue<Outbound, Result<(), SourceError>>;

/// Plugin instances an agent works with, keyed by instance name.
#[derive(Debug, Default, Clone)]
pub struct AgentPlugins {
    pub sources: HashMap<String, Arc<BoxSource>>,
    pub bots: HashMap<String, Arc<BoxBot>>,
    pub skills: HashMap<String, Arc<BoxSkill>>,
}

/// A question held while it waits for admission.
#[derive(Debug, Clone)]
struct QueuedQuestion {
    source: String,
    message: ChatMessage,
    rule: MessageRule,
    skill_rules: Vec<MessageRule>,
}

enum Admitted {
    Run {
        key: ConversationKey,
        progress: TurnProgress,
        question: QueuedQuestion,
    },
    Settled(TurnOutcome),
}

/// An admitted turn that has not started yet.
struct PendingTurn {
    key: ConversationKey,
    turn_id: Uuid,
    progress: TurnProgress,
    question: QueuedQuestion,
    span: Span,
}

enum Received {
    Run(PendingTurn),
    Settled(TurnOutcome),
}

struct AgentInner {
    config: AgentConfig,
    plugins: AgentPlugins,
    tracker: ConversationStateTracker<QueuedQuestion>,
    histories: DashMap<ConversationKey, HistoryMessageManager>,
    queues: DashMap<ConversationKey, Arc<DeliveryQueue>>,
    throttle: Arc<SendThrottle>,
    bus: EventBus,
    cancel: CancellationToken,
}

/// Routes messages of its sources to bots and delivers the answers.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    pub fn new(config: AgentConfig, plugins: AgentPlugins, bus: EventBus) -> Self {
        let throttle = match config.send_mode {
            SendMode::Now => SendThrottle::disabled(),
            SendMode::Queue => SendThrottle::new(Duration::from_millis(config.min_send_interval_ms)),
        };
        Self {
            inner: Arc::new(AgentInner {
                tracker: ConversationStateTracker::new(config.overflow_mode),
                config,
                plugins,
                histories: DashMap::new(),
                queues: DashMap::new(),
                throttle: Arc::new(throttle),
                bus,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Build an agent from the instances created in `registry`.
    pub fn from_registry(
        config: AgentConfig,
        registry: &PluginRegistry,
        bus: EventBus,
    ) -> Result<Self, RegistryError> {
        let mut plugins = AgentPlugins::default();
        for name in &config.source_instance_names {
            let source = registry.sources.instance(name).ok_or_else(|| missing("source", name))?;
            plugins.sources.insert(name.clone(), source);
        }
        for rule in &config.bot_response_rule {
            let bot = registry
                .bots
                .instance(&rule.instance_name)
                .ok_or_else(|| missing("bot", &rule.instance_name))?;
            plugins.bots.insert(rule.instance_name.clone(), bot);
        }
        for rule in &config.skill_rules {
            let skill = registry
                .skills
                .instance(&rule.instance_name)
                .ok_or_else(|| missing("skill", &rule.instance_name))?;
            plugins.skills.insert(rule.instance_name.clone(), skill);
        }
        Ok(Self::new(config, plugins, bus))
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Events published by this agent.
    pub fn subscribe(&self) -> FilteredReceiver {
        self.inner.bus.subscribe_agent(self.name())
    }

    /// Events of one conversation of this agent.
    pub fn subscribe_conversation(&self, key: &ConversationKey) -> FilteredReceiver {
        self.inner
            .bus
            .subscribe_filtered(EventFilter::agent(self.name()).with_key(key))
    }

    /// Whether messages of `source` are handled by this agent.
    pub fn handles_source(&self, source: &str) -> bool {
        self.inner
            .config
            .source_instance_names
            .iter()
            .any(|name| name == source)
    }

    /// Conversations with an active or waiting turn.
    pub fn active_conversations(&self) -> Vec<ConversationKey> {
        self.inner.tracker.active_conversations()
    }

    /// Snapshot of the history kept for `key`, expired entries removed.
    pub fn history(&self, key: &ConversationKey) -> Vec<HistoryMessage> {
        let messages = self
            .inner
            .histories
            .get_mut(key)
            .map(|mut history| history.history_messages())
            .unwrap_or_default();
        if messages.is_empty() {
            self.inner
                .histories
                .remove_if(key, |_, history| history.is_empty());
        }
        messages
    }

    /// Conversations that currently keep a history buffer.
    pub fn tracked_histories(&self) -> usize {
        self.inner.histories.len()
    }

    /// Drop the buffers of conversations whose entries have all expired.
    fn prune_histories(&self) {
        let before = self.inner.histories.len();
        self.inner
            .histories
            .retain(|_, history| history.has_live_entries());
        let pruned = before.saturating_sub(self.inner.histories.len());
        if pruned > 0 {
            debug!(pruned, "expired histories dropped");
        }
    }

    /// Forget the history of `key`, here and in every bot.
    pub async fn clear_history(&self, key: &ConversationKey) {
        self.inner.histories.remove(key);
        for bot in self.inner.plugins.bots.values() {
            bot.clear_history_requested(key).await;
        }
        info!(agent = self.name(), conversation = %key, "history cleared");
        self.publish(RelayEvent::HistoryCleared {
            agent: self.name().to_string(),
            key: key.clone(),
        });
    }

    /// Stop accepting messages.
    ///
    /// Running turns finish; queued questions are still answered. Returns
    /// the conversations that were active at the time of the call.
    pub fn dispose(&self) -> Vec<ConversationKey> {
        self.inner.cancel.cancel();
        let active = self.active_conversations();
        info!(agent = self.name(), active = active.len(), "agent disposed");
        active
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// A handle answering into the conversation of `origin`.
    pub fn reply_handle(&self, source: &str, origin: ChatMessage) -> Result<ReplyHandle, TurnError> {
        self.source(source)?;
        Ok(ReplyHandle::new(self.clone(), source, Arc::new(origin)))
    }

    /// Send `message` on `source` and wait until the source handled it.
    ///
    /// The message shares the ordered queue of its conversation. `now`
    /// skips the send throttle.
    pub async fn send_message(
        &self,
        source: &str,
        message: ChatMessage,
        now: bool,
        from: Option<Arc<ChatMessage>>,
    ) -> Result<(), TurnError> {
        let receipt = self.enqueue(source, message, now, from)?;
        match receipt.wait().await {
            SlotOutcome::Delivered(result) => result.map_err(TurnError::Delivery),
            SlotOutcome::Failed(message) => {
                Err(TurnError::Delivery(SourceError::Send(message)))
            }
        }
    }

    /// Put `message` on the ordered queue of its conversation.
    pub(crate) fn enqueue(
        &self,
        source: &str,
        message: ChatMessage,
        now: bool,
        from: Option<Arc<ChatMessage>>,
    ) -> Result<Receipt, TurnError> {
        let target = self.source(source)?;
        let key = match &from {
            Some(origin) => ConversationKey::for_message(source, origin),
            None => ConversationKey::for_message(source, &message),
        };
        let queue = self.queue_for(&key, target);
        Ok(queue.submit_ready(Outbound { message, from, now }))
    }

    /// Handle one inbound message of `source`.
    ///
    /// Returns once the turn finished, was queued or was dropped. A queued
    /// question is answered later in the background.
    pub async fn handle_message(
        &self,
        source: &str,
        message: ChatMessage,
    ) -> Result<TurnOutcome, TurnError> {
        match self.receive(source, message)? {
            Received::Settled(outcome) => Ok(outcome),
            Received::Run(turn) => self.run_pending(turn).await,
        }
    }

    /// Match and admit `message` now, then answer it in the background.
    ///
    /// Admission happens before this returns, so messages spawned in
    /// arrival order are admitted in arrival order.
    pub fn spawn_message(
        &self,
        source: &str,
        message: ChatMessage,
    ) -> JoinHandle<Result<TurnOutcome, TurnError>> {
        let received = self.receive(source, message);
        let agent = self.clone();
        tokio::spawn(async move {
            match received? {
                Received::Settled(outcome) => Ok(outcome),
                Received::Run(turn) => agent.run_pending(turn).await,
            }
        })
    }

    async fn run_pending(&self, turn: PendingTurn) -> Result<TurnOutcome, TurnError> {
        let PendingTurn {
            key,
            turn_id,
            progress,
            question,
            span,
        } = turn;
        self.run_admitted(progress, key, turn_id, question)
            .instrument(span)
            .await
    }

    /// Match rules and ask for admission. Never waits.
    fn receive(&self, source: &str, message: ChatMessage) -> Result<Received, TurnError> {
        if self.is_disposed() {
            return Err(TurnError::Stopped);
        }
        if !self.handles_source(source) {
            return Ok(Received::Settled(TurnOutcome::Ignored));
        }
        let plugin = self.source(source)?;
        if !plugin.params().can_receive(&message) {
            debug!(
                source,
                message_type = message.message_type().as_str(),
                group = message.is_group_chat,
                "message not supported by source"
            );
            return Ok(Received::Settled(TurnOutcome::Ignored));
        }
        let key = ConversationKey::for_message(source, &message);
        let turn_id = Uuid::now_v7();
        let span = info_span!(
            "turn",
            agent = %self.name(),
            conversation = %key,
            %turn_id,
        );
        let received = span.in_scope(|| self.admit(source, message, key, turn_id))?;
        Ok(match received {
            Admitted::Settled(outcome) => Received::Settled(outcome),
            Admitted::Run {
                key,
                progress,
                question,
            } => Received::Run(PendingTurn {
                key,
                turn_id,
                progress,
                question,
                span,
            }),
        })
    }

    fn admit(
        &self,
        source_name: &str,
        message: ChatMessage,
        key: ConversationKey,
        turn_id: Uuid,
    ) -> Result<Admitted, TurnError> {
        let config = &self.inner.config;
        let source = self.source(source_name)?;
        self.publish(RelayEvent::MessageReceived {
            agent: self.name().to_string(),
            key: key.clone(),
            message_type: message.message_type(),
        });

        let mut progress = TurnProgress::new(self.name(), &key, turn_id, TurnState::Idle, self.bus());
        progress.advance(TurnState::Matching);

        let user = sender_of(&message);
        let sender = SenderInfo {
            user: &user,
            me: source.me(),
            at_field: source.params().at_field,
        };
        let Some(rule) = match_rule(&config.bot_response_rule, &message, sender).cloned() else {
            progress.advance(TurnState::Idle);
            self.dropped(&key, "no rule matched");
            if addressed_to_me(&message, sender) {
                if let Some(text) = Notice::Fallback.render(config) {
                    self.post_text(source_name, &Arc::new(message), text);
                }
            }
            return Err(TurnError::RuleMismatch);
        };
        if message.is_group_chat && rule.group_mode == GroupMode::Deny {
            progress.advance(TurnState::Dropped);
            progress.advance(TurnState::Idle);
            let reason = format!("group messages denied by rule for '{}'", rule.instance_name);
            self.dropped(&key, &reason);
            return Ok(Admitted::Settled(TurnOutcome::Dropped { reason }));
        }
        let skill_rules: Vec<MessageRule> = match_all(&config.skill_rules, &message, sender)
            .into_iter()
            .cloned()
            .collect();

        let busy_origin = self
            .inner
            .tracker
            .overflow()
            .tips()
            .then(|| Arc::new(message.clone()));
        let allow_multi = self
            .inner
            .plugins
            .bots
            .get(&rule.instance_name)
            .is_some_and(|bot| bot.params().allow_multi_active_chat);
        let question = QueuedQuestion {
            source: source_name.to_string(),
            message,
            rule,
            skill_rules,
        };

        match self.inner.tracker.admit(&key, turn_id, question, allow_multi) {
            Admission::Admitted(question) => {
                progress.advance(TurnState::Admitted);
                Ok(Admitted::Run {
                    key,
                    progress,
                    question,
                })
            }
            Admission::Queued { pending } => {
                progress.advance(TurnState::Queued);
                debug!(pending, "question queued behind active turn");
                self.publish(RelayEvent::QuestionQueued {
                    agent: self.name().to_string(),
                    key: key.clone(),
                    turn_id,
                    pending,
                });
                if let (Some(origin), Some(text)) = (busy_origin, Notice::Busy.render(config)) {
                    self.post_text(source_name, &origin, text);
                }
                Ok(Admitted::Settled(TurnOutcome::Queued { pending }))
            }
            Admission::Rejected(question) => {
                progress.advance(TurnState::Dropped);
                progress.advance(TurnState::Idle);
                self.dropped(&key, "conversation busy");
                let origin = Arc::new(question.message);
                if let Some(text) = Notice::Busy.render(config) {
                    self.post_text(source_name, &origin, text);
                }
                Err(TurnError::AdmissionRejected("conversation busy".to_string()))
            }
        }
    }

    /// Run an admitted turn to the end and release its slot.
    async fn run_admitted(
        &self,
        mut progress: TurnProgress,
        key: ConversationKey,
        turn_id: Uuid,
        question: QueuedQuestion,
    ) -> Result<TurnOutcome, TurnError> {
        let started = Instant::now();
        let origin = Arc::new(question.message.clone());
        let watchdog = self.start_watchdog(&key, turn_id, &question.source, &origin);

        let result = self
            .execute_turn(&mut progress, &key, &question, &origin)
            .await;
        drop(watchdog);

        match &result {
            Ok(TurnOutcome::Completed { fragments }) => {
                progress.finish();
                info!(fragments, "turn completed");
                self.publish(RelayEvent::TurnCompleted {
                    agent: self.name().to_string(),
                    key: key.clone(),
                    turn_id,
                    fragments: *fragments,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
            Ok(_) => progress.advance(TurnState::Idle),
            Err(err) => {
                progress.fail();
                warn!("turn failed: {err}");
                self.publish(RelayEvent::TurnFailed {
                    agent: self.name().to_string(),
                    key: key.clone(),
                    turn_id,
                    error: err.to_string(),
                });
                if !matches!(err, TurnError::Delivery(_)) {
                    if let Some(text) = Notice::Error(err.to_string()).render(&self.inner.config) {
                        self.post_text(&question.source, &origin, text);
                    }
                }
            }
        }

        if let Some((next_id, next)) = self.inner.tracker.complete(&key, turn_id) {
            self.spawn_queued(key.clone(), next_id, next);
        }
        self.release_idle_queue(&key);
        result
    }

    async fn execute_turn(
        &self,
        progress: &mut TurnProgress,
        key: &ConversationKey,
        question: &QueuedQuestion,
        origin: &Arc<ChatMessage>,
    ) -> Result<TurnOutcome, TurnError> {
        let source = self.source(&question.source)?;
        let bot = self.bot(&question.rule.instance_name)?;
        let ctx = SkillContext {
            key: key.clone(),
            origin: (**origin).clone(),
            reply: ReplyHandle::new(self.clone(), question.source.clone(), Arc::clone(origin)),
        };
        let skills = self.resolve_skills(&question.skill_rules);

        let mut message = question.message.clone();
        for (rule, skill) in &skills {
            if !rule.skill_apply_on.on_source() || !skill.params().apply_on_source {
                continue;
            }
            let applied = skill
                .apply_on_source(message, &ctx)
                .await
                .map_err(|error| TurnError::Skill {
                    skill: skill.name().to_string(),
                    error,
                })?;
            match applied {
                Some(next) => message = next,
                None => {
                    debug!(skill = skill.name(), "turn vetoed by skill");
                    return Ok(TurnOutcome::Vetoed);
                }
            }
        }

        let (part_skills, complete_skills) = reply_skills(&skills);
        progress.advance(TurnState::Dispatched);
        source.before_send(origin).await;
        let result = self
            .dispatch(
                progress,
                key,
                &question.source,
                &bot,
                &message,
                origin,
                &ctx,
                part_skills,
                complete_skills,
            )
            .await;
        source.after_send(origin).await;
        result.map(|fragments| TurnOutcome::Completed { fragments })
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        progress: &mut TurnProgress,
        key: &ConversationKey,
        source: &str,
        bot: &BoxBot,
        message: &ChatMessage,
        origin: &Arc<ChatMessage>,
        ctx: &SkillContext,
        part_skills: Vec<Arc<BoxSkill>>,
        complete_skills: Vec<Arc<BoxSkill>>,
    ) -> Result<usize, TurnError> {
        let config = &self.inner.config;
        let bot_failed = |error: BotError| TurnError::BotInvocation {
            bot: bot.name().to_string(),
            error,
        };

        let ready = bot.prepare_message(message).await.map_err(bot_failed)?;
        let keep_history = config.history_enabled && bot.params().need_history_message;
        let history = if keep_history { self.history(key) } else { Vec::new() };

        let source_params = self.source(source)?.params().clone();
        let mut pipeline = ReplyPipeline::new(
            self,
            source,
            source_params,
            Arc::clone(origin),
            ctx,
            progress,
            part_skills,
            complete_skills,
        );

        let (receiver, mut outputs) = ContentReceiver::channel();
        let call = bot.get_response(message, receiver, &ready, history);
        let consume = async {
            while let Some(output) = outputs.recv().await {
                pipeline.accept(output).await?;
            }
            Ok::<(), TurnError>(())
        };
        let (turn, consumed) = tokio::join!(call, consume);
        let turn = turn.map_err(bot_failed)?;
        consumed?;

        if !pipeline.answered() {
            pipeline.await_answer();
            match turn.answer.as_deref() {
                Some(answer) => pipeline.accept_answer(answer).await?,
                None => {
                    if let Some(text) = Notice::Fallback.render(config) {
                        debug!("bot produced no answer, sending fallback");
                        pipeline.accept_fallback(&text).await?;
                    }
                }
            }
        }
        pipeline.finish().await?;
        let delivered = pipeline.wait_delivered().await?;

        if keep_history && pipeline.answered() {
            self.prune_histories();
            let answer = pipeline.full_text().to_string();
            let mut manager = self
                .inner
                .histories
                .entry(key.clone())
                .or_insert_with(|| HistoryMessageManager::new(config.history.clone()));
            manager.add_message(ready.history_message(), Some(&ready.plain_text));
            let bot_side = turn
                .history
                .unwrap_or_else(|| HistoryMessage::bot(answer.clone()));
            manager.add_message(bot_side, Some(&answer));
        }
        Ok(delivered)
    }

    /// Start the admission timeout of a turn. Dropping the guard disarms it.
    fn start_watchdog(
        &self,
        key: &ConversationKey,
        turn_id: Uuid,
        source: &str,
        origin: &Arc<ChatMessage>,
    ) -> Option<DropGuard> {
        let seconds = self.inner.config.timeout_seconds;
        if seconds == 0 {
            return None;
        }
        let token = self.inner.cancel.child_token();
        let guard = token.clone().drop_guard();
        let agent = self.clone();
        let key = key.clone();
        let source = source.to_string();
        let origin = Arc::clone(origin);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {
                    agent.on_slot_timeout(&key, turn_id, &source, &origin);
                }
            }
        });
        Some(guard)
    }

    /// Release the slot of a turn that is taking too long.
    ///
    /// The bot call keeps running and its answer is still delivered.
    fn on_slot_timeout(
        &self,
        key: &ConversationKey,
        turn_id: Uuid,
        source: &str,
        origin: &Arc<ChatMessage>,
    ) {
        if !self.inner.tracker.is_turn_active(key, turn_id) {
            return;
        }
        warn!(conversation = %key, %turn_id, "turn exceeded its admission timeout");
        self.publish(RelayEvent::SlotTimedOut {
            agent: self.name().to_string(),
            key: key.clone(),
            turn_id,
        });
        if let Some(text) = Notice::Timeout.render(&self.inner.config) {
            self.post_text(source, origin, text);
        }
        if let Some((next_id, next)) = self.inner.tracker.expire(key, turn_id) {
            self.spawn_queued(key.clone(), next_id, next);
        }
    }

    /// Answer a promoted question in the background.
    fn spawn_queued(&self, key: ConversationKey, turn_id: Uuid, question: QueuedQuestion) {
        let agent = self.clone();
        let span = info_span!(
            "turn",
            agent = %self.name(),
            conversation = %key,
            %turn_id,
        );
        tokio::spawn(
            async move {
                let mut progress =
                    TurnProgress::new(agent.name(), &key, turn_id, TurnState::Queued, agent.bus());
                progress.advance(TurnState::Admitted);
                match agent.run_admitted(progress, key, turn_id, question).await {
                    Ok(outcome) => debug!(?outcome, "queued question answered"),
                    Err(err) if err.is_silent() => debug!("queued question not answered: {err}"),
                    Err(err) => warn!("queued question failed: {err}"),
                }
            }
            .instrument(span),
        );
    }

    fn post_text(&self, source: &str, origin: &Arc<ChatMessage>, text: String) {
        let message = ChatMessage::reply_to(origin, ChatContent::text(text), ReplyStatus::Content);
        if let Err(err) = self.enqueue(source, message, false, Some(Arc::clone(origin))) {
            warn!("cannot send notice: {err}");
        }
    }

    fn queue_for(&self, key: &ConversationKey, source: Arc<BoxSource>) -> Arc<DeliveryQueue> {
        let queue = self.inner.queues.entry(key.clone()).or_insert_with(|| {
            Arc::new(OrderedDeliveryQueue::new(SourceSink {
                agent: self.name().to_string(),
                key: key.clone(),
                source,
                throttle: Arc::clone(&self.inner.throttle),
                bus: self.inner.bus.clone(),
            }))
        });
        queue.value().clone()
    }

    /// Drop the delivery queue of a conversation with nothing left to send.
    fn release_idle_queue(&self, key: &ConversationKey) {
        let tracker = &self.inner.tracker;
        self.inner
            .queues
            .remove_if(key, |_, queue| queue.in_flight() == 0 && !tracker.is_busy(key));
    }

    fn resolve_skills(&self, rules: &[MessageRule]) -> Vec<(MessageRule, Arc<BoxSkill>)> {
        rules
            .iter()
            .filter_map(|rule| match self.inner.plugins.skills.get(&rule.instance_name) {
                Some(skill) => Some((rule.clone(), Arc::clone(skill))),
                None => {
                    warn!(skill = %rule.instance_name, "skill instance not loaded");
                    None
                }
            })
            .collect()
    }

    fn source(&self, name: &str) -> Result<Arc<BoxSource>, TurnError> {
        self.inner
            .plugins
            .sources
            .get(name)
            .cloned()
            .ok_or_else(|| TurnError::UnknownSource(name.to_string()))
    }

    fn bot(&self, name: &str) -> Result<Arc<BoxBot>, TurnError> {
        self.inner
            .plugins
            .bots
            .get(name)
            .cloned()
            .ok_or_else(|| TurnError::BotInvocation {
                bot: name.to_string(),
                error: BotError::Request("bot instance not loaded".to_string()),
            })
    }

    fn dropped(&self, key: &ConversationKey, reason: &str) {
        debug!(conversation = %key, reason, "question dropped");
        self.publish(RelayEvent::QuestionDropped {
            agent: self.name().to_string(),
            key: key.clone(),
            reason: reason.to_string(),
        });
    }

    fn publish(&self, event: RelayEvent) {
        self.inner.bus.publish(event);
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name())
            .field("sources", &self.inner.config.source_instance_names)
            .field("tracker", &self.inner.tracker)
            .finish()
    }
}

fn missing(category: &'static str, name: &str) -> RegistryError {
    RegistryError::MissingInstance {
        category,
        name: name.to_string(),
    }
}

/// Sender of an inbound message as seen by the rule matcher.
fn sender_of(message: &ChatMessage) -> UserInfo {
    let id = message.sender_id.clone().unwrap_or_default();
    let mut user = UserInfo::new(id.clone());
    user.user_name = message.sender_name.clone().unwrap_or(id);
    user.nick_name = message.sender_name.clone();
    user
}

/// Split reply skills into per-fragment and whole-answer skills.
fn reply_skills(
    skills: &[(MessageRule, Arc<BoxSkill>)],
) -> (Vec<Arc<BoxSkill>>, Vec<Arc<BoxSkill>>) {
    let mut part = Vec::new();
    let mut complete = Vec::new();
    for (rule, skill) in skills {
        if !rule.skill_apply_on.on_reply() || !skill.params().apply_on_reply {
            continue;
        }
        match rule.skill_when_reply_status {
            SkillWhenReplyStatus::Part => part.push(Arc::clone(skill)),
            SkillWhenReplyStatus::Complete => complete.push(Arc::clone(skill)),
        }
    }
    (part, complete)
}
