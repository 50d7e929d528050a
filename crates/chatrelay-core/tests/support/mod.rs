//! Mock source, bot and skills shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use chatrelay_core::agent::{Agent, AgentPlugins};
use chatrelay_core::bot::{Bot, BotParams, BoxBot, ContentReceiver, HistoryTurn, ReadyMessage};
use chatrelay_core::event::EventBus;
use chatrelay_core::skill::{BoxSkill, ReplyDraft, Skill, SkillContext, SkillParams};
use chatrelay_core::source::{BoxSource, Source, SourceEmitter, SourceParams};
use chatrelay_types::config::{AgentConfig, SendMode};
use chatrelay_types::error::{BotError, SkillError, SourceError};
use chatrelay_types::history::HistoryMessage;
use chatrelay_types::message::{ChatContent, ChatMessage, ReplyStatus, UserInfo};
use chatrelay_types::rule::MessageRule;

/// Shared, ordered record of what the mocks saw.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Private text message from `user`.
pub fn private(user: &str, text: &str) -> ChatMessage {
    let mut message = ChatMessage::text(text);
    message.sender_id = Some(user.to_string());
    message.sender_name = Some(user.to_string());
    message
}

/// Group text message in `group` from `user`.
pub fn group(group: &str, user: &str, text: &str) -> ChatMessage {
    let mut message = private(user, text);
    message.is_group_chat = true;
    message.from_id = Some(group.to_string());
    message
}

// ---- Source ----

/// One message the source was asked to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub content: ChatContent,
    pub status: ReplyStatus,
}

impl Sent {
    pub fn text(&self) -> Option<&str> {
        self.content.filter_text()
    }
}

pub struct MockSource {
    name: String,
    pub params: SourceParams,
    me: UserInfo,
    pub sent: Arc<Mutex<Vec<Sent>>>,
    /// Paused-clock instant of every successful send.
    pub sent_at: Arc<Mutex<Vec<Instant>>>,
    pub log: Log,
    pub fail_sends: bool,
    /// Send latency per text; texts not listed are sent at once.
    pub send_latency: HashMap<String, Duration>,
    /// Messages emitted when the source starts.
    pub inbound: Vec<ChatMessage>,
}

impl MockSource {
    pub fn new(name: &str, log: &Log) -> Self {
        let mut me = UserInfo::new("bot-1");
        me.user_name = "relay".to_string();
        Self {
            name: name.to_string(),
            params: SourceParams::default(),
            me,
            sent: Arc::new(Mutex::new(Vec::new())),
            sent_at: Arc::new(Mutex::new(Vec::new())),
            log: Arc::clone(log),
            fail_sends: false,
            send_latency: HashMap::new(),
            inbound: Vec::new(),
        }
    }

    pub fn with_send_latency(mut self, text: &str, latency: Duration) -> Self {
        self.send_latency.insert(text.to_string(), latency);
        self
    }
}

impl Source for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &SourceParams {
        &self.params
    }

    fn me(&self) -> Option<&UserInfo> {
        Some(&self.me)
    }

    async fn start(&self, emitter: SourceEmitter) -> Result<(), SourceError> {
        for message in &self.inbound {
            emitter.emit(message.clone()).await?;
        }
        Ok(())
    }

    async fn send_message(
        &self,
        message: &ChatMessage,
        _from: Option<&ChatMessage>,
    ) -> Result<(), SourceError> {
        if self.fail_sends {
            return Err(SourceError::Send("platform rejected the message".to_string()));
        }
        let text = message.content.filter_text().unwrap_or("<media>").to_string();
        if let Some(latency) = self.send_latency.get(&text) {
            tokio::time::sleep(*latency).await;
        }
        self.log.lock().unwrap().push(format!("sent:{text}"));
        self.sent_at.lock().unwrap().push(Instant::now());
        self.sent.lock().unwrap().push(Sent {
            content: message.content.clone(),
            status: message.status,
        });
        Ok(())
    }

    async fn before_send(&self, from: &ChatMessage) {
        let text = from.content.filter_text().unwrap_or_default().to_string();
        self.log.lock().unwrap().push(format!("before:{text}"));
    }

    async fn after_send(&self, from: &ChatMessage) {
        let text = from.content.filter_text().unwrap_or_default().to_string();
        self.log.lock().unwrap().push(format!("after:{text}"));
    }
}

// ---- Bot ----

/// How the mock bot answers.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Stream `echo <question>` as content.
    Echo,
    /// Stream these chunks as content.
    Chunks(Vec<String>),
    /// Stream reasoning, then content.
    Reasoned { reasoning: String, content: String },
    /// Return the answer in one piece.
    Blocking(Option<String>),
    /// Fail the call.
    Fail,
}

pub struct MockBot {
    name: String,
    params: BotParams,
    reply: Reply,
    /// Latency per question text; questions not listed answer at once.
    pub latency: HashMap<String, Duration>,
    pub calls: Arc<Mutex<Vec<usize>>>,
    pub cleared: Arc<Mutex<usize>>,
    pub log: Log,
}

impl MockBot {
    pub fn new(name: &str, reply: Reply, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            params: BotParams::default(),
            reply,
            latency: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            cleared: Arc::new(Mutex::new(0)),
            log: Arc::clone(log),
        }
    }

    pub fn with_history(mut self) -> Self {
        self.params.need_history_message = true;
        self
    }

    pub fn with_latency(mut self, question: &str, latency: Duration) -> Self {
        self.latency.insert(question.to_string(), latency);
        self
    }
}

impl Bot for MockBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &BotParams {
        &self.params
    }

    async fn prepare_message(&self, message: &ChatMessage) -> Result<ReadyMessage, BotError> {
        Ok(ReadyMessage::from_text(message))
    }

    async fn get_response(
        &self,
        message: &ChatMessage,
        receiver: ContentReceiver,
        ready: &ReadyMessage,
        history: Vec<HistoryMessage>,
    ) -> Result<HistoryTurn, BotError> {
        let question = ready.plain_text.clone();
        self.log.lock().unwrap().push(format!("call:{question}"));
        self.calls.lock().unwrap().push(history.len());
        if let Some(latency) = self.latency.get(&question) {
            tokio::time::sleep(*latency).await;
        }
        let _ = message;

        match &self.reply {
            Reply::Echo => {
                receiver.on_content(format!("echo {question}"));
                Ok(HistoryTurn::streamed(None))
            }
            Reply::Chunks(chunks) => {
                for chunk in chunks {
                    receiver.on_content(chunk.clone());
                }
                Ok(HistoryTurn::streamed(None))
            }
            Reply::Reasoned { reasoning, content } => {
                receiver.on_reasoning(reasoning.clone());
                receiver.on_content(content.clone());
                Ok(HistoryTurn::streamed(None))
            }
            Reply::Blocking(answer) => Ok(HistoryTurn {
                history: None,
                answer: answer.clone(),
            }),
            Reply::Fail => Err(BotError::Request("upstream returned 502".to_string())),
        }
    }

    async fn clear_history_requested(&self, _key: &chatrelay_types::message::ConversationKey) {
        *self.cleared.lock().unwrap() += 1;
    }
}

// ---- Skills ----

/// Answers `/ping` itself and vetoes the bot turn.
pub struct PingSkill {
    params: SkillParams,
}

impl PingSkill {
    pub fn new() -> Self {
        Self {
            params: SkillParams::default(),
        }
    }
}

impl Skill for PingSkill {
    fn name(&self) -> &str {
        "ping"
    }

    fn params(&self) -> &SkillParams {
        &self.params
    }

    async fn apply_on_source(
        &self,
        message: ChatMessage,
        ctx: &SkillContext,
    ) -> Result<Option<ChatMessage>, SkillError> {
        let text = message.content.filter_text().unwrap_or_default();
        if text == "/ping" {
            ctx.reply
                .post(ChatContent::text("pong"))
                .map_err(|e| SkillError::Failed(e.to_string()))?;
            return Ok(None);
        }
        // `/pingN` answers `pong-N` and lingers before vetoing
        if let Some(n) = text.strip_prefix("/ping") {
            ctx.reply
                .post(ChatContent::text(format!("pong-{n}")))
                .map_err(|e| SkillError::Failed(e.to_string()))?;
            tokio::time::sleep(Duration::from_millis(1)).await;
            return Ok(None);
        }
        Ok(Some(message))
    }
}

/// Upper-cases every text reply.
pub struct ShoutSkill {
    params: SkillParams,
}

impl ShoutSkill {
    pub fn new() -> Self {
        Self {
            params: SkillParams::default(),
        }
    }
}

impl Skill for ShoutSkill {
    fn name(&self) -> &str {
        "shout"
    }

    fn params(&self) -> &SkillParams {
        &self.params
    }

    async fn apply_on_reply(
        &self,
        draft: ReplyDraft,
        _ctx: &SkillContext,
    ) -> Result<Option<ReplyDraft>, SkillError> {
        let ReplyDraft {
            content,
            status,
            full_text,
        } = draft;
        let content = match content.filter_text() {
            Some(text) => ChatContent::text(text.to_uppercase()),
            None => content,
        };
        Ok(Some(ReplyDraft {
            content,
            status,
            full_text,
        }))
    }
}

/// Sends the length of the whole answer once it is complete.
pub struct LengthSkill {
    params: SkillParams,
}

impl LengthSkill {
    pub fn new() -> Self {
        Self {
            params: SkillParams::default(),
        }
    }
}

impl Skill for LengthSkill {
    fn name(&self) -> &str {
        "length"
    }

    fn params(&self) -> &SkillParams {
        &self.params
    }

    async fn apply_on_reply(
        &self,
        draft: ReplyDraft,
        _ctx: &SkillContext,
    ) -> Result<Option<ReplyDraft>, SkillError> {
        let Some(full) = draft.full_text else {
            return Err(SkillError::Failed("expected the complete answer".to_string()));
        };
        Ok(Some(ReplyDraft::text(
            format!("length={}", full.chars().count()),
            ReplyStatus::Content,
        )))
    }
}

// ---- Agent wiring ----

/// Agent config answering every message of `console` with `bot`.
pub fn config(bot: &str) -> AgentConfig {
    let mut config = AgentConfig::new("main");
    config.source_instance_names = vec!["console".to_string()];
    config.bot_response_rule = vec![MessageRule::for_instance(bot)];
    config.send_mode = SendMode::Now;
    config
}

pub struct Harness {
    pub agent: Agent,
    pub sent: Arc<Mutex<Vec<Sent>>>,
    pub sent_at: Arc<Mutex<Vec<Instant>>>,
    pub calls: Arc<Mutex<Vec<usize>>>,
    pub cleared: Arc<Mutex<usize>>,
    pub log: Log,
}

impl Harness {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|s| s.text().map(str::to_string))
            .collect()
    }

    /// Gaps between consecutive sends.
    pub fn send_gaps(&self) -> Vec<Duration> {
        self.sent_at
            .lock()
            .unwrap()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    pub fn bot_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

pub fn harness(config: AgentConfig, source: MockSource, bot: MockBot, skills: Vec<BoxSkill>) -> Harness {
    let sent = Arc::clone(&source.sent);
    let sent_at = Arc::clone(&source.sent_at);
    let calls = Arc::clone(&bot.calls);
    let cleared = Arc::clone(&bot.cleared);
    let log = Arc::clone(&source.log);

    let mut plugins = AgentPlugins::default();
    plugins
        .sources
        .insert(source.name().to_string(), Arc::new(BoxSource::new(source)));
    plugins
        .bots
        .insert(bot.name().to_string(), Arc::new(BoxBot::new(bot)));
    for skill in skills {
        plugins.skills.insert(skill.name().to_string(), Arc::new(skill));
    }

    Harness {
        agent: Agent::new(config, plugins, EventBus::default()),
        sent,
        sent_at,
        calls,
        cleared,
        log,
    }
}
