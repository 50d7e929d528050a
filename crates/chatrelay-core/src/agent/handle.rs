//! Outbound delivery plumbing: the per-conversation sink and reply handles.

use std::future::Future;
use std::sync::Arc;

use chatrelay_types::error::SourceError;
use chatrelay_types::event::RelayEvent;
use chatrelay_types::message::{ChatContent, ChatMessage, ConversationKey, ReplyStatus};

use super::orchestrator::Agent;
use super::turn::TurnError;
use crate::delivery::{DeliverySink, SendThrottle};
use crate::event::EventBus;
use crate::source::BoxSource;

/// One message waiting in a conversation's delivery queue.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub message: ChatMessage,
    /// Inbound message being answered, if any.
    pub from: Option<Arc<ChatMessage>>,
    /// Skip the send throttle.
    pub now: bool,
}

/// Delivers released slots of one conversation to its source.
pub(crate) struct SourceSink {
    pub(crate) agent: String,
    pub(crate) key: ConversationKey,
    pub(crate) source: Arc<BoxSource>,
    pub(crate) throttle: Arc<SendThrottle>,
    pub(crate) bus: EventBus,
}

impl DeliverySink<Outbound> for SourceSink {
    type Output = Result<(), SourceError>;

    fn deliver(
        &self,
        seq: u64,
        item: Outbound,
    ) -> impl Future<Output = Result<(), SourceError>> + Send {
        async move {
            if !item.now {
                self.throttle.acquire().await;
            }
            let result = self
                .source
                .send_message(&item.message, item.from.as_deref())
                .await;

            match &result {
                Ok(()) => {
                    tracing::debug!(conversation = %self.key, seq, "message delivered");
                    self.bus.publish(RelayEvent::FragmentDelivered {
                        agent: self.agent.clone(),
                        key: self.key.clone(),
                        seq,
                        status: item.message.status,
                    });
                }
                Err(err) => {
                    tracing::warn!(conversation = %self.key, seq, "delivery failed: {err}");
                    self.bus.publish(RelayEvent::DeliveryFailed {
                        agent: self.agent.clone(),
                        key: self.key.clone(),
                        seq,
                        error: err.to_string(),
                    });
                }
            }
            result
        }
    }
}

/// Answers into the conversation of one inbound message.
///
/// Messages go through the same ordered, throttled path as bot answers.
#[derive(Clone)]
pub struct ReplyHandle {
    agent: Agent,
    source: String,
    origin: Arc<ChatMessage>,
}

impl ReplyHandle {
    pub(crate) fn new(agent: Agent, source: impl Into<String>, origin: Arc<ChatMessage>) -> Self {
        Self {
            agent,
            source: source.into(),
            origin,
        }
    }

    /// Send `content` and wait until the source accepted it.
    ///
    /// Called from `Skill::apply_on_reply`, this waits behind the reply
    /// being transformed; use [`post`](Self::post) there instead.
    pub async fn send(&self, content: ChatContent) -> Result<(), TurnError> {
        let message = ChatMessage::reply_to(&self.origin, content, ReplyStatus::Content);
        self.agent
            .send_message(&self.source, message, false, Some(Arc::clone(&self.origin)))
            .await
    }

    /// Queue `content` without waiting for delivery.
    pub fn post(&self, content: ChatContent) -> Result<(), TurnError> {
        let message = ChatMessage::reply_to(&self.origin, content, ReplyStatus::Content);
        self.agent
            .enqueue(&self.source, message, false, Some(Arc::clone(&self.origin)))
            .map(|_| ())
    }

    /// Source instance the handle answers on.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The inbound message being answered.
    pub fn origin(&self) -> &ChatMessage {
        &self.origin
    }
}

impl std::fmt::Debug for ReplyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyHandle")
            .field("agent", &self.agent.name())
            .field("source", &self.source)
            .field("message_id", &self.origin.message_id)
            .finish()
    }
}
