//! BoxBot -- object-safe dynamic dispatch wrapper for Bot.
//!
//! Same blanket-impl pattern as `BoxSource`.

use std::future::Future;
use std::pin::Pin;

use chatrelay_types::error::BotError;
use chatrelay_types::history::HistoryMessage;
use chatrelay_types::message::{ChatMessage, ConversationKey};

use super::port::Bot;
use super::{BotParams, ContentReceiver, HistoryTurn, ReadyMessage};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`Bot`] with boxed futures.
pub trait BotDyn: Send + Sync {
    fn name(&self) -> &str;

    fn params(&self) -> &BotParams;

    fn prepare_message_boxed<'a>(
        &'a self,
        message: &'a ChatMessage,
    ) -> BoxFuture<'a, Result<ReadyMessage, BotError>>;

    fn get_response_boxed<'a>(
        &'a self,
        message: &'a ChatMessage,
        receiver: ContentReceiver,
        ready: &'a ReadyMessage,
        history: Vec<HistoryMessage>,
    ) -> BoxFuture<'a, Result<HistoryTurn, BotError>>;

    fn clear_history_requested_boxed<'a>(&'a self, key: &'a ConversationKey) -> BoxFuture<'a, ()>;
}

impl<T: Bot> BotDyn for T {
    fn name(&self) -> &str {
        Bot::name(self)
    }

    fn params(&self) -> &BotParams {
        Bot::params(self)
    }

    fn prepare_message_boxed<'a>(
        &'a self,
        message: &'a ChatMessage,
    ) -> BoxFuture<'a, Result<ReadyMessage, BotError>> {
        Box::pin(self.prepare_message(message))
    }

    fn get_response_boxed<'a>(
        &'a self,
        message: &'a ChatMessage,
        receiver: ContentReceiver,
        ready: &'a ReadyMessage,
        history: Vec<HistoryMessage>,
    ) -> BoxFuture<'a, Result<HistoryTurn, BotError>> {
        Box::pin(self.get_response(message, receiver, ready, history))
    }

    fn clear_history_requested_boxed<'a>(&'a self, key: &'a ConversationKey) -> BoxFuture<'a, ()> {
        Box::pin(self.clear_history_requested(key))
    }
}

/// Type-erased bot for runtime plugin selection.
pub struct BoxBot {
    inner: Box<dyn BotDyn + Send + Sync>,
}

impl BoxBot {
    /// Wrap a concrete `Bot` in a type-erased box.
    pub fn new<T: Bot + 'static>(bot: T) -> Self {
        Self {
            inner: Box::new(bot),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn params(&self) -> &BotParams {
        self.inner.params()
    }

    pub async fn prepare_message(&self, message: &ChatMessage) -> Result<ReadyMessage, BotError> {
        self.inner.prepare_message_boxed(message).await
    }

    pub async fn get_response(
        &self,
        message: &ChatMessage,
        receiver: ContentReceiver,
        ready: &ReadyMessage,
        history: Vec<HistoryMessage>,
    ) -> Result<HistoryTurn, BotError> {
        self.inner
            .get_response_boxed(message, receiver, ready, history)
            .await
    }

    pub async fn clear_history_requested(&self, key: &ConversationKey) {
        self.inner.clear_history_requested_boxed(key).await
    }
}

impl std::fmt::Debug for BoxBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxBot")
            .field("name", &self.name())
            .field("params", self.params())
            .finish()
    }
}
