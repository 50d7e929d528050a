//! Bot trait definition.

use std::future::Future;

use chatrelay_types::error::BotError;
use chatrelay_types::history::HistoryMessage;
use chatrelay_types::message::{ChatMessage, ConversationKey};

use super::{BotParams, ContentReceiver, HistoryTurn, ReadyMessage};

/// Trait for conversational backends (OpenAI-compatible APIs, workflow
/// engines, local models).
///
/// Uses native async fn in traits (RPITIT). `BoxBot` provides the
/// object-safe wrapper used by agents.
pub trait Bot: Send + Sync {
    /// Instance name, unique within a relay.
    fn name(&self) -> &str;

    /// Declared capabilities.
    fn params(&self) -> &BotParams;

    /// Convert an inbound message into the backend request shape.
    fn prepare_message(
        &self,
        message: &ChatMessage,
    ) -> impl Future<Output = Result<ReadyMessage, BotError>> + Send;

    /// Answer a prepared message.
    ///
    /// Streaming bots push deltas through `receiver`; blocking bots return
    /// the answer in [`HistoryTurn::answer`]. `history` is empty unless the
    /// bot declared `need_history_message`.
    fn get_response(
        &self,
        message: &ChatMessage,
        receiver: ContentReceiver,
        ready: &ReadyMessage,
        history: Vec<HistoryMessage>,
    ) -> impl Future<Output = Result<HistoryTurn, BotError>> + Send;

    /// Drop any backend-side state kept for `key`.
    fn clear_history_requested(&self, _key: &ConversationKey) -> impl Future<Output = ()> + Send {
        async {}
    }
}
