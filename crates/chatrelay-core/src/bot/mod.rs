//! Bot port: adapters for conversational backends.
//!
//! A bot answers a prepared message either by streaming through its
//! [`ContentReceiver`] or by returning the whole answer in its
//! [`HistoryTurn`].

pub mod box_bot;
pub mod port;
pub mod receiver;

use chatrelay_types::history::HistoryMessage;
use chatrelay_types::message::ChatMessage;
use serde::{Deserialize, Serialize};

pub use box_bot::{BotDyn, BoxBot};
pub use port::Bot;
pub use receiver::{BotOutput, ContentReceiver};

/// Capabilities a bot declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotParams {
    /// The relay must keep and pass conversation history.
    #[serde(default)]
    pub need_history_message: bool,
    /// Several questions of one conversation may be answered at once.
    #[serde(default)]
    pub allow_multi_active_chat: bool,
}

/// A message converted into the bot's own request shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyMessage {
    /// Stored as the user side of the turn in history.
    pub for_history: serde_json::Value,
    /// Sent to the backend.
    pub for_send: serde_json::Value,
    /// Backend conversation id, when the backend keeps its own state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    /// Plain text of the question, used for history limits.
    pub plain_text: String,
}

impl ReadyMessage {
    /// Ready message carrying the plain text of `message` as is.
    pub fn from_text(message: &ChatMessage) -> Self {
        let plain_text = message.content.plain_text().unwrap_or_default();
        Self {
            for_history: serde_json::Value::String(plain_text.clone()),
            for_send: serde_json::Value::String(plain_text.clone()),
            chat_id: None,
            plain_text,
        }
    }

    /// History entry for the user side of the turn.
    pub fn history_message(&self) -> HistoryMessage {
        HistoryMessage::user(self.for_history.clone())
    }
}

/// What a bot returns for one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryTurn {
    /// Bot side of the turn to store in history.
    pub history: Option<HistoryMessage>,
    /// Complete answer of a blocking bot. Ignored when content was streamed;
    /// `Some("")` is an intentionally empty answer.
    pub answer: Option<String>,
}

impl HistoryTurn {
    /// Turn of a blocking bot answering `text`.
    pub fn answered(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            history: Some(HistoryMessage::bot(text.clone())),
            answer: Some(text),
        }
    }

    /// Turn of a streaming bot that sent its answer through the receiver.
    pub fn streamed(history: Option<HistoryMessage>) -> Self {
        Self {
            history,
            answer: None,
        }
    }
}
