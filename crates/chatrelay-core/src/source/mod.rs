//! Source port: adapters for external chat platforms.
//!
//! A source emits normalized [`ChatMessage`]s through a [`SourceEmitter`]
//! and delivers outbound messages with `send_message`. Platform wire
//! formats stay inside the adapter.

pub mod box_source;
pub mod port;

use chatrelay_types::error::SourceError;
use chatrelay_types::message::{AtField, ChatContent, ChatMessage, MessageType};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use box_source::{BoxSource, SourceDyn};
pub use port::Source;

/// Capabilities a source declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceParams {
    /// Which user field the source writes into `at_list`.
    #[serde(default)]
    pub at_field: AtField,
    /// Whether the source can both receive and answer group messages.
    /// Group messages from a source without it are ignored.
    #[serde(default = "default_group_in_and_out")]
    pub group_in_and_out: bool,
    /// Inbound message types; empty means all.
    #[serde(default)]
    pub in_types: Vec<MessageType>,
    /// Outbound message types; empty means all.
    #[serde(default)]
    pub out_types: Vec<MessageType>,
}

fn default_group_in_and_out() -> bool {
    true
}

impl Default for SourceParams {
    fn default() -> Self {
        Self {
            at_field: AtField::default(),
            group_in_and_out: default_group_in_and_out(),
            in_types: Vec::new(),
            out_types: Vec::new(),
        }
    }
}

impl SourceParams {
    pub fn can_send(&self, message_type: MessageType) -> bool {
        self.out_types.is_empty() || self.out_types.contains(&message_type)
    }

    /// Whether the agent should answer `message` received on this source.
    pub fn can_receive(&self, message: &ChatMessage) -> bool {
        if message.is_group_chat && !self.group_in_and_out {
            return false;
        }
        self.in_types.is_empty() || self.in_types.contains(&message.message_type())
    }

    /// Fit outbound content to what the source can send.
    ///
    /// Unsupported payloads fall back to their text, or to the media link,
    /// when the source sends text. `None` means nothing sendable is left.
    pub fn sendable(&self, content: ChatContent) -> Option<ChatContent> {
        if self.can_send(content.message_type()) {
            return Some(content);
        }
        if !self.can_send(MessageType::Text) {
            return None;
        }
        let text = match &content {
            ChatContent::Image(media) => Some(media.uri.clone()),
            other => other.plain_text(),
        };
        text.filter(|text| !text.trim().is_empty())
            .map(ChatContent::Text)
    }
}

/// A message received on a named source instance.
#[derive(Debug, Clone)]
pub struct SourceEvent {
    pub source: String,
    pub message: ChatMessage,
}

/// Channel a running source pushes its inbound messages into.
#[derive(Debug, Clone)]
pub struct SourceEmitter {
    source: String,
    tx: mpsc::Sender<SourceEvent>,
}

impl SourceEmitter {
    pub fn new(source: impl Into<String>, tx: mpsc::Sender<SourceEvent>) -> Self {
        Self {
            source: source.into(),
            tx,
        }
    }

    /// Emit one inbound message.
    pub async fn emit(&self, message: ChatMessage) -> Result<(), SourceError> {
        self.tx
            .send(SourceEvent {
                source: self.source.clone(),
                message,
            })
            .await
            .map_err(|_| SourceError::Closed)
    }

    /// Instance name events are tagged with.
    pub fn source(&self) -> &str {
        &self.source
    }
}
