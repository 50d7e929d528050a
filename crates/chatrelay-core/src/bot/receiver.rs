//! Channel through which bots stream their output.

use chatrelay_types::message::ChatContent;
use tokio::sync::mpsc;

/// One piece of bot output.
#[derive(Debug, Clone, PartialEq)]
pub enum BotOutput {
    /// Answer text delta.
    Content(String),
    /// Reasoning trace delta.
    Reasoning(String),
    /// A non-text payload sent as its own message.
    Media(ChatContent),
}

/// Sink handed to `Bot::get_response` for streaming output.
///
/// Sends never block. Output sent after the agent stopped listening is
/// discarded.
#[derive(Debug, Clone)]
pub struct ContentReceiver {
    tx: mpsc::UnboundedSender<BotOutput>,
}

impl ContentReceiver {
    /// Create a receiver and the stream of everything sent through it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BotOutput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn on_content(&self, text: impl Into<String>) {
        let _ = self.tx.send(BotOutput::Content(text.into()));
    }

    pub fn on_reasoning(&self, text: impl Into<String>) {
        let _ = self.tx.send(BotOutput::Reasoning(text.into()));
    }

    pub fn on_media(&self, content: ChatContent) {
        let _ = self.tx.send(BotOutput::Media(content));
    }
}
