//! Echo bot: streams the question back, chunk by chunk.

use std::time::Duration;

use chatrelay_core::bot::{Bot, BotParams, ContentReceiver, HistoryTurn, ReadyMessage};
use chatrelay_types::error::BotError;
use chatrelay_types::history::HistoryMessage;
use chatrelay_types::message::ChatMessage;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EchoOptions {
    /// Characters per streamed chunk.
    pub chunk_chars: usize,
    /// Delay before each chunk.
    pub latency_ms: u64,
    /// Prepended to every answer.
    pub prefix: String,
}

impl Default for EchoOptions {
    fn default() -> Self {
        Self {
            chunk_chars: 8,
            latency_ms: 0,
            prefix: String::new(),
        }
    }
}

pub struct EchoBot {
    name: String,
    options: EchoOptions,
    params: BotParams,
}

impl EchoBot {
    pub fn new(name: &str, options: EchoOptions) -> Self {
        Self {
            name: name.to_string(),
            options,
            params: BotParams {
                need_history_message: true,
                allow_multi_active_chat: false,
            },
        }
    }

    /// The full answer for `question` given `turns` earlier history entries.
    pub fn answer(&self, question: &str, turns: usize) -> String {
        if turns == 0 {
            format!("{}{question}", self.options.prefix)
        } else {
            format!("{}{question} (#{})", self.options.prefix, turns / 2 + 1)
        }
    }
}

/// Split `text` into chunks of at most `size` characters.
fn chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

impl Bot for EchoBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &BotParams {
        &self.params
    }

    async fn prepare_message(&self, message: &ChatMessage) -> Result<ReadyMessage, BotError> {
        let ready = ReadyMessage::from_text(message);
        if ready.plain_text.is_empty() {
            return Err(BotError::Prepare(format!(
                "cannot echo a {} message",
                message.message_type()
            )));
        }
        Ok(ready)
    }

    async fn get_response(
        &self,
        _message: &ChatMessage,
        receiver: ContentReceiver,
        ready: &ReadyMessage,
        history: Vec<HistoryMessage>,
    ) -> Result<HistoryTurn, BotError> {
        let answer = self.answer(&ready.plain_text, history.len());
        let latency = Duration::from_millis(self.options.latency_ms);
        for chunk in chunks(&answer, self.options.chunk_chars) {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            receiver.on_content(chunk);
        }
        Ok(HistoryTurn::streamed(Some(HistoryMessage::bot(answer))))
    }
}
