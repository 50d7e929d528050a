//! Console source: every stdin line is a private message from one user.

use chatrelay_core::source::{Source, SourceEmitter, SourceParams};
use chatrelay_types::error::SourceError;
use chatrelay_types::message::{ChatMessage, ReplyStatus, UserInfo};
use console::style;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleOptions {
    /// Id of the user typing on the console.
    pub user_id: String,
    /// Name the relay answers under.
    pub bot_name: String,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            user_id: "console-user".to_string(),
            bot_name: "relay".to_string(),
        }
    }
}

pub struct ConsoleSource {
    name: String,
    options: ConsoleOptions,
    params: SourceParams,
    me: UserInfo,
}

impl ConsoleSource {
    pub fn new(name: &str, options: ConsoleOptions) -> Self {
        let me = UserInfo::new(options.bot_name.clone());
        Self {
            name: name.to_string(),
            options,
            params: SourceParams::default(),
            me,
        }
    }

    /// Inbound message for one typed line, or `None` for a blank line.
    pub fn message_for_line(&self, line: &str) -> Option<ChatMessage> {
        let text = line.trim();
        if text.is_empty() {
            return None;
        }
        let mut message = ChatMessage::text(text);
        message.from_id = Some(self.options.user_id.clone());
        message.sender_id = Some(self.options.user_id.clone());
        message.sender_name = Some(self.options.user_id.clone());
        message.to_info = vec![self.me.clone()];
        message.message_id = Some(uuid::Uuid::now_v7().to_string());
        Some(message)
    }

    /// Line printed for an outbound message.
    pub fn render(&self, message: &ChatMessage) -> String {
        let name = style(format!("{}>", self.me.user_name)).cyan().bold();
        match (message.content.filter_text(), message.status) {
            (Some(text), ReplyStatus::Reasoning) => format!("{name} {}", style(text).dim().italic()),
            (Some(text), ReplyStatus::Content) => format!("{name} {text}"),
            (None, _) => format!(
                "{name} {}",
                style(format!("[{}]", message.message_type())).yellow()
            ),
        }
    }
}

impl Source for ConsoleSource {
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
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| SourceError::Send(format!("stdin: {e}")))?;
            let Some(line) = line else {
                tracing::debug!(source = %self.name, "stdin closed");
                return Ok(());
            };
            if let Some(message) = self.message_for_line(&line) {
                emitter.emit(message).await?;
            }
        }
    }

    async fn send_message(
        &self,
        message: &ChatMessage,
        _from: Option<&ChatMessage>,
    ) -> Result<(), SourceError> {
        println!("{}", self.render(message));
        Ok(())
    }
}
