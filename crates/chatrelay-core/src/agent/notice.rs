//! Fixed notices the relay may send instead of, or besides, an answer.

use chatrelay_types::config::AgentConfig;

/// A user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The conversation is busy with an earlier question.
    Busy,
    /// The admission slot of a turn expired.
    Timeout,
    /// The bot produced no answer at all.
    Fallback,
    /// The turn failed; carries the internal error text.
    Error(String),
}

impl Notice {
    /// Text to send for this notice, or `None` when nothing is configured.
    ///
    /// Internal error text is only exposed with `send_error_detail`.
    pub fn render(&self, config: &AgentConfig) -> Option<String> {
        let text = match self {
            Notice::Busy => Some(config.busy_tips.clone()),
            Notice::Timeout => config.timeout_tips.clone(),
            Notice::Fallback => config.fallback_answer.clone(),
            Notice::Error(detail) if config.send_error_detail => Some(detail.clone()),
            Notice::Error(_) => Some(config.error_tips.clone()),
        };
        text.filter(|t| !t.is_empty())
    }
}
