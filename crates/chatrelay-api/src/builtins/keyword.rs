//! Keyword reply skill: answers configured commands without asking the bot.

use std::collections::HashMap;

use chatrelay_core::skill::{Skill, SkillContext, SkillParams};
use chatrelay_types::error::SkillError;
use chatrelay_types::message::{ChatContent, ChatMessage};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywordOptions {
    /// Command text to fixed answer.
    pub replies: HashMap<String, String>,
    pub case_sensitive: bool,
}

pub struct KeywordReplySkill {
    name: String,
    replies: HashMap<String, String>,
    case_sensitive: bool,
    params: SkillParams,
}

impl KeywordReplySkill {
    pub fn new(name: &str, options: KeywordOptions) -> Self {
        let case_sensitive = options.case_sensitive;
        let replies = options
            .replies
            .into_iter()
            .map(|(keyword, reply)| (normalize(&keyword, case_sensitive), reply))
            .collect();
        Self {
            name: name.to_string(),
            replies,
            case_sensitive,
            params: SkillParams {
                apply_on_source: true,
                apply_on_reply: false,
            },
        }
    }

    /// Fixed answer for `text`, if it is a configured command.
    pub fn reply_for(&self, text: &str) -> Option<&str> {
        self.replies
            .get(&normalize(text, self.case_sensitive))
            .map(String::as_str)
    }
}

fn normalize(text: &str, case_sensitive: bool) -> String {
    let text = text.trim();
    if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}

impl Skill for KeywordReplySkill {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &SkillParams {
        &self.params
    }

    async fn apply_on_source(
        &self,
        message: ChatMessage,
        ctx: &SkillContext,
    ) -> Result<Option<ChatMessage>, SkillError> {
        let Some(reply) = message.content.filter_text().and_then(|t| self.reply_for(t)) else {
            return Ok(Some(message));
        };
        tracing::debug!(skill = %self.name, conversation = %ctx.key, "keyword answered");
        ctx.reply
            .post(ChatContent::text(reply))
            .map_err(|e| SkillError::Failed(e.to_string()))?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(case_sensitive: bool) -> KeywordReplySkill {
        let options = KeywordOptions {
            replies: HashMap::from([("/Help".to_string(), "try /ping".to_string())]),
            case_sensitive,
        };
        KeywordReplySkill::new("commands", options)
    }

    #[test]
    fn matches_trimmed_text_ignoring_case() {
        let skill = skill(false);
        assert_eq!(skill.reply_for("  /HELP "), Some("try /ping"));
        assert_eq!(skill.reply_for("/help me"), None);
    }

    #[test]
    fn case_sensitive_matching() {
        let skill = skill(true);
        assert_eq!(skill.reply_for("/Help"), Some("try /ping"));
        assert_eq!(skill.reply_for("/help"), None);
    }
}
