//! `relay match`: dry-run rule selection for one message.

use std::path::Path;

use anyhow::{Context, Result};
use chatrelay_core::rule::matcher::{SenderInfo, match_rule};
use chatrelay_types::message::{AtField, ChatMessage, UserInfo};
use chatrelay_types::rule::MessageRule;
use console::style;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct MatchReport<'a> {
    matched: bool,
    /// Position of the rule in the rules file.
    index: Option<usize>,
    rule: Option<&'a MessageRule>,
}

/// Sender as rule filters see it: name falls back to id.
fn sender(message: &ChatMessage) -> UserInfo {
    let mut user = UserInfo::new(message.sender_id.clone().unwrap_or_default());
    if let Some(name) = &message.sender_name {
        user.user_name = name.clone();
    }
    user
}

/// Index of the rule that handles `message`, if any.
pub fn select(rules: &[MessageRule], message: &ChatMessage, me: Option<&UserInfo>) -> Option<usize> {
    let user = sender(message);
    let info = SenderInfo {
        user: &user,
        me,
        at_field: AtField::UserId,
    };
    let chosen = match_rule(rules, message, info)?;
    rules.iter().position(|rule| std::ptr::eq(rule, chosen))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("malformed JSON in {}", path.display()))
}

pub async fn match_message(
    rules_path: &Path,
    message_path: &Path,
    me: Option<String>,
    json: bool,
) -> Result<()> {
    let rules: Vec<MessageRule> = read_json(rules_path).await?;
    let message: ChatMessage = read_json(message_path).await?;
    let me = me.map(UserInfo::new);

    let index = select(&rules, &message, me.as_ref());
    let report = MatchReport {
        matched: index.is_some(),
        index,
        rule: index.map(|i| &rules[i]),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match (report.index, report.rule) {
        (Some(index), Some(rule)) => println!(
            "  {} rule #{} -> {} (order {})",
            style("✓").green().bold(),
            index,
            style(&rule.instance_name).cyan(),
            rule.order
        ),
        _ => println!("  {} no match", style("✗").red()),
    }
    Ok(())
}
