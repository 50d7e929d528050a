//! Message rule matcher.
//!
//! Selection is a pure function of `(rules, message, sender)`:
//! - candidates are visited in ascending `order`, ties in declaration order
//! - each configured filter must pass; unset filters never reject
//! - the first passing rule wins, `None` means "do not respond"
//!
//! A `GroupMode::Deny` rule passes for group messages so that it can claim
//! them; the agent answers nothing for a claimed group message.

use std::sync::LazyLock;

use chatrelay_types::message::{AtField, ChatContent, ChatMessage, UserInfo};
use chatrelay_types::rule::{ContentRule, ContentRuleKind, GroupMode, MessageRule, UserMode};
use dashmap::DashMap;
use regex::Regex;

/// Compiled rule patterns, `None` for a pattern that does not compile.
static COMPILED: LazyLock<DashMap<String, Option<Regex>>> = LazyLock::new(DashMap::new);

/// Who sent the message and who the relay is on the source.
#[derive(Debug, Clone, Copy)]
pub struct SenderInfo<'a> {
    /// The sending user.
    pub user: &'a UserInfo,
    /// The relay's own account on the source, if known.
    pub me: Option<&'a UserInfo>,
    /// Which field of `me` appears in `at_list`.
    pub at_field: AtField,
}

/// Return the rule that handles `message`, if any.
pub fn match_rule<'r>(
    rules: &'r [MessageRule],
    message: &ChatMessage,
    sender: SenderInfo<'_>,
) -> Option<&'r MessageRule> {
    by_order(rules)
        .into_iter()
        .find(|rule| rule_matches(rule, message, sender))
}

/// Return every rule that matches `message`, in evaluation order.
///
/// Used for skill rules, where all matching skills apply.
pub fn match_all<'r>(
    rules: &'r [MessageRule],
    message: &ChatMessage,
    sender: SenderInfo<'_>,
) -> Vec<&'r MessageRule> {
    by_order(rules)
        .into_iter()
        .filter(|rule| rule_matches(rule, message, sender))
        .collect()
}

fn by_order(rules: &[MessageRule]) -> Vec<&MessageRule> {
    let mut ordered: Vec<&MessageRule> = rules.iter().collect();
    // stable: equal orders keep declaration order
    ordered.sort_by_key(|rule| rule.order);
    ordered
}

/// Whether every configured filter of `rule` accepts `message`.
pub fn rule_matches(rule: &MessageRule, message: &ChatMessage, sender: SenderInfo<'_>) -> bool {
    user_passes(rule, message, sender.user)
        && group_passes(rule, message)
        && type_passes(rule, message)
        && content_passes(rule, message)
        && respond_to_passes(rule, message, sender)
}

fn user_passes(rule: &MessageRule, message: &ChatMessage, user: &UserInfo) -> bool {
    if message.is_group_chat && !rule.check_user_in_group {
        return true;
    }
    if rule.user_mode == UserMode::All {
        return true;
    }
    if rule.from_user_names.is_empty() && rule.from_nick_names.is_empty() {
        return true;
    }

    let listed = rule.from_user_names.iter().any(|n| *n == user.user_name)
        || user
            .nick_name
            .as_ref()
            .is_some_and(|nick| rule.from_nick_names.contains(nick));

    match rule.user_mode {
        UserMode::Whitelist => listed,
        UserMode::Blacklist => !listed,
        UserMode::All => true,
    }
}

fn group_passes(rule: &MessageRule, message: &ChatMessage) -> bool {
    if !message.is_group_chat {
        return true;
    }
    let Some(name_rule) = &rule.group_name_rule else {
        return true;
    };
    let group_name = message.group_info().map(UserInfo::display_name).unwrap_or("");

    match rule.group_mode {
        GroupMode::Deny => true,
        GroupMode::Whitelist => text_matches(name_rule, group_name),
        GroupMode::Blacklist => !text_matches(name_rule, group_name),
    }
}

fn type_passes(rule: &MessageRule, message: &ChatMessage) -> bool {
    if rule.message_types.is_empty() {
        return true;
    }
    let message_type = message.message_type();
    rule.message_types.iter().any(|t| t.accepts(message_type))
}

fn content_passes(rule: &MessageRule, message: &ChatMessage) -> bool {
    let Some(filter) = &rule.content_filter else {
        return true;
    };
    match message.content.filter_text() {
        Some(text) => text_matches(filter, text),
        None => true,
    }
}

/// Whether `message` is meant for the relay: every private message, and
/// group messages that mention the relay's account.
pub fn addressed_to_me(message: &ChatMessage, sender: SenderInfo<'_>) -> bool {
    if !message.is_group_chat {
        return true;
    }
    sender.me.is_some_and(|me| {
        let handle = me.at_value(sender.at_field);
        message.at_list.iter().any(|at| at == handle)
    })
}

fn respond_to_passes(rule: &MessageRule, message: &ChatMessage, sender: SenderInfo<'_>) -> bool {
    if !message.is_group_chat {
        return true;
    }
    let Some(respond_to) = &rule.respond_to else {
        return true;
    };

    let mentioned = respond_to.at
        && sender.me.is_some_and(|me| {
            let handle = me.at_value(sender.at_field);
            message.at_list.iter().any(|at| at == handle)
        });

    let named = !respond_to.names.is_empty()
        && message.content.is_text_bearing()
        && message.content.plain_text().is_some_and(|text| {
            let text = text.trim_start();
            respond_to
                .names
                .iter()
                .any(|name| !name.is_empty() && text.starts_with(name.as_str()))
        });

    let quoted = respond_to.refered
        && match (&message.content, sender.me) {
            (ChatContent::Ref { ref_message: Some(quoted), .. }, Some(me)) => {
                quoted.sender_id.as_deref() == Some(me.user_id.as_str())
            }
            _ => false,
        };

    mentioned || named || quoted
}

/// Evaluate a content rule against `text`.
///
/// An invalid regex never matches.
pub fn text_matches(rule: &ContentRule, text: &str) -> bool {
    match rule.kind {
        ContentRuleKind::StartsWith => text.starts_with(rule.content.as_str()),
        ContentRuleKind::Contains => text.contains(rule.content.as_str()),
        ContentRuleKind::Regex => compiled(&rule.content).is_some_and(|re| re.is_match(text)),
        ContentRuleKind::In => {
            let text = text.trim();
            rule.in_list().any(|entry| entry == text)
        }
    }
}

/// Compile `pattern` once per process.
fn compiled(pattern: &str) -> Option<Regex> {
    if let Some(cached) = COMPILED.get(pattern) {
        return cached.value().clone();
    }
    let re = match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!(pattern, "invalid rule regex: {err}");
            None
        }
    };
    COMPILED
        .entry(pattern.to_string())
        .or_insert(re)
        .value()
        .clone()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
