//! Message rule types.
//!
//! A `MessageRule` selects which bot or skill instance handles an inbound
//! message. Every filter is optional; an unset filter never rejects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::message::MessageType;

/// How a [`ContentRule`] compares text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentRuleKind {
    StartsWith,
    Contains,
    Regex,
    /// `content` is a list separated by `,` or `，`; the text must equal one entry.
    In,
}

/// A text predicate used for group names and message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRule {
    #[serde(rename = "type")]
    pub kind: ContentRuleKind,
    pub content: String,
}

impl ContentRule {
    pub fn new(kind: ContentRuleKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// Entries of an `in` list, trimmed, empty entries skipped.
    pub fn in_list(&self) -> impl Iterator<Item = &str> {
        self.content
            .split([',', '，'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Group chat policy of a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    /// The rule claims every group message and answers none of them.
    Deny,
    /// Group name must match `group_name_rule` (when set).
    #[default]
    Whitelist,
    /// Group name must not match `group_name_rule`.
    Blacklist,
}

/// User filter policy of a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserMode {
    /// Ignore user lists entirely.
    All,
    #[default]
    Whitelist,
    Blacklist,
}

/// Group-only gate: at least one configured condition must hold.
///
/// An empty `RespondTo {}` means the rule responds to nothing in groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondTo {
    /// The bot account is mentioned in `at_list`.
    #[serde(default)]
    pub at: bool,
    /// The text starts with one of these names.
    #[serde(default)]
    pub names: Vec<String>,
    /// The message quotes a message sent by the bot account.
    #[serde(default)]
    pub refered: bool,
}

impl RespondTo {
    pub fn is_empty(&self) -> bool {
        !self.at && !self.refered && self.names.is_empty()
    }
}

/// Which side of a turn a skill rule applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillApplyOn {
    #[default]
    All,
    Source,
    Reply,
}

impl SkillApplyOn {
    pub fn on_source(&self) -> bool {
        matches!(self, SkillApplyOn::All | SkillApplyOn::Source)
    }

    pub fn on_reply(&self) -> bool {
        matches!(self, SkillApplyOn::All | SkillApplyOn::Reply)
    }
}

/// When a reply skill runs: on every fragment, or once on the full answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillWhenReplyStatus {
    #[default]
    Part,
    Complete,
}

/// An entry of a rule's message type filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeSelector {
    /// Wildcard, written as `"ALL"`.
    All,
    Only(MessageType),
}

impl TypeSelector {
    pub fn accepts(&self, message_type: MessageType) -> bool {
        match self {
            TypeSelector::All => true,
            TypeSelector::Only(t) => *t == message_type,
        }
    }
}

impl fmt::Display for TypeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSelector::All => f.write_str("ALL"),
            TypeSelector::Only(t) => t.fmt(f),
        }
    }
}

impl FromStr for TypeSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(TypeSelector::All)
        } else {
            s.parse().map(TypeSelector::Only)
        }
    }
}

impl TryFrom<String> for TypeSelector {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeSelector> for String {
    fn from(value: TypeSelector) -> Self {
        value.to_string()
    }
}

/// A routing rule binding matching messages to a bot or skill instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRule {
    /// Instance that handles matching messages.
    pub instance_name: String,

    /// Lower wins; ties keep declaration order.
    #[serde(default = "default_order")]
    pub order: i32,

    #[serde(default)]
    pub from_user_names: Vec<String>,
    #[serde(default)]
    pub from_nick_names: Vec<String>,
    /// Apply the user filter inside group chats too.
    #[serde(default)]
    pub check_user_in_group: bool,
    #[serde(default)]
    pub user_mode: UserMode,

    #[serde(default)]
    pub group_mode: GroupMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name_rule: Option<ContentRule>,

    /// Empty means every type.
    #[serde(default)]
    pub message_types: Vec<TypeSelector>,
    /// Only evaluated against `TEXT` and `REF` content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_filter: Option<ContentRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respond_to: Option<RespondTo>,

    #[serde(default)]
    pub skill_apply_on: SkillApplyOn,
    #[serde(default)]
    pub skill_when_reply_status: SkillWhenReplyStatus,
}

fn default_order() -> i32 {
    100
}

impl MessageRule {
    /// A rule with no filters targeting `instance_name`.
    pub fn for_instance(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            order: default_order(),
            from_user_names: Vec::new(),
            from_nick_names: Vec::new(),
            check_user_in_group: false,
            user_mode: UserMode::default(),
            group_mode: GroupMode::default(),
            group_name_rule: None,
            message_types: Vec::new(),
            content_filter: None,
            respond_to: None,
            skill_apply_on: SkillApplyOn::default(),
            skill_when_reply_status: SkillWhenReplyStatus::default(),
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}
