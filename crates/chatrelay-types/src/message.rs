//! Normalized chat message types shared by sources, bots and the agent.
//!
//! A [`ChatMessage`] is the platform-independent envelope every source emits
//! and every outbound reply is built from. The payload is a [`ChatContent`]
//! variant keyed by [`MessageType`], so the type tag and the payload shape can
//! never disagree.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a chat message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Plain text or markdown.
    Text,
    /// Ordered mix of text and media items.
    RichText,
    Image,
    Audio,
    Video,
    Article,
    Music,
    File,
    Emotion,
    /// Mini program card.
    Mp,
    /// A reply quoting another message.
    Ref,
    Position,
    Phone,
    FriendRequest,
    ContactCard,
    Card,
    Recall,
    Pat,
    System,
    Subscribe,
    Unsubscribe,
    Custom,
}

impl MessageType {
    /// All message types, in declaration order.
    pub const ALL: [MessageType; 22] = [
        MessageType::Text,
        MessageType::RichText,
        MessageType::Image,
        MessageType::Audio,
        MessageType::Video,
        MessageType::Article,
        MessageType::Music,
        MessageType::File,
        MessageType::Emotion,
        MessageType::Mp,
        MessageType::Ref,
        MessageType::Position,
        MessageType::Phone,
        MessageType::FriendRequest,
        MessageType::ContactCard,
        MessageType::Card,
        MessageType::Recall,
        MessageType::Pat,
        MessageType::System,
        MessageType::Subscribe,
        MessageType::Unsubscribe,
        MessageType::Custom,
    ];

    /// Wire name of the type (e.g. `"RICH_TEXT"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "TEXT",
            MessageType::RichText => "RICH_TEXT",
            MessageType::Image => "IMAGE",
            MessageType::Audio => "AUDIO",
            MessageType::Video => "VIDEO",
            MessageType::Article => "ARTICLE",
            MessageType::Music => "MUSIC",
            MessageType::File => "FILE",
            MessageType::Emotion => "EMOTION",
            MessageType::Mp => "MP",
            MessageType::Ref => "REF",
            MessageType::Position => "POSITION",
            MessageType::Phone => "PHONE",
            MessageType::FriendRequest => "FRIEND_REQUEST",
            MessageType::ContactCard => "CONTACT_CARD",
            MessageType::Card => "CARD",
            MessageType::Recall => "RECALL",
            MessageType::Pat => "PAT",
            MessageType::System => "SYSTEM",
            MessageType::Subscribe => "SUBSCRIBE",
            MessageType::Unsubscribe => "UNSUBSCRIBE",
            MessageType::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        MessageType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| format!("invalid message type: '{s}'"))
    }
}

/// Whether a message carries a model's reasoning trace or its answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Reasoning,
    #[default]
    Content,
}

/// Reference to a media file owned by a source or bot.
///
/// The core never reads the bytes; adapters resolve `uri` themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// File name shown to users.
    pub name: String,
    /// Local path, URL or adapter-specific handle.
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl MediaRef {
    /// Media reference derived from a URL; the last path segment becomes the name.
    pub fn from_url(url: impl Into<String>) -> Self {
        let uri = url.into();
        let name = uri
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .unwrap_or("file")
            .to_string();
        Self {
            name,
            uri,
            mime: None,
            size_bytes: None,
        }
    }
}

/// One element of a rich text message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RichTextItem {
    Text(String),
    Image(MediaRef),
    Video(MediaRef),
    File(MediaRef),
    /// A mention of a user id.
    At(String),
    Custom(serde_json::Value),
}

/// How a card payload should be interpreted by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// `template` is a template structure, `content` the bound variables.
    Template,
    /// `template` is a platform template id, `content` the bound variables.
    TemplateId,
    /// `content` is the full card.
    Content,
}

/// Payload of a chat message, tagged by its [`MessageType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatContent {
    Text(String),
    RichText {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        items: Vec<RichTextItem>,
    },
    Image(MediaRef),
    Audio {
        file: MediaRef,
        /// Transcript, when the source or a skill produced one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Video {
        file: MediaRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preview: Option<MediaRef>,
    },
    Article {
        title: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        desc: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cover: Option<MediaRef>,
    },
    Music {
        file: MediaRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    File {
        file: MediaRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Emotion {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        preview_url: String,
    },
    Mp {
        title: String,
        open_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        desc: Option<String>,
    },
    Ref {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ref_message: Option<Box<ChatMessage>>,
    },
    Position {
        place_name: String,
        lon: f64,
        lat: f64,
        #[serde(default)]
        place_detail: String,
    },
    Phone {
        title: String,
        time: DateTime<Utc>,
    },
    FriendRequest(serde_json::Value),
    ContactCard {
        display: String,
        #[serde(default)]
        small_image_url: String,
    },
    Card {
        kind: CardKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
        content: serde_json::Value,
    },
    Recall {
        display: String,
        source_message_id: String,
    },
    Pat {
        text: String,
    },
    System(serde_json::Value),
    Subscribe,
    Unsubscribe,
    Custom {
        name: String,
        data: serde_json::Value,
    },
}

impl ChatContent {
    /// Shorthand for a text payload.
    pub fn text(text: impl Into<String>) -> Self {
        ChatContent::Text(text.into())
    }

    /// The message type this payload is tagged with.
    pub fn message_type(&self) -> MessageType {
        match self {
            ChatContent::Text(_) => MessageType::Text,
            ChatContent::RichText { .. } => MessageType::RichText,
            ChatContent::Image(_) => MessageType::Image,
            ChatContent::Audio { .. } => MessageType::Audio,
            ChatContent::Video { .. } => MessageType::Video,
            ChatContent::Article { .. } => MessageType::Article,
            ChatContent::Music { .. } => MessageType::Music,
            ChatContent::File { .. } => MessageType::File,
            ChatContent::Emotion { .. } => MessageType::Emotion,
            ChatContent::Mp { .. } => MessageType::Mp,
            ChatContent::Ref { .. } => MessageType::Ref,
            ChatContent::Position { .. } => MessageType::Position,
            ChatContent::Phone { .. } => MessageType::Phone,
            ChatContent::FriendRequest(_) => MessageType::FriendRequest,
            ChatContent::ContactCard { .. } => MessageType::ContactCard,
            ChatContent::Card { .. } => MessageType::Card,
            ChatContent::Recall { .. } => MessageType::Recall,
            ChatContent::Pat { .. } => MessageType::Pat,
            ChatContent::System(_) => MessageType::System,
            ChatContent::Subscribe => MessageType::Subscribe,
            ChatContent::Unsubscribe => MessageType::Unsubscribe,
            ChatContent::Custom { .. } => MessageType::Custom,
        }
    }

    /// Text used by content filters: only `TEXT` and `REF` payloads carry it.
    pub fn filter_text(&self) -> Option<&str> {
        match self {
            ChatContent::Text(text) => Some(text),
            ChatContent::Ref { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Whether mentions and name prefixes are meaningful for this payload.
    pub fn is_text_bearing(&self) -> bool {
        matches!(
            self,
            ChatContent::Text(_) | ChatContent::Ref { .. } | ChatContent::RichText { .. }
        )
    }

    /// Best-effort plain text of the payload, used for prompts and word counts.
    pub fn plain_text(&self) -> Option<String> {
        match self {
            ChatContent::Text(text) => Some(text.clone()),
            ChatContent::Ref { text, .. } => Some(text.clone()),
            ChatContent::RichText { items, .. } => {
                let joined: String = items
                    .iter()
                    .filter_map(|item| match item {
                        RichTextItem::Text(text) => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                Some(joined)
            }
            ChatContent::Audio { text, .. } => text.clone(),
            ChatContent::Pat { text } => Some(text.clone()),
            _ => None,
        }
    }
}

/// Which user field a source puts into `at_list`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtField {
    #[default]
    UserId,
    UserName,
    NickName,
}

/// A user or group as seen by a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick_name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
}

impl UserInfo {
    /// Build a user with the same id and user name.
    pub fn new(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            user_name: user_id.clone(),
            user_id,
            nick_name: None,
            is_group: false,
        }
    }

    /// Name used for group filters: nick name, then user name, then id.
    pub fn display_name(&self) -> &str {
        match &self.nick_name {
            Some(nick) if !nick.is_empty() => nick,
            _ if !self.user_name.is_empty() => &self.user_name,
            _ => &self.user_id,
        }
    }

    /// Value this user is mentioned by, given the source's `at_list` convention.
    pub fn at_value(&self, field: AtField) -> &str {
        match field {
            AtField::UserId => &self.user_id,
            AtField::UserName => &self.user_name,
            AtField::NickName => self.nick_name.as_deref().unwrap_or(&self.user_name),
        }
    }
}

/// A normalized chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: ChatContent,
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
    /// Conversation origin: the sender for private chats, the group for group chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub is_group_chat: bool,
    /// Recipients; for group messages the first entry is the group.
    #[serde(default)]
    pub to_info: Vec<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub at_list: Vec<String>,
    #[serde(default)]
    pub status: ReplyStatus,
}

impl ChatMessage {
    /// A bare message with the given payload and no addressing.
    pub fn new(content: ChatContent) -> Self {
        Self {
            content,
            time: Utc::now(),
            from_id: None,
            sender_id: None,
            sender_name: None,
            is_group_chat: false,
            to_info: Vec::new(),
            message_id: None,
            at_list: Vec::new(),
            status: ReplyStatus::Content,
        }
    }

    /// Shorthand for a bare text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(ChatContent::text(text))
    }

    /// The message type of the payload.
    pub fn message_type(&self) -> MessageType {
        self.content.message_type()
    }

    /// Group descriptor for group chats.
    pub fn group_info(&self) -> Option<&UserInfo> {
        if self.is_group_chat {
            self.to_info.first()
        } else {
            None
        }
    }

    /// Identifier of the conversation this message belongs to.
    ///
    /// Group chats are keyed by group, private chats by sender.
    pub fn conversation_id(&self) -> Option<&str> {
        if self.is_group_chat {
            self.from_id
                .as_deref()
                .or_else(|| self.group_info().map(|g| g.user_id.as_str()))
        } else {
            self.sender_id.as_deref().or(self.from_id.as_deref())
        }
    }

    /// Build an outbound message answering `origin` in the same conversation.
    pub fn reply_to(origin: &ChatMessage, content: ChatContent, status: ReplyStatus) -> Self {
        let to_info = if origin.is_group_chat {
            origin.to_info.clone()
        } else {
            origin
                .sender_id
                .as_ref()
                .map(|id| {
                    let mut user = UserInfo::new(id.clone());
                    if let Some(name) = &origin.sender_name {
                        user.user_name = name.clone();
                    }
                    vec![user]
                })
                .unwrap_or_default()
        };

        Self {
            content,
            time: Utc::now(),
            from_id: origin.from_id.clone(),
            sender_id: None,
            sender_name: None,
            is_group_chat: origin.is_group_chat,
            to_info,
            message_id: None,
            at_list: Vec::new(),
            status,
        }
    }
}

/// Ordering and admission scope: one source instance plus one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    /// Source instance name.
    pub source: String,
    /// Group id for group chats, sender id otherwise.
    pub conversation: String,
}

impl ConversationKey {
    pub fn new(source: impl Into<String>, conversation: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            conversation: conversation.into(),
        }
    }

    /// Derive the key for a message received on `source`.
    ///
    /// Messages without any sender or origin id share one anonymous
    /// conversation per source.
    pub fn for_message(source: &str, message: &ChatMessage) -> Self {
        Self::new(source, message.conversation_id().unwrap_or("_anonymous"))
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.conversation)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
