//! Data models for GroupMe.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque message identifier.
///
/// GroupMe ids grow with recency, but the search engine never compares them:
/// it only hands the oldest id of a page back to the API as `before_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a raw id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as sent over the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        string_or_number(deserializer).map(Self)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message in a group or direct conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID.
    pub id: MessageId,
    /// Message text. Absent for uploads without a caption.
    #[serde(default)]
    pub text: Option<String>,
    /// Display name of the sender at the time of sending.
    #[serde(rename = "name", default, deserialize_with = "null_as_default")]
    pub author_name: String,
    /// Unix timestamp (seconds) when the message was sent.
    #[serde(default)]
    pub created_at: i64,
    /// Every other field of the API record, kept as-is.
    #[serde(flatten)]
    pub raw: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    /// Build a message without extra fields.
    #[must_use]
    pub fn new(id: impl Into<String>, text: Option<&str>, author_name: &str, created_at: i64) -> Self {
        Self {
            id: MessageId::new(id),
            text: text.map(String::from),
            author_name: author_name.to_string(),
            created_at,
            raw: serde_json::Map::new(),
        }
    }
}

/// Kind of conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// A group chat.
    Group,
    /// A one-on-one chat, addressed by the other user's id.
    Direct,
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => write!(f, "group"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// A searchable conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Group id, or the other user's id for direct chats.
    pub id: String,
    /// Group name, or the other user's display name for direct chats.
    pub name: String,
    /// Whether this is a group or a direct chat.
    pub kind: ConversationKind,
}

impl Conversation {
    /// Build a group conversation.
    #[must_use]
    pub fn group(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ConversationKind::Group,
        }
    }

    /// Build a direct conversation with another user.
    #[must_use]
    pub fn direct(other_user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: other_user_id.into(),
            name: name.into(),
            kind: ConversationKind::Direct,
        }
    }
}

/// Standard GroupMe response wrapper: `{"response": ..., "meta": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub response: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GroupMessages {
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DirectMessages {
    #[serde(default)]
    pub direct_messages: Vec<Message>,
}

/// Entry of `GET /groups`.
#[derive(Debug, Deserialize)]
pub(crate) struct GroupRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

impl From<GroupRecord> for Conversation {
    fn from(record: GroupRecord) -> Self {
        Self::group(record.id, record.name)
    }
}

/// Entry of `GET /chats`; the useful part is nested under `other_user`.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatRecord {
    pub other_user: UserRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

impl From<ChatRecord> for Conversation {
    fn from(record: ChatRecord) -> Self {
        Self::direct(record.other_user.id, record.other_user.name)
    }
}

/// Accept ids sent either as JSON strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
