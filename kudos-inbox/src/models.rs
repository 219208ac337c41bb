use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::timestamp::{self, Timestamp};

// --- Partition ---

/// One of the two disjoint buckets a notification is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    Message,
    Other,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 2] = [PartitionKind::Message, PartitionKind::Other];
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => f.write_str("message"),
            Self::Other => f.write_str("other"),
        }
    }
}

// --- NotificationType ---

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationType {
    Message,
    Appraisal,
    Cycle,
    Course,
    /// Any tag this client does not know, kept verbatim.
    Other(String),
}

/// Where opening a notification takes the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    Conversation { user_id: Option<String> },
    Appraisals,
    Cycles,
    Courses,
    NotificationCenter,
}

impl NotificationType {
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        if code.eq_ignore_ascii_case("MESSAGE") {
            Self::Message
        } else if code.eq_ignore_ascii_case("APPRAISAL") {
            Self::Appraisal
        } else if code.eq_ignore_ascii_case("CYCLE") {
            Self::Cycle
        } else if code.eq_ignore_ascii_case("COURSE") {
            Self::Course
        } else {
            Self::Other(code.to_string())
        }
    }

    /// Wire code; also the key used when sorting by type.
    pub fn code(&self) -> &str {
        match self {
            Self::Message => "MESSAGE",
            Self::Appraisal => "APPRAISAL",
            Self::Cycle => "CYCLE",
            Self::Course => "COURSE",
            Self::Other(code) => code,
        }
    }

    pub fn partition(&self) -> PartitionKind {
        match self {
            Self::Message => PartitionKind::Message,
            Self::Appraisal | Self::Cycle | Self::Course | Self::Other(_) => PartitionKind::Other,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Message => "chat",
            Self::Appraisal => "star",
            Self::Cycle => "refresh",
            Self::Course => "book",
            Self::Other(_) => "bell",
        }
    }
}

impl Serialize for NotificationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for NotificationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from_code(&code))
    }
}

// --- Identifiers ---

/// Ids arrive as JSON numbers or strings; both are held as strings.
pub(crate) mod id_string {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "expected a string or number id, got {other}"
            ))),
        }
    }

    pub fn serialize<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }
}

/// Explicit `null` reads as the type's default, same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    #[serde(alias = "userId", with = "id_string")]
    pub id: String,
    #[serde(
        default,
        alias = "fullName",
        alias = "displayName",
        deserialize_with = "null_as_default"
    )]
    pub name: String,
}

// --- Notification ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "WireNotification")]
pub struct Notification {
    #[serde(with = "id_string")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub sender: Option<Party>,
    pub recipient: Option<Party>,
    pub content: String,
    #[serde(with = "timestamp::lenient")]
    pub timestamp: Option<Timestamp>,
    pub notification_is_read: bool,
    pub notification_is_seen: bool,
    pub message_count: u32,
    /// Wire fields this client does not model; preserved across merges.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Deserialization shape: the text may come as `content` or `message`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNotification {
    #[serde(deserialize_with = "id_string::deserialize")]
    id: String,
    #[serde(rename = "type")]
    kind: NotificationType,
    #[serde(default)]
    sender: Option<Party>,
    #[serde(default)]
    recipient: Option<Party>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, deserialize_with = "timestamp::lenient::deserialize")]
    timestamp: Option<Timestamp>,
    #[serde(default, deserialize_with = "null_as_default")]
    notification_is_read: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    notification_is_seen: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    message_count: u32,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<WireNotification> for Notification {
    fn from(wire: WireNotification) -> Self {
        Self {
            id: wire.id,
            kind: wire.kind,
            sender: wire.sender,
            recipient: wire.recipient,
            content: wire.content.or(wire.message).unwrap_or_default(),
            timestamp: wire.timestamp,
            notification_is_read: wire.notification_is_read,
            notification_is_seen: wire.notification_is_seen,
            message_count: wire.message_count,
            extra: wire.extra,
        }
    }
}

impl Notification {
    pub fn new(id: impl Into<String>, kind: NotificationType, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            sender: None,
            recipient: None,
            content: content.into(),
            timestamp: None,
            notification_is_read: false,
            notification_is_seen: false,
            message_count: 0,
            extra: Map::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_sender(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.sender = Some(Party { id: id.into(), name: name.into() });
        self
    }

    pub fn partition(&self) -> PartitionKind {
        self.kind.partition()
    }

    pub fn is_message(&self) -> bool {
        self.partition() == PartitionKind::Message
    }

    pub fn target(&self) -> NotificationTarget {
        match self.kind {
            NotificationType::Message => NotificationTarget::Conversation {
                user_id: self.sender.as_ref().map(|s| s.id.clone()),
            },
            NotificationType::Appraisal => NotificationTarget::Appraisals,
            NotificationType::Cycle => NotificationTarget::Cycles,
            NotificationType::Course => NotificationTarget::Courses,
            NotificationType::Other(_) => NotificationTarget::NotificationCenter,
        }
    }
}

// --- NotificationUpdate ---

/// Partial notification for `upsert`: absent fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationUpdate {
    #[serde(deserialize_with = "id_string::deserialize")]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<NotificationType>,
    #[serde(default)]
    pub sender: Option<Party>,
    #[serde(default)]
    pub recipient: Option<Party>,
    #[serde(default, alias = "message")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "timestamp::lenient::deserialize")]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub notification_is_read: Option<bool>,
    #[serde(default)]
    pub notification_is_seen: Option<bool>,
    #[serde(default)]
    pub message_count: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NotificationUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Shallow merge onto `target`. Returns whether anything changed.
    pub(crate) fn merge_into(&self, target: &mut Notification) -> bool {
        let before = target.clone();

        if let Some(kind) = &self.kind {
            target.kind = kind.clone();
        }
        if let Some(sender) = &self.sender {
            target.sender = Some(sender.clone());
        }
        if let Some(recipient) = &self.recipient {
            target.recipient = Some(recipient.clone());
        }
        if let Some(content) = &self.content {
            target.content = content.clone();
        }
        if let Some(ts) = self.timestamp {
            target.timestamp = Some(ts);
        }
        if let Some(read) = self.notification_is_read {
            target.notification_is_read = read;
        }
        if let Some(seen) = self.notification_is_seen {
            target.notification_is_seen = seen;
        }
        if let Some(count) = self.message_count {
            target.message_count = count;
        }
        for (key, value) in &self.extra {
            target.extra.insert(key.clone(), value.clone());
        }

        *target != before
    }

    /// Build a fresh entry for `partition` when the id is not stored yet.
    pub(crate) fn into_notification(self, partition: PartitionKind) -> Notification {
        let kind = self.kind.unwrap_or(match partition {
            PartitionKind::Message => NotificationType::Message,
            PartitionKind::Other => NotificationType::Other(String::new()),
        });

        Notification {
            id: self.id,
            kind,
            sender: self.sender,
            recipient: self.recipient,
            content: self.content.unwrap_or_default(),
            timestamp: self.timestamp,
            notification_is_read: self.notification_is_read.unwrap_or(false),
            notification_is_seen: self.notification_is_seen.unwrap_or(false),
            message_count: self.message_count.unwrap_or(0),
            extra: self.extra,
        }
    }
}

// --- ConversationPreview ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPreview {
    #[serde(with = "id_string")]
    pub user_id: String,
    #[serde(
        default,
        alias = "userName",
        alias = "fullName",
        deserialize_with = "null_as_default"
    )]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_message: String,
    #[serde(default, with = "timestamp::lenient")]
    pub last_message_date: Option<Timestamp>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unread_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_last_message_read: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_last_message_from_me: bool,
}
