//! Wire frames exchanged with the notification server.
//!
//! Frames are JSON objects discriminated by a `type` field:
//!
//! ```json
//! {"type": "ping", "timestamp": 1760600000000}
//! {"type": "join_group", "group_name": "task_42"}
//! {"type": "notification", "data": {"type": "new_task", "title": "X", "message": "Y", "priority": "high"}}
//! ```
//!
//! Unknown `type` values are kept verbatim as [`FrameType::Other`] so newer
//! servers can add frame kinds without breaking older clients.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use crate::notifications::Category;
use crate::{Error, Result};

/// Decode a field, falling back to its default when the value has an
/// unexpected shape. Only `type` decides whether a frame is usable.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Discriminator carried in the `type` field of every frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FrameType {
    /// Server-pushed notification (payload in `data`).
    Notification,
    /// Client keepalive.
    Ping,
    /// Keepalive response.
    Pong,
    /// Subscribe to a broadcast group.
    JoinGroup,
    /// Unsubscribe from a broadcast group.
    LeaveGroup,
    /// Greeting sent by the server once the socket is accepted.
    Connection,
    /// Server-side error report.
    Error,
    /// Any other frame kind, passed through untouched.
    Other(String),
}

impl FrameType {
    pub fn as_str(&self) -> &str {
        match self {
            FrameType::Notification => "notification",
            FrameType::Ping => "ping",
            FrameType::Pong => "pong",
            FrameType::JoinGroup => "join_group",
            FrameType::LeaveGroup => "leave_group",
            FrameType::Connection => "connection",
            FrameType::Error => "error",
            FrameType::Other(kind) => kind,
        }
    }
}

impl From<String> for FrameType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "notification" => FrameType::Notification,
            "ping" => FrameType::Ping,
            "pong" => FrameType::Pong,
            "join_group" => FrameType::JoinGroup,
            "leave_group" => FrameType::LeaveGroup,
            "connection" => FrameType::Connection,
            "error" => FrameType::Error,
            _ => FrameType::Other(s),
        }
    }
}

impl From<&str> for FrameType {
    fn from(s: &str) -> Self {
        FrameType::from(s.to_string())
    }
}

impl From<FrameType> for String {
    fn from(kind: FrameType) -> Self {
        match kind {
            FrameType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message on the real-time channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: FrameType,

    /// Type-specific structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Milliseconds since the epoch. Servers may send floats; anything else
    /// (the server echoes whatever the ping carried) decodes as `None`.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Number>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

impl Frame {
    /// Create a bare frame of the given kind.
    pub fn new(kind: impl Into<FrameType>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
            message: None,
            timestamp: None,
            user_id: None,
            group_name: None,
        }
    }

    /// Keepalive frame stamped with `timestamp_ms`.
    pub fn ping(timestamp_ms: i64) -> Self {
        Self {
            timestamp: Some(Number::from(timestamp_ms)),
            ..Self::new(FrameType::Ping)
        }
    }

    pub fn join_group(group_name: impl Into<String>) -> Self {
        Self {
            group_name: Some(group_name.into()),
            ..Self::new(FrameType::JoinGroup)
        }
    }

    pub fn leave_group(group_name: impl Into<String>) -> Self {
        Self {
            group_name: Some(group_name.into()),
            ..Self::new(FrameType::LeaveGroup)
        }
    }

    /// Notification frame, as sent by testing tools.
    pub fn notification(payload: &NotificationPayload) -> Result<Self> {
        Ok(Self {
            data: Some(serde_json::to_value(payload)?),
            ..Self::new(FrameType::Notification)
        })
    }

    /// Arbitrary passthrough frame.
    pub fn custom(kind: impl Into<FrameType>, data: Option<Value>) -> Self {
        Self {
            data,
            ..Self::new(kind)
        }
    }

    /// Parse an inbound text frame.
    ///
    /// Fails with [`Error::MalformedFrame`] unless the text is a JSON object
    /// carrying a non-empty string `type`. Other fields never reject a frame.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::MalformedFrame(e.to_string()))?;

        let Value::Object(map) = &value else {
            return Err(Error::MalformedFrame("frame is not a JSON object".into()));
        };
        match map.get("type") {
            Some(Value::String(kind)) if !kind.is_empty() => {}
            Some(_) => {
                return Err(Error::MalformedFrame(
                    "`type` must be a non-empty string".into(),
                ));
            }
            None => return Err(Error::MalformedFrame("missing `type` field".into())),
        }

        serde_json::from_value(value).map_err(|e| Error::MalformedFrame(e.to_string()))
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Timestamp truncated to whole milliseconds.
    pub fn timestamp_millis(&self) -> Option<i64> {
        let n = self.timestamp.as_ref()?;
        n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))
    }

    /// Typed payload of a `notification` frame, if it has one.
    pub fn notification_payload(&self) -> Option<NotificationPayload> {
        if self.kind != FrameType::Notification {
            return None;
        }
        let data = self.data.clone()?;
        serde_json::from_value(data).ok()
    }
}

/// Urgency attached to a notification.
///
/// Decodes from any string: `normal` is [`Priority::Medium`] and unknown
/// values fall back to the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" | "normal" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        Priority::parse(&s).unwrap_or_default()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `data` object of a `notification` frame.
///
/// Every field decodes on its own; a field with an unexpected shape takes
/// its default instead of discarding the notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Event kind, e.g. `new_task`, `task_assigned`, `achievement_unlocked`.
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: String,

    /// Server ID of the stored notification, when the push mirrors one.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(default, deserialize_with = "lenient")]
    pub title: String,

    #[serde(default, deserialize_with = "lenient")]
    pub message: String,

    #[serde(default, deserialize_with = "lenient")]
    pub priority: Priority,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    /// Stored notification type, e.g. `payment_received`.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub review_id: Option<i64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub achievement_id: Option<i64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,

    /// Fields this client does not know about yet.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NotificationPayload {
    pub fn new(
        kind: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            title: title.into(),
            message: message.into(),
            priority,
            category: None,
            notification_type: None,
            created_at: None,
            task_id: None,
            review_id: None,
            achievement_id: None,
            chat_id: None,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_notification_frame() {
        let text = r#"{"type":"notification","data":{"type":"new_task","title":"X","message":"Y","priority":"high"}}"#;
        let frame = Frame::decode(text).unwrap();
        assert_eq!(frame.kind, FrameType::Notification);

        let payload = frame.notification_payload().unwrap();
        assert_eq!(payload.kind, "new_task");
        assert_eq!(payload.title, "X");
        assert_eq!(payload.message, "Y");
        assert_eq!(payload.priority, Priority::High);
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let err = Frame::decode("not json").unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
    }

    #[test]
    fn test_decode_rejects_missing_type() {
        let err = Frame::decode(r#"{"data":{"title":"X"}}"#).unwrap_err();
        assert!(err.to_string().contains("missing `type`"));
    }

    #[test]
    fn test_decode_rejects_bad_type_values() {
        assert!(Frame::decode(r#"{"type":""}"#).is_err());
        assert!(Frame::decode(r#"{"type":42}"#).is_err());
        assert!(Frame::decode(r#"{"type":null}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(Frame::decode(r#"["notification"]"#).is_err());
        assert!(Frame::decode(r#""ping""#).is_err());
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let frame = Frame::decode(r#"{"type":"xp_gained","data":{"amount":50}}"#).unwrap();
        assert_eq!(frame.kind, FrameType::Other("xp_gained".to_string()));
        assert!(frame.notification_payload().is_none());

        let encoded = frame.encode().unwrap();
        assert!(encoded.contains(r#""type":"xp_gained""#));
    }

    #[test]
    fn test_server_greeting_decodes() {
        let text = r#"{"type":"connection","message":"Connected to notification service","user_id":7}"#;
        let frame = Frame::decode(text).unwrap();
        assert_eq!(frame.kind, FrameType::Connection);
        assert_eq!(frame.user_id, Some(7));
    }

    #[test]
    fn test_float_timestamp_accepted() {
        let frame = Frame::decode(r#"{"type":"pong","timestamp":1760600000123.7}"#).unwrap();
        assert_eq!(frame.timestamp_millis(), Some(1760600000123));
    }

    #[test]
    fn test_encode_omits_absent_fields() {
        let encoded = Frame::join_group("task_42").encode().unwrap();
        assert_eq!(encoded, r#"{"type":"join_group","group_name":"task_42"}"#);

        let encoded = Frame::ping(1000).encode().unwrap();
        assert_eq!(encoded, r#"{"type":"ping","timestamp":1000}"#);
    }

    #[test]
    fn test_notification_payload_keeps_extra_fields() {
        let text = r#"{"type":"notification","data":{"type":"new_review","title":"T","message":"M","priority":"medium","review_id":789,"stars":5}}"#;
        let payload = Frame::decode(text).unwrap().notification_payload().unwrap();
        assert_eq!(payload.review_id, Some(789));
        assert_eq!(payload.extra.get("stars"), Some(&Value::from(5)));
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
        assert_eq!(Priority::parse("urgent"), Some(Priority::Urgent));
        assert_eq!(Priority::parse("normal"), Some(Priority::Medium));
        assert_eq!(Priority::parse("critical"), None);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_backend_push_payload_decodes() {
        let text = r#"{"type":"notification","data":{"id":41,"title":"Payment received","message":"You received $40.00","notification_type":"payment_received","category":"payment","priority":"normal","created_at":"2026-10-16T09:30:00","data":{"amount":40.0}}}"#;
        let payload = Frame::decode(text).unwrap().notification_payload().unwrap();
        assert_eq!(payload.id, Some(41));
        assert_eq!(payload.kind, "");
        assert_eq!(payload.priority, Priority::Medium);
        assert_eq!(payload.category, Some(Category::Payment));
        assert_eq!(payload.notification_type.as_deref(), Some("payment_received"));
        assert_eq!(payload.created_at.as_deref(), Some("2026-10-16T09:30:00"));
        assert!(payload.extra.contains_key("data"));
    }

    #[test]
    fn test_odd_payload_fields_take_defaults() {
        let text = r#"{"type":"notification","data":{"id":"41","title":"T","priority":3,"task_id":"x","category":"general"}}"#;
        let payload = Frame::decode(text).unwrap().notification_payload().unwrap();
        assert_eq!(payload.title, "T");
        assert_eq!(payload.id, None);
        assert_eq!(payload.priority, Priority::Medium);
        assert_eq!(payload.task_id, None);
        assert_eq!(payload.category, Some(Category::System));
    }

    #[test]
    fn test_optional_fields_never_reject_a_frame() {
        let pong = Frame::decode(r#"{"type":"pong","timestamp":"1760600000"}"#).unwrap();
        assert_eq!(pong.kind, FrameType::Pong);
        assert_eq!(pong.timestamp_millis(), None);

        let hello = Frame::decode(r#"{"type":"connection","user_id":"7"}"#).unwrap();
        assert_eq!(hello.kind, FrameType::Connection);
        assert_eq!(hello.user_id, None);

        let joined = Frame::decode(r#"{"type":"group_joined","group_name":42}"#).unwrap();
        assert_eq!(joined.kind, FrameType::Other("group_joined".to_string()));
        assert_eq!(joined.group_name, None);

        let echoed = Frame::decode(r#"{"type":"error","message":{"detail":"x"}}"#).unwrap();
        assert_eq!(echoed.message, None);
    }
}
