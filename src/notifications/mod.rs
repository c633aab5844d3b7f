//! Notification list state.
//!
//! The store holds the user's notifications as last fetched from the REST
//! API, with live entries from the real-time channel prepended as they
//! arrive. Local mutations (read, dismiss, delete) mirror what the REST
//! collaborator does server-side so the list stays consistent without a
//! refetch.

#[cfg(feature = "net")]
pub mod api;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::realtime::frame::{NotificationPayload, Priority, lenient};

/// Default REST base URL
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api/v1";

/// The notification's `type`: a visual tone, or the server's event type
/// (`task_created`, `system_message`, ...) kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
            NotificationKind::Other(kind) => kind,
        }
    }
}

impl From<String> for NotificationKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "info" => NotificationKind::Info,
            "success" => NotificationKind::Success,
            "warning" => NotificationKind::Warning,
            "error" => NotificationKind::Error,
            _ => NotificationKind::Other(s),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// Product area a notification belongs to. Unrecognized areas (the server
/// uses `general`, for one) are filed under [`Category::System`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Category {
    Task,
    Application,
    Message,
    Payment,
    Achievement,
    #[default]
    System,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Task => "task",
            Category::Application => "application",
            Category::Message => "message",
            Category::Payment => "payment",
            Category::Achievement => "achievement",
            Category::System => "system",
        }
    }

    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "task" => Some(Category::Task),
            "application" => Some(Category::Application),
            "message" => Some(Category::Message),
            "payment" => Some(Category::Payment),
            "achievement" => Some(Category::Achievement),
            "system" => Some(Category::System),
            _ => None,
        }
    }

    /// Category implied by a live event kind such as `task_assigned`.
    pub fn from_event_kind(kind: &str) -> Self {
        let kind = kind.to_lowercase();
        if kind.contains("application") {
            Category::Application
        } else if kind.contains("task") {
            Category::Task
        } else if kind.contains("message") || kind.contains("chat") {
            Category::Message
        } else if kind.contains("payment") || kind.contains("deposit") || kind.contains("withdraw")
        {
            Category::Payment
        } else if kind.contains("achievement") {
            Category::Achievement
        } else {
            Category::System
        }
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::parse(&s).unwrap_or_default()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification as served by the REST API.
///
/// Fields decode independently so one unexpected value cannot fail a whole
/// page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Server ID. Absent only for pushes that do not mirror a stored entry.
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub message: String,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: NotificationKind,
    #[serde(default, deserialize_with = "lenient")]
    pub category: Category,
    #[serde(default, deserialize_with = "lenient")]
    pub priority: Priority,
    #[serde(default, deserialize_with = "lenient")]
    pub is_read: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub is_dismissed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_text: Option<String>,
    /// Structured extras; the server calls this `data`.
    #[serde(
        default,
        alias = "data",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Notification {
    /// Build a list entry from a live `notification` frame payload.
    ///
    /// Server ID, category and stored type carry over when the push has
    /// them; otherwise the category is inferred from the event kind.
    pub fn from_live(payload: &NotificationPayload) -> Self {
        let event = match payload.notification_type.as_deref() {
            Some(stored) if payload.kind.is_empty() => stored,
            _ => payload.kind.as_str(),
        };

        let mut metadata = payload.extra.clone();
        if !event.is_empty() {
            metadata.insert("event".into(), Value::String(event.to_string()));
        }
        let related = [
            ("task_id", payload.task_id),
            ("review_id", payload.review_id),
            ("achievement_id", payload.achievement_id),
            ("chat_id", payload.chat_id),
        ];
        for (key, id) in related {
            if let Some(id) = id {
                metadata.insert(key.into(), Value::from(id));
            }
        }

        let created_at = payload
            .created_at
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
        Self {
            id: payload.id,
            user_id: None,
            title: payload.title.clone(),
            message: payload.message.clone(),
            kind: payload
                .notification_type
                .clone()
                .map(NotificationKind::from)
                .unwrap_or_default(),
            category: payload
                .category
                .unwrap_or_else(|| Category::from_event_kind(event)),
            priority: payload.priority,
            is_read: false,
            is_dismissed: false,
            action_url: None,
            action_text: None,
            metadata: Some(metadata),
            created_at: Some(created_at.clone()),
            updated_at: Some(created_at),
        }
    }
}

/// Criteria for [`NotificationStore::filter`]. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub is_read: Option<bool>,
    pub is_dismissed: Option<bool>,
}

impl NotificationFilter {
    pub fn matches(&self, n: &Notification) -> bool {
        self.category.is_none_or(|c| n.category == c)
            && self.priority.is_none_or(|p| n.priority == p)
            && self.is_read.is_none_or(|r| n.is_read == r)
            && self.is_dismissed.is_none_or(|d| n.is_dismissed == d)
    }
}

/// Aggregate counts, same shape as the `/notifications/stats` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total: u64,
    pub unread: u64,
    pub dismissed: u64,
    #[serde(default)]
    pub by_category: BTreeMap<String, u64>,
    #[serde(default)]
    pub by_priority: BTreeMap<String, u64>,
}

/// Notification list (newest first).
#[derive(Debug, Default)]
pub struct NotificationStore {
    items: Vec<Notification>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace the list with a fresh page from the API.
    pub fn replace_all(&mut self, items: Vec<Notification>) {
        self.items = items;
    }

    /// Prepend a live notification.
    pub fn push_live(&mut self, payload: &NotificationPayload) -> &Notification {
        self.items.insert(0, Notification::from_live(payload));
        &self.items[0]
    }

    /// Returns false if no entry has `id`.
    pub fn mark_read(&mut self, id: i64) -> bool {
        self.update(id, |n| n.is_read = true)
    }

    pub fn mark_all_read(&mut self) {
        self.items.iter_mut().for_each(|n| n.is_read = true);
    }

    /// Returns false if no entry has `id`.
    pub fn dismiss(&mut self, id: i64) -> bool {
        self.update(id, |n| n.is_dismissed = true)
    }

    pub fn dismiss_all(&mut self) {
        self.items.iter_mut().for_each(|n| n.is_dismissed = true);
    }

    /// Returns false if no entry has `id`.
    pub fn delete(&mut self, id: i64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != Some(id));
        self.items.len() < before
    }

    pub fn filter(&self, filter: &NotificationFilter) -> Vec<&Notification> {
        self.items.iter().filter(|n| filter.matches(n)).collect()
    }

    pub fn unread_count(&self) -> usize {
        self.items
            .iter()
            .filter(|n| !n.is_read && !n.is_dismissed)
            .count()
    }

    /// Counts computed from the local list.
    pub fn stats(&self) -> NotificationStats {
        let mut stats = NotificationStats {
            total: self.items.len() as u64,
            ..Default::default()
        };
        for n in &self.items {
            if !n.is_read {
                stats.unread += 1;
            }
            if n.is_dismissed {
                stats.dismissed += 1;
            }
            *stats
                .by_category
                .entry(n.category.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_priority
                .entry(n.priority.as_str().to_string())
                .or_default() += 1;
        }
        stats
    }

    fn update(&mut self, id: i64, apply: impl FnOnce(&mut Notification)) -> bool {
        match self.items.iter_mut().find(|n| n.id == Some(id)) {
            Some(n) => {
                apply(n);
                true
            }
            None => false,
        }
    }
}
