//! Transient user-facing toasts.
//!
//! Provides a toast system with auto-dismiss, overflow handling, and
//! history. The real-time client raises toasts for connectivity changes and
//! incoming notifications; the render layer decides how to show them.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum number of toasts to display at once
const MAX_VISIBLE_TOASTS: usize = 3;

/// Default auto-dismiss duration in seconds
const DEFAULT_DISMISS_SECONDS: u64 = 5;

/// Maximum history entries to keep
const MAX_HISTORY_ENTRIES: usize = 100;

/// Toast level (determines styling)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl ToastLevel {
    /// Get icon/prefix for this level
    pub fn icon(&self) -> &'static str {
        match self {
            ToastLevel::Info => "ℹ",
            ToastLevel::Success => "✓",
            ToastLevel::Warning => "⚠",
            ToastLevel::Error => "✗",
        }
    }
}

/// A single toast
#[derive(Debug, Clone)]
pub struct Toast {
    pub id: u64,
    pub level: ToastLevel,
    pub title: String,
    /// Secondary line; may be empty
    pub message: String,
    pub created_at: Instant,
    /// How long before auto-dismiss (None = manual dismiss only)
    pub duration: Option<Duration>,
    pub dismissed: bool,
}

impl Toast {
    /// Create a toast raised at `now`
    pub fn new(
        id: u64,
        level: ToastLevel,
        title: impl Into<String>,
        message: impl Into<String>,
        now: Instant,
    ) -> Self {
        Self {
            id,
            level,
            title: title.into(),
            message: message.into(),
            created_at: now,
            duration: Some(Duration::from_secs(DEFAULT_DISMISS_SECONDS)),
            dismissed: false,
        }
    }

    /// Create a toast that won't auto-dismiss
    pub fn sticky(
        id: u64,
        level: ToastLevel,
        title: impl Into<String>,
        message: impl Into<String>,
        now: Instant,
    ) -> Self {
        Self {
            duration: None,
            ..Self::new(id, level, title, message, now)
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.duration {
            Some(duration) => now.saturating_duration_since(self.created_at) >= duration,
            None => false,
        }
    }

    pub fn dismiss(&mut self) {
        self.dismissed = true;
    }
}

/// Entry in the toast history
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_toast(toast: &Toast) -> Self {
        Self {
            level: toast.level,
            title: toast.title.clone(),
            message: toast.message.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Format relative time since the toast was raised
    pub fn relative_time(&self) -> String {
        let duration = Utc::now().signed_duration_since(self.timestamp);

        if duration.num_seconds() < 60 {
            "just now".to_string()
        } else if duration.num_minutes() < 60 {
            format!("{}m ago", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{}h ago", duration.num_hours())
        } else {
            format!("{}d ago", duration.num_days())
        }
    }
}

/// Toast center - active toasts plus history
#[derive(Debug)]
pub struct ToastCenter {
    /// Active toasts (newest first)
    toasts: VecDeque<Toast>,
    history: VecDeque<HistoryEntry>,
    next_id: u64,
    /// Count of toasts beyond the visible limit
    pub overflow_count: usize,
}

impl Default for ToastCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastCenter {
    pub fn new() -> Self {
        Self {
            toasts: VecDeque::new(),
            history: VecDeque::new(),
            next_id: 1,
            overflow_count: 0,
        }
    }

    /// Raise a toast at `now` and return its ID. Expiry is measured on the
    /// same clock passed to [`cleanup`](Self::cleanup).
    pub fn push(
        &mut self,
        toast_level: ToastLevel,
        title: &str,
        message: &str,
        now: Instant,
    ) -> u64 {
        let toast = Toast::new(self.next_id, toast_level, title, message, now);
        self.insert(toast)
    }

    /// Raise a toast that stays until dismissed
    pub fn push_sticky(
        &mut self,
        toast_level: ToastLevel,
        title: &str,
        message: &str,
        now: Instant,
    ) -> u64 {
        let toast = Toast::sticky(self.next_id, toast_level, title, message, now);
        self.insert(toast)
    }

    pub fn info(&mut self, title: &str, message: &str, now: Instant) -> u64 {
        self.push(ToastLevel::Info, title, message, now)
    }

    pub fn success(&mut self, title: &str, message: &str, now: Instant) -> u64 {
        self.push(ToastLevel::Success, title, message, now)
    }

    pub fn warning(&mut self, title: &str, message: &str, now: Instant) -> u64 {
        self.push(ToastLevel::Warning, title, message, now)
    }

    pub fn error(&mut self, title: &str, message: &str, now: Instant) -> u64 {
        self.push(ToastLevel::Error, title, message, now)
    }

    fn insert(&mut self, toast: Toast) -> u64 {
        let id = toast.id;
        self.next_id += 1;

        self.history.push_front(HistoryEntry::from_toast(&toast));
        if self.history.len() > MAX_HISTORY_ENTRIES {
            self.history.pop_back();
        }

        self.toasts.push_front(toast);
        self.update_overflow();
        id
    }

    /// Remove expired and dismissed toasts
    pub fn cleanup(&mut self, now: Instant) {
        self.toasts.retain(|t| !t.dismissed && !t.is_expired_at(now));
        self.update_overflow();
    }

    /// Dismiss one toast by ID. Returns false if it is not active.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let Some(toast) = self.toasts.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        toast.dismiss();
        self.toasts.retain(|t| !t.dismissed);
        self.update_overflow();
        true
    }

    pub fn dismiss_all(&mut self) {
        self.toasts.clear();
        self.update_overflow();
    }

    /// Get visible toasts (limited by MAX_VISIBLE_TOASTS)
    pub fn visible(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter().take(MAX_VISIBLE_TOASTS)
    }

    /// Newest active toast
    pub fn latest(&self) -> Option<&Toast> {
        self.toasts.front()
    }

    pub fn has_toasts(&self) -> bool {
        !self.toasts.is_empty()
    }

    fn update_overflow(&mut self) {
        self.overflow_count = self.toasts.len().saturating_sub(MAX_VISIBLE_TOASTS);
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
