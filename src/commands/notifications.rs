//! `ql notifications ...`: REST notification management.

use serde::Serialize;

use crate::Result;
use crate::commands::{Output, json_line};
use crate::notifications::api::NotificationsApi;
use crate::notifications::{Notification, NotificationFilter, NotificationStats, NotificationStore};

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub page: u32,
    pub limit: u32,
    pub count: usize,
    pub unread: usize,
    pub notifications: Vec<Notification>,
}

impl Output for NotificationList {
    fn to_json(&self) -> String {
        json_line(self)
    }

    fn to_human(&self) -> String {
        if self.notifications.is_empty() {
            return "No notifications".to_string();
        }
        let mut lines = vec![format!(
            "{} notification(s), {} unread (page {}):",
            self.count, self.unread, self.page
        )];
        for n in &self.notifications {
            let marker = if n.is_read { " " } else { "*" };
            let id = n.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
            lines.push(format!(
                "{} [{}] {:<8} {:<11} {}",
                marker,
                id,
                n.priority.as_str(),
                n.category.as_str(),
                n.title
            ));
            if !n.message.is_empty() {
                lines.push(format!("      {}", n.message));
            }
        }
        lines.join("\n")
    }
}

pub async fn list(
    api: &NotificationsApi,
    page: u32,
    limit: u32,
    filter: &NotificationFilter,
) -> Result<NotificationList> {
    let mut store = NotificationStore::new();
    store.replace_all(api.list(page, limit).await?);

    let notifications: Vec<Notification> = store.filter(filter).into_iter().cloned().collect();
    Ok(NotificationList {
        page,
        limit,
        count: notifications.len(),
        unread: notifications.iter().filter(|n| !n.is_read).count(),
        notifications,
    })
}

impl Output for NotificationStats {
    fn to_json(&self) -> String {
        json_line(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Total: {}  Unread: {}  Dismissed: {}",
            self.total, self.unread, self.dismissed
        )];
        if !self.by_category.is_empty() {
            lines.push("By category:".to_string());
            for (category, count) in &self.by_category {
                lines.push(format!("  {:<12} {}", category, count));
            }
        }
        if !self.by_priority.is_empty() {
            lines.push("By priority:".to_string());
            for (priority, count) in &self.by_priority {
                lines.push(format!("  {:<12} {}", priority, count));
            }
        }
        lines.join("\n")
    }
}

pub async fn stats(api: &NotificationsApi) -> Result<NotificationStats> {
    api.stats().await
}

/// A server-side mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read(i64),
    ReadAll,
    Dismiss(i64),
    DismissAll,
    Delete(i64),
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Read(_) => "read",
            Action::ReadAll => "read-all",
            Action::Dismiss(_) => "dismiss",
            Action::DismissAll => "dismiss-all",
            Action::Delete(_) => "delete",
        }
    }

    fn id(&self) -> Option<i64> {
        match self {
            Action::Read(id) | Action::Dismiss(id) | Action::Delete(id) => Some(*id),
            Action::ReadAll | Action::DismissAll => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActionDone {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub success: bool,
}

impl Output for ActionDone {
    fn to_json(&self) -> String {
        json_line(self)
    }

    fn to_human(&self) -> String {
        match (self.action, self.id) {
            ("read", Some(id)) => format!("Marked notification {} as read", id),
            ("read-all", _) => "Marked all notifications as read".to_string(),
            ("dismiss", Some(id)) => format!("Dismissed notification {}", id),
            ("dismiss-all", _) => "Dismissed all notifications".to_string(),
            ("delete", Some(id)) => format!("Deleted notification {}", id),
            (action, _) => format!("Done: {}", action),
        }
    }
}

pub async fn apply(api: &NotificationsApi, action: Action) -> Result<ActionDone> {
    match action {
        Action::Read(id) => api.mark_read(id).await?,
        Action::ReadAll => api.mark_all_read().await?,
        Action::Dismiss(id) => api.dismiss(id).await?,
        Action::DismissAll => api.dismiss_all().await?,
        Action::Delete(id) => api.delete(id).await?,
    }
    Ok(ActionDone {
        action: action.name(),
        id: action.id(),
        success: true,
    })
}
