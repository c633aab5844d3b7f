//! The notification client context object.
//!
//! [`NotificationClient`] ties the Connection Manager and the Reconnection
//! Controller together and feeds the user-facing state built on top of them:
//! the toast center and the notification list. It is created once per
//! signed-in session and handed to whoever renders that state; nothing in
//! this crate keeps it in a global.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::notifications::NotificationStore;
use crate::realtime::connection::{
    CloseReason, ConnectionEvent, ConnectionManager, ConnectionState, DEFAULT_HEARTBEAT_INTERVAL,
    Endpoint, StateChange, Transport, TransportEvent,
};
use crate::realtime::frame::{Frame, FrameType};
use crate::realtime::reconnect::{ReconnectController, ReconnectEvent, ReconnectState, RetryPolicy};
use crate::toast::{ToastCenter, ToastLevel};
use crate::{Error, Result};

/// Knobs for building a [`NotificationClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub endpoint: Endpoint,
    pub heartbeat_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

/// What the connectivity badge should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Connected,
    Connecting,
    Reconnecting { attempt: u32, max: u32 },
    Offline,
    /// Automatic retries exhausted; offer "Retry connection".
    GivenUp,
}

impl Indicator {
    pub fn label(&self) -> String {
        match self {
            Indicator::Connected => "Connected".to_string(),
            Indicator::Connecting => "Connecting...".to_string(),
            Indicator::Reconnecting { attempt, max } => {
                format!("Reconnecting (attempt {}/{})...", attempt, max)
            }
            Indicator::Offline => "Disconnected".to_string(),
            Indicator::GivenUp => "Connection failed".to_string(),
        }
    }
}

/// Serializable snapshot for status output.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    pub state: String,
    pub indicator: String,
    pub last_error: Option<String>,
    pub retry_count: u32,
    pub needs_manual_retry: bool,
    pub unread: usize,
}

pub struct NotificationClient<T: Transport> {
    manager: ConnectionManager<T>,
    reconnect: ReconnectController,
    token: Option<String>,
    toasts: ToastCenter,
    store: NotificationStore,
}

impl<T: Transport> NotificationClient<T> {
    pub fn new(transport: T, settings: ClientSettings) -> Self {
        let manager = ConnectionManager::new(transport, settings.endpoint)
            .with_heartbeat_interval(settings.heartbeat_interval);
        Self {
            manager,
            reconnect: ReconnectController::new(settings.retry),
            token: None,
            toasts: ToastCenter::new(),
            store: NotificationStore::new(),
        }
    }

    pub fn manager(&self) -> &ConnectionManager<T> {
        &self.manager
    }

    /// Mutable access for subscribing to frames and state changes.
    pub fn manager_mut(&mut self) -> &mut ConnectionManager<T> {
        &mut self.manager
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn last_error(&self) -> Option<CloseReason> {
        self.manager.last_error()
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.manager.last_frame()
    }

    pub fn retry_count(&self) -> u32 {
        self.reconnect.retry_count()
    }

    pub fn reconnect_state(&self) -> ReconnectState {
        self.reconnect.state()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn toasts(&self) -> &ToastCenter {
        &self.toasts
    }

    pub fn toasts_mut(&mut self) -> &mut ToastCenter {
        &mut self.toasts
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut NotificationStore {
        &mut self.store
    }

    pub fn indicator(&self) -> Indicator {
        match self.reconnect.state() {
            ReconnectState::GivenUp => return Indicator::GivenUp,
            ReconnectState::AwaitingRetry { attempt, .. } => {
                return Indicator::Reconnecting {
                    attempt,
                    max: self.reconnect.policy().max_retries,
                };
            }
            ReconnectState::Inert | ReconnectState::Connected => {}
        }
        match self.manager.state() {
            ConnectionState::Open => Indicator::Connected,
            ConnectionState::Connecting => Indicator::Connecting,
            ConnectionState::Idle | ConnectionState::Closing | ConnectionState::Closed => {
                Indicator::Offline
            }
        }
    }

    /// True when only an explicit user action will reconnect.
    pub fn needs_manual_retry(&self) -> bool {
        matches!(self.reconnect.state(), ReconnectState::GivenUp)
    }

    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            state: self.manager.state().to_string(),
            indicator: self.indicator().label(),
            last_error: self.manager.last_error().map(|e| e.to_string()),
            retry_count: self.reconnect.retry_count(),
            needs_manual_retry: self.needs_manual_retry(),
            unread: self.store.unread_count(),
        }
    }

    /// React to the auth store. A token starts a fresh connection cycle;
    /// `None` cancels pending retries and tears the connection down.
    pub fn set_token(&mut self, token: Option<String>, now: Instant) -> Result<()> {
        match token.filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                let unchanged = self.token.as_deref() == Some(token.as_str());
                let live = matches!(
                    self.manager.state(),
                    ConnectionState::Open | ConnectionState::Connecting
                );
                if unchanged && live {
                    return Ok(());
                }
                self.token = Some(token);
                self.reconnect.set_token_present(true);
                self.reconnect.manual_retry();
                self.open_connection(now)
            }
            None => {
                self.token = None;
                self.reconnect.set_token_present(false);
                let events = self.manager.disconnect();
                self.route(events, now);
                Ok(())
            }
        }
    }

    /// User-requested connect ("Retry connection").
    pub fn connect(&mut self, now: Instant) -> Result<()> {
        self.reconnect.manual_retry();
        self.open_connection(now)
    }

    /// Close the connection and cancel any pending retry.
    pub fn disconnect(&mut self, now: Instant) {
        let events = self.manager.disconnect();
        self.route(events, now);
    }

    /// Send a frame, raising a toast when the channel is down.
    pub fn send(&mut self, frame: &Frame, now: Instant) -> Result<()> {
        match self.manager.send(frame) {
            Err(Error::NotConnected) => {
                self.toasts.warning(
                    "Connection lost",
                    "Real-time notifications are currently unavailable",
                    now,
                );
                Err(Error::NotConnected)
            }
            other => other,
        }
    }

    pub fn join_group(&mut self, group_name: &str, now: Instant) -> Result<()> {
        self.send(&Frame::join_group(group_name), now)
    }

    pub fn leave_group(&mut self, group_name: &str, now: Instant) -> Result<()> {
        self.send(&Frame::leave_group(group_name), now)
    }

    pub fn ping(&mut self, now: Instant) -> Result<()> {
        self.send(&Frame::ping(chrono::Utc::now().timestamp_millis()), now)
    }

    /// Apply one transport event.
    pub fn handle_event(&mut self, event: TransportEvent, now: Instant) {
        let events = self.manager.handle_event(event, now);
        self.route(events, now);
    }

    /// Run due timers: heartbeat, then any scheduled reconnect.
    pub fn poll(&mut self, now: Instant) {
        self.manager.poll(now);
        self.toasts.cleanup(now);

        let Some(attempt) = self.reconnect.poll(now) else {
            return;
        };
        let max = self.reconnect.policy().max_retries;
        self.toasts.info(
            "Reconnecting...",
            &format!("Attempt {} of {}", attempt, max),
            now,
        );
        let Some(token) = self.token.clone() else {
            return;
        };
        match self.manager.connect(&token) {
            Ok(events) => self.route(events, now),
            Err(e) => tracing::warn!(error = %e, attempt, "reconnect attempt could not start"),
        }
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.manager.next_deadline(), self.reconnect.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn open_connection(&mut self, now: Instant) -> Result<()> {
        let Some(token) = self.token.clone() else {
            self.toasts.error(
                "WebSocket connection failed",
                "No authentication token available",
                now,
            );
            return Err(Error::MissingToken);
        };
        let events = self.manager.connect(&token)?;
        self.route(events, now);
        Ok(())
    }

    fn route(&mut self, events: Vec<ConnectionEvent>, now: Instant) {
        for event in events {
            match event {
                ConnectionEvent::StateChanged(change) => self.on_state_change(&change, now),
                ConnectionEvent::Frame(frame) => self.on_frame(&frame, now),
            }
        }
    }

    fn on_state_change(&mut self, change: &StateChange, now: Instant) {
        match (change.current, change.reason) {
            (ConnectionState::Open, _) => {
                self.toasts
                    .success("Real-time notifications connected", "", now);
            }
            (ConnectionState::Closed, Some(CloseReason::ServerUnavailable)) => {
                self.toasts.error(
                    "Real-time notifications offline",
                    "Server is not available. Please check if the backend is running.",
                    now,
                );
            }
            (ConnectionState::Closed, Some(CloseReason::AuthRejected)) => {
                self.toasts.error(
                    "Authentication failed",
                    "Authentication failed. Please log in again.",
                    now,
                );
            }
            (ConnectionState::Closed, Some(CloseReason::Other(code))) => {
                let detail = change
                    .detail
                    .clone()
                    .unwrap_or_else(|| format!("Code {}", code));
                self.toasts.error(
                    "Connection lost",
                    &format!("Connection closed: {}", detail),
                    now,
                );
            }
            _ => {}
        }

        if let ReconnectEvent::GaveUp { attempts, .. } = self.reconnect.observe(change, now) {
            let message = if attempts == 0 {
                "Automatic reconnection is disabled for rejected credentials. Please log in again."
                    .to_string()
            } else {
                format!(
                    "Failed to connect after {} attempts. Please check your connection and try again.",
                    attempts
                )
            };
            self.toasts
                .push_sticky(ToastLevel::Error, "Connection failed", &message, now);
        }
    }

    fn on_frame(&mut self, frame: &Frame, now: Instant) {
        if frame.kind != FrameType::Notification {
            return;
        }
        match frame.notification_payload() {
            Some(payload) => {
                let title = self.store.push_live(&payload).title.clone();
                if !title.is_empty() {
                    self.toasts.info("New notification", &title, now);
                }
            }
            None => tracing::warn!("notification frame without a usable payload"),
        }
    }
}
