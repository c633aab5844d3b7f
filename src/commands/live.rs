//! `ql listen|send|ping`: sessions on the real-time channel.
//!
//! Each command builds a [`NotificationClient`] over a [`WsTransport`],
//! registers callbacks that queue [`ClientCommand`]s, and drives everything
//! with [`run_client`] on the current task.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::commands::{Output, json_line};
use crate::realtime::client::{ClientSettings, ClientStatus, NotificationClient};
use crate::realtime::connection::{ConnectionState, TransportEvent};
use crate::realtime::frame::{Frame, FrameType};
use crate::realtime::ws::{ClientCommand, WsTransport, run_client};
use crate::toast::HistoryEntry;
use crate::{Error, Result};

/// How long `ql send` waits for the connection to open.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);

struct Session {
    client: NotificationClient<WsTransport>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    commands_tx: mpsc::UnboundedSender<ClientCommand>,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
}

impl Session {
    fn new(settings: ClientSettings) -> Self {
        let (transport, events) = WsTransport::new();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        Self {
            client: NotificationClient::new(transport, settings),
            events,
            commands_tx,
            commands,
        }
    }

    /// Queue `commands` every time the connection reaches `Open`.
    fn on_open(&mut self, commands: Vec<ClientCommand>) {
        let tx = self.commands_tx.clone();
        self.client.manager_mut().on_state_change(move |change| {
            if change.current == ConnectionState::Open {
                for command in &commands {
                    let _ = tx.send(command.clone());
                }
            }
        });
    }

    async fn run(&mut self, token: String, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.client.set_token(Some(token), Instant::now())?;
        run_client(
            &mut self.client,
            &mut self.events,
            &mut self.commands,
            shutdown,
        )
        .await
    }
}

/// One line per frame, as printed by `ql listen`.
pub fn format_frame(frame: &Frame, human: bool) -> String {
    if !human {
        return frame.encode().unwrap_or_else(|_| "{}".to_string());
    }
    if let Some(payload) = frame.notification_payload() {
        return format!(
            "[notification] ({}) {}: {}",
            payload.priority, payload.title, payload.message
        );
    }
    match (&frame.message, &frame.data) {
        (Some(message), _) => format!("[{}] {}", frame.kind, message),
        (None, Some(data)) => format!("[{}] {}", frame.kind, data),
        (None, None) => format!("[{}]", frame.kind),
    }
}

#[derive(Debug, Serialize)]
pub struct ListenSummary {
    pub frames: usize,
    pub notifications: usize,
    pub unread: usize,
    pub status: ClientStatus,
    pub toasts: Vec<HistoryEntry>,
}

impl Output for ListenSummary {
    fn to_json(&self) -> String {
        json_line(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Received {} frame(s), {} notification(s) ({} unread). Status: {}",
            self.frames, self.notifications, self.unread, self.status.indicator
        )
    }
}

/// Follow the channel, printing each frame, until `shutdown`, `max_frames`,
/// or exhausted retries.
pub async fn listen(
    settings: ClientSettings,
    token: String,
    groups: Vec<String>,
    max_frames: Option<usize>,
    human: bool,
    shutdown: impl Future<Output = ()>,
) -> Result<ListenSummary> {
    let mut session = Session::new(settings);
    session.on_open(groups.into_iter().map(ClientCommand::JoinGroup).collect());

    let received = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&received);
    let tx = session.commands_tx.clone();
    session.client.manager_mut().on_frame(move |frame| {
        println!("{}", format_frame(frame, human));
        counter.set(counter.get() + 1);
        if max_frames.is_some_and(|max| counter.get() >= max) {
            let _ = tx.send(ClientCommand::Shutdown);
        }
    });

    session.run(token, shutdown).await?;

    let client = &session.client;
    Ok(ListenSummary {
        frames: received.get(),
        notifications: client.store().len(),
        unread: client.store().unread_count(),
        status: client.status(),
        toasts: client.toasts().history().cloned().collect(),
    })
}

#[derive(Debug, Serialize)]
pub struct SendReport {
    #[serde(rename = "type")]
    pub kind: String,
    pub group_name: Option<String>,
    pub sent: bool,
}

impl Output for SendReport {
    fn to_json(&self) -> String {
        json_line(self)
    }

    fn to_human(&self) -> String {
        match &self.group_name {
            Some(group) => format!("Sent {} frame to group {}", self.kind, group),
            None => format!("Sent {} frame", self.kind),
        }
    }
}

/// Build the frame for `ql send`. `data` must be JSON when given.
pub fn build_frame(kind: &str, data: Option<&str>, group: Option<&str>) -> Result<Frame> {
    if kind.trim().is_empty() {
        return Err(Error::InvalidInput("frame type must not be empty".to_string()));
    }
    let data = data
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .map_err(|e| Error::InvalidInput(format!("--data is not valid JSON: {}", e)))?;
    let mut frame = Frame::custom(kind, data);
    frame.group_name = group.map(str::to_string);
    Ok(frame)
}

/// Connect, join `frame.group_name` if set, send `frame`, disconnect.
pub async fn send(settings: ClientSettings, token: String, frame: Frame) -> Result<SendReport> {
    let mut session = Session::new(settings);

    let mut on_open = Vec::new();
    if let Some(group) = &frame.group_name {
        on_open.push(ClientCommand::JoinGroup(group.clone()));
    }
    on_open.push(ClientCommand::Send(frame.clone()));
    on_open.push(ClientCommand::Shutdown);

    let opened = Rc::new(Cell::new(false));
    let seen = Rc::clone(&opened);
    session.client.manager_mut().on_state_change(move |change| {
        if change.current == ConnectionState::Open {
            seen.set(true);
        }
    });
    session.on_open(on_open);

    session.run(token, tokio::time::sleep(SEND_TIMEOUT)).await?;

    if !opened.get() {
        return Err(Error::NotConnected);
    }
    Ok(SendReport {
        kind: frame.kind.to_string(),
        group_name: frame.group_name,
        sent: true,
    })
}

#[derive(Debug, Serialize)]
pub struct PingReport {
    pub round_trip_ms: u64,
    pub server_timestamp: Option<i64>,
}

impl Output for PingReport {
    fn to_json(&self) -> String {
        json_line(self)
    }

    fn to_human(&self) -> String {
        format!("pong in {} ms", self.round_trip_ms)
    }
}

/// Connect, ping, wait for the pong.
pub async fn ping(settings: ClientSettings, token: String, timeout: Duration) -> Result<PingReport> {
    let mut session = Session::new(settings);

    let sent_at = Rc::new(Cell::new(None::<Instant>));
    let stamp = Rc::clone(&sent_at);
    session.client.manager_mut().on_state_change(move |change| {
        if change.current == ConnectionState::Open {
            stamp.set(Some(Instant::now()));
        }
    });
    session.on_open(vec![ClientCommand::Ping]);

    let report = Rc::new(RefCell::new(None::<PingReport>));
    let slot = Rc::clone(&report);
    let pinged = Rc::clone(&sent_at);
    let tx = session.commands_tx.clone();
    session.client.manager_mut().on_frame(move |frame| {
        if frame.kind != FrameType::Pong {
            return;
        }
        let Some(at) = pinged.get() else {
            return;
        };
        let round_trip_ms = u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX);
        *slot.borrow_mut() = Some(PingReport {
            round_trip_ms,
            server_timestamp: frame.timestamp_millis(),
        });
        let _ = tx.send(ClientCommand::Shutdown);
    });

    session.run(token, tokio::time::sleep(timeout)).await?;

    report.take().ok_or_else(|| {
        Error::Transport(format!("no pong received within {}s", timeout.as_secs()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::frame::{NotificationPayload, Priority};

    #[test]
    fn test_build_frame() {
        let frame = build_frame("notification", Some(r#"{"title":"Hi"}"#), Some("team-1")).unwrap();
        assert_eq!(frame.kind, FrameType::Notification);
        assert_eq!(frame.group_name.as_deref(), Some("team-1"));
        assert_eq!(frame.data, Some(serde_json::json!({"title": "Hi"})));

        assert!(matches!(
            build_frame("notification", Some("{nope"), None),
            Err(Error::InvalidInput(_))
        ));
        assert!(build_frame(" ", None, None).is_err());
    }

    #[test]
    fn test_format_frame_human() {
        let payload = NotificationPayload::new("task_update", "Task accepted", "Go!", Priority::High);
        let frame = Frame::notification(&payload).unwrap();
        assert_eq!(
            format_frame(&frame, true),
            "[notification] (high) Task accepted: Go!"
        );

        let mut greeting = Frame::new(FrameType::Connection);
        greeting.message = Some("Connected".into());
        assert_eq!(format_frame(&greeting, true), "[connection] Connected");
        assert_eq!(format_frame(&Frame::new("pong"), true), "[pong]");
    }

    #[test]
    fn test_format_frame_json_is_wire_form() {
        let frame = Frame::join_group("team-1");
        let line = format_frame(&frame, false);
        assert_eq!(Frame::decode(&line).unwrap(), frame);
    }
}
