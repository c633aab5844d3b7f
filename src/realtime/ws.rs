//! tokio-tungstenite transport and the client event loop.
//!
//! # Model
//!
//! 1. [`WsTransport`] spawns one task per link; each task owns its socket
//!    and reports `Opened` / `Text` / `Closed` on a shared channel
//! 2. [`run_client`] is the only place client state is touched: a single
//!    `tokio::select!` loop over transport events, user commands, the next
//!    timer deadline, and shutdown
//! 3. Handshake failures and socket errors surface as `Closed` with code
//!    1006; an HTTP 401/403 handshake rejection surfaces as 1008

use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::realtime::client::NotificationClient;
use crate::realtime::connection::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION, LinkId, Transport, TransportEvent,
};
use crate::realtime::frame::Frame;
use crate::{Error, Result};

/// Close code reported when the peer closed without a status.
const CLOSE_NO_STATUS: u16 = 1005;

/// Instructions for a link task.
#[derive(Debug)]
enum LinkCommand {
    Send(String),
    Close { code: u16, reason: String },
}

/// [`Transport`] backed by tokio-tungstenite.
///
/// Must be used from within a tokio runtime.
pub struct WsTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    links: HashMap<LinkId, mpsc::UnboundedSender<LinkCommand>>,
}

impl WsTransport {
    /// Create the transport and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                events,
                links: HashMap::new(),
            },
            rx,
        )
    }
}

impl Transport for WsTransport {
    fn open(&mut self, link: LinkId, url: &str) {
        // Drop bookkeeping for link tasks that already exited.
        self.links.retain(|_, tx| !tx.is_closed());

        let (tx, rx) = mpsc::unbounded_channel();
        self.links.insert(link, tx);
        tokio::spawn(run_link(link, url.to_string(), rx, self.events.clone()));
    }

    fn send(&mut self, link: LinkId, text: String) -> Result<()> {
        let tx = self.links.get(&link).ok_or(Error::NotConnected)?;
        tx.send(LinkCommand::Send(text))
            .map_err(|_| Error::Transport(format!("{} has shut down", link)))
    }

    fn close(&mut self, link: LinkId, code: u16, reason: &str) {
        if let Some(tx) = self.links.remove(&link) {
            let _ = tx.send(LinkCommand::Close {
                code,
                reason: reason.to_string(),
            });
        }
    }
}

/// Map a failed handshake to a close code.
fn handshake_close(err: &WsError) -> (u16, String) {
    match err {
        WsError::Http(response) if matches!(response.status().as_u16(), 401 | 403) => (
            CLOSE_POLICY_VIOLATION,
            format!("handshake rejected with HTTP {}", response.status()),
        ),
        other => (CLOSE_ABNORMAL, other.to_string()),
    }
}

/// Own one socket from handshake to close.
async fn run_link(
    link: LinkId,
    url: String,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let (code, reason) = handshake_close(&e);
            tracing::debug!(link = %link, error = %e, "handshake failed");
            let _ = events.send(TransportEvent::closed(link, code, reason));
            return;
        }
    };
    let _ = events.send(TransportEvent::opened(link));

    let (mut write, mut read) = stream.split();

    let (code, reason) = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LinkCommand::Send(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        break (CLOSE_ABNORMAL, e.to_string());
                    }
                }
                Some(LinkCommand::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    let _ = write.close().await;
                    break (code, reason);
                }
                None => {
                    // Transport dropped the link without an explicit close.
                    let _ = write.send(Message::Close(None)).await;
                    break (CLOSE_NORMAL, String::new());
                }
            },

            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::text(link, text));
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        break (CLOSE_ABNORMAL, e.to_string());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                        None => (CLOSE_NO_STATUS, String::new()),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break (CLOSE_ABNORMAL, e.to_string()),
                None => break (CLOSE_ABNORMAL, String::new()),
            },
        }
    };

    let _ = events.send(TransportEvent::closed(link, code, reason));
}

/// Requests handed to a running [`run_client`] loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Send(Frame),
    JoinGroup(String),
    LeaveGroup(String),
    Ping,
    SetToken(Option<String>),
    /// Manual "Retry connection".
    Connect,
    Disconnect,
    /// Disconnect and return from the loop.
    Shutdown,
}

/// Drive `client` until shutdown.
///
/// Returns `Ok(())` on `shutdown` resolving, on [`ClientCommand::Shutdown`],
/// or when the transport channel closes. Returns
/// [`Error::RetriesExhausted`] once automatic reconnection gives up, so the
/// caller can decide whether to offer a manual retry.
pub async fn run_client<T: Transport>(
    client: &mut NotificationClient<T>,
    events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);
    let mut commands_open = true;

    loop {
        let deadline = client.next_deadline().map(tokio::time::Instant::from_std);
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = &mut shutdown => {
                client.disconnect(Instant::now());
                return Ok(());
            }

            event = events.recv() => match event {
                Some(event) => client.handle_event(event, Instant::now()),
                None => return Ok(()),
            },

            command = commands.recv(), if commands_open => match command {
                Some(ClientCommand::Shutdown) => {
                    client.disconnect(Instant::now());
                    return Ok(());
                }
                Some(command) => apply_command(client, command),
                None => commands_open = false,
            },

            _ = timer => client.poll(Instant::now()),
        }

        if client.needs_manual_retry() {
            return Err(Error::RetriesExhausted(client.retry_count()));
        }
    }
}

fn apply_command<T: Transport>(client: &mut NotificationClient<T>, command: ClientCommand) {
    let now = Instant::now();
    let result = match command {
        ClientCommand::Send(frame) => client.send(&frame, now),
        ClientCommand::JoinGroup(group) => client.join_group(&group, now),
        ClientCommand::LeaveGroup(group) => client.leave_group(&group, now),
        ClientCommand::Ping => client.ping(now),
        ClientCommand::SetToken(token) => client.set_token(token, now),
        ClientCommand::Connect => client.connect(now),
        ClientCommand::Disconnect => {
            client.disconnect(now);
            Ok(())
        }
        ClientCommand::Shutdown => Ok(()),
    };
    if let Err(e) = result {
        tracing::warn!(error = %e, "client command failed");
    }
}
