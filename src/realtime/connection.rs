//! Connection Manager for the notification channel.
//!
//! The manager owns the single logical real-time connection. It performs no
//! I/O itself: the socket lives behind the [`Transport`] trait, and whoever
//! drives the manager (the tokio loop in `ws`, or a test) feeds transport
//! events back through [`ConnectionManager::handle_event`] and advances
//! timers through [`ConnectionManager::poll`].
//!
//! Every mutating call returns the [`ConnectionEvent`]s it produced, after
//! they have already been dispatched to registered subscribers.

use std::fmt;
use std::time::{Duration, Instant};

use crate::realtime::frame::Frame;
use crate::{Error, Result};

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket close code for a normal, user-initiated closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// WebSocket close code for an abnormal closure (no close frame received).
pub const CLOSE_ABNORMAL: u16 = 1006;

/// WebSocket close code for a policy violation (rejected credentials).
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Identifies one underlying transport. A new link is allocated per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// The socket seam. Implementations must return immediately and report
/// outcomes later as [`TransportEvent`]s.
pub trait Transport {
    /// Begin opening `url` as `link`.
    fn open(&mut self, link: LinkId, url: &str);

    /// Queue one text frame on `link`.
    fn send(&mut self, link: LinkId, text: String) -> Result<()>;

    /// Close `link`. No further events for it are expected to matter.
    fn close(&mut self, link: LinkId, code: u16, reason: &str);
}

/// Something the transport observed on a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub link: LinkId,
    pub kind: TransportEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// Handshake completed.
    Opened,
    /// A text frame arrived.
    Text(String),
    /// The link is gone. Handshake failures and socket errors arrive here too.
    Closed { code: u16, reason: String },
}

impl TransportEvent {
    pub fn opened(link: LinkId) -> Self {
        Self {
            link,
            kind: TransportEventKind::Opened,
        }
    }

    pub fn text(link: LinkId, text: impl Into<String>) -> Self {
        Self {
            link,
            kind: TransportEventKind::Text(text.into()),
        }
    }

    pub fn closed(link: LinkId, code: u16, reason: impl Into<String>) -> Self {
        Self {
            link,
            kind: TransportEventKind::Closed {
                code,
                reason: reason.into(),
            },
        }
    }
}

/// Lifecycle of the logical connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a transport close signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// User-initiated closure (1000).
    Normal,
    /// Abnormal closure, server unreachable (1006).
    ServerUnavailable,
    /// Server rejected the credentials (1008).
    AuthRejected,
    /// Any other close code.
    Other(u16),
}

impl CloseReason {
    pub fn classify(code: u16) -> Self {
        match code {
            CLOSE_NORMAL => CloseReason::Normal,
            CLOSE_ABNORMAL => CloseReason::ServerUnavailable,
            CLOSE_POLICY_VIOLATION => CloseReason::AuthRejected,
            other => CloseReason::Other(other),
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, CloseReason::Normal)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Normal => write!(f, "normal"),
            CloseReason::ServerUnavailable => write!(f, "server unavailable"),
            CloseReason::AuthRejected => write!(f, "authentication rejected"),
            CloseReason::Other(code) => write!(f, "closed with code {}", code),
        }
    }
}

/// A connectivity transition, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub previous: ConnectionState,
    pub current: ConnectionState,
    /// Set when `current` is `Closed` because the transport went away.
    pub reason: Option<CloseReason>,
    /// Close reason text reported by the peer, if any.
    pub detail: Option<String>,
}

/// Output of a manager operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged(StateChange),
    Frame(Frame),
}

/// Handle returned by the `on_*` subscription methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<E> = Box<dyn FnMut(&E)>;

/// Ordered list of synchronous callbacks.
struct Subscribers<E> {
    entries: Vec<(SubscriptionId, Callback<E>)>,
}

impl<E> Subscribers<E> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add(&mut self, id: SubscriptionId, callback: Callback<E>) {
        self.entries.push((id, callback));
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() < before
    }

    fn emit(&mut self, event: &E) {
        for (_, callback) in &mut self.entries {
            callback(event);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Where the notification server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Use `wss://` instead of `ws://`.
    pub secure: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
        }
    }

    /// Socket URL for `token`. The token travels in the path.
    pub fn url_for(&self, token: &str) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}/ws/{}", scheme, self.host, self.port, token)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("localhost", 8000, false)
    }
}

/// Owner of the single real-time transport.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    endpoint: Endpoint,
    live_link: Option<LinkId>,
    next_link: u64,
    state: ConnectionState,
    last_error: Option<CloseReason>,
    last_frame: Option<Frame>,
    heartbeat_interval: Duration,
    next_heartbeat: Option<Instant>,
    next_subscription: u64,
    frame_subscribers: Subscribers<Frame>,
    state_subscribers: Subscribers<StateChange>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, endpoint: Endpoint) -> Self {
        Self {
            transport,
            endpoint,
            live_link: None,
            next_link: 1,
            state: ConnectionState::Idle,
            last_error: None,
            last_frame: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            next_heartbeat: None,
            next_subscription: 1,
            frame_subscribers: Subscribers::new(),
            state_subscribers: Subscribers::new(),
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_error(&self) -> Option<CloseReason> {
        self.last_error
    }

    /// Most recently received frame (last-value, not a history).
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn live_link(&self) -> Option<LinkId> {
        self.live_link
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Next instant at which [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_heartbeat
    }

    /// Register a callback for every decoded inbound frame.
    pub fn on_frame(&mut self, callback: impl FnMut(&Frame) + 'static) -> SubscriptionId {
        let id = self.allocate_subscription();
        self.frame_subscribers.add(id, Box::new(callback));
        id
    }

    /// Register a callback for every connectivity transition.
    pub fn on_state_change(
        &mut self,
        callback: impl FnMut(&StateChange) + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_subscription();
        self.state_subscribers.add(id, Box::new(callback));
        id
    }

    /// Remove a frame or state subscription. Returns false if it was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.frame_subscribers.remove(id) || self.state_subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.frame_subscribers.len() + self.state_subscribers.len()
    }

    /// Start a fresh connection attempt with `token`.
    ///
    /// Any live transport is closed first.
    pub fn connect(&mut self, token: &str) -> Result<Vec<ConnectionEvent>> {
        if token.trim().is_empty() {
            return Err(Error::MissingToken);
        }

        let mut events = Vec::new();
        if let Some(old) = self.live_link.take() {
            tracing::debug!(link = %old, "closing previous transport before reconnect");
            self.transport.close(old, CLOSE_NORMAL, "Reconnecting");
        }
        self.next_heartbeat = None;
        self.last_frame = None;

        let link = LinkId(self.next_link);
        self.next_link += 1;
        self.live_link = Some(link);

        self.transition(ConnectionState::Connecting, None, None, &mut events);

        let url = self.endpoint.url_for(token);
        tracing::info!(
            link = %link,
            host = %self.endpoint.host,
            port = self.endpoint.port,
            "connecting to notification service"
        );
        self.transport.open(link, &url);

        Ok(events)
    }

    /// Close the transport with a normal-closure code. Idempotent.
    pub fn disconnect(&mut self) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        self.next_heartbeat = None;
        self.last_error = None;

        if let Some(link) = self.live_link.take() {
            self.transition(ConnectionState::Closing, None, None, &mut events);
            self.transport.close(link, CLOSE_NORMAL, "User disconnected");
            tracing::info!(link = %link, "disconnected from notification service");
        }
        if self.state != ConnectionState::Closed {
            self.transition(ConnectionState::Closed, None, None, &mut events);
        }
        events
    }

    /// Serialize and transmit `frame`.
    ///
    /// Returns [`Error::NotConnected`] without touching state when the
    /// connection is not open.
    pub fn send(&mut self, frame: &Frame) -> Result<()> {
        let link = match (self.state, self.live_link) {
            (ConnectionState::Open, Some(link)) => link,
            _ => {
                tracing::warn!(kind = %frame.kind, state = %self.state, "send while not connected");
                return Err(Error::NotConnected);
            }
        };
        let text = frame.encode()?;
        tracing::debug!(link = %link, kind = %frame.kind, "sending frame");
        self.transport.send(link, text)
    }

    /// Apply an event reported by the transport.
    pub fn handle_event(&mut self, event: TransportEvent, now: Instant) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        if self.live_link != Some(event.link) {
            tracing::debug!(link = %event.link, "ignoring event from stale transport");
            return events;
        }

        match event.kind {
            TransportEventKind::Opened => {
                self.last_error = None;
                self.next_heartbeat = Some(now + self.heartbeat_interval);
                tracing::info!(link = %event.link, "notification channel open");
                self.transition(ConnectionState::Open, None, None, &mut events);
            }
            TransportEventKind::Text(text) => match Frame::decode(&text) {
                Ok(frame) => {
                    tracing::debug!(link = %event.link, kind = %frame.kind, "frame received");
                    self.frame_subscribers.emit(&frame);
                    self.last_frame = Some(frame.clone());
                    events.push(ConnectionEvent::Frame(frame));
                }
                Err(e) => {
                    tracing::warn!(link = %event.link, error = %e, "dropping malformed frame");
                }
            },
            TransportEventKind::Closed { code, reason } => {
                self.live_link = None;
                self.next_heartbeat = None;
                let classified = CloseReason::classify(code);
                self.last_error = classified.is_failure().then_some(classified);
                tracing::info!(
                    link = %event.link,
                    code,
                    reason = %reason,
                    classified = %classified,
                    "notification channel closed"
                );
                let detail = (!reason.is_empty()).then_some(reason);
                self.transition(
                    ConnectionState::Closed,
                    Some(classified),
                    detail,
                    &mut events,
                );
            }
        }
        events
    }

    /// Run due timers. Sends a heartbeat `ping` while open.
    pub fn poll(&mut self, now: Instant) {
        let Some(due) = self.next_heartbeat else {
            return;
        };
        if now < due || !self.state.is_open() {
            return;
        }
        self.next_heartbeat = Some(now + self.heartbeat_interval);
        let ping = Frame::ping(chrono::Utc::now().timestamp_millis());
        if let Err(e) = self.send(&ping) {
            tracing::warn!(error = %e, "heartbeat failed");
        }
    }

    fn allocate_subscription(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        id
    }

    fn transition(
        &mut self,
        next: ConnectionState,
        reason: Option<CloseReason>,
        detail: Option<String>,
        events: &mut Vec<ConnectionEvent>,
    ) {
        let change = StateChange {
            previous: self.state,
            current: next,
            reason,
            detail,
        };
        self.state = next;
        self.state_subscribers.emit(&change);
        events.push(ConnectionEvent::StateChanged(change));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport for exercising the manager without sockets.

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Open(LinkId, String),
        Send(LinkId, String),
        Close(LinkId, u16),
    }

    #[derive(Debug, Default)]
    pub struct FakeTransport {
        pub calls: Vec<Call>,
        pub fail_sends: bool,
    }

    impl FakeTransport {
        /// Links opened but not closed yet.
        pub fn live_links(&self) -> Vec<LinkId> {
            let mut live = Vec::new();
            for call in &self.calls {
                match call {
                    Call::Open(link, _) => live.push(*link),
                    Call::Close(link, _) => live.retain(|l| l != link),
                    Call::Send(..) => {}
                }
            }
            live
        }

        pub fn sent(&self) -> Vec<&str> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Send(_, text) => Some(text.as_str()),
                    _ => None,
                })
                .collect()
        }

        pub fn open_count(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Open(..)))
                .count()
        }
    }

    impl Transport for FakeTransport {
        fn open(&mut self, link: LinkId, url: &str) {
            self.calls.push(Call::Open(link, url.to_string()));
        }

        fn send(&mut self, link: LinkId, text: String) -> Result<()> {
            if self.fail_sends {
                return Err(Error::Transport("socket write failed".into()));
            }
            self.calls.push(Call::Send(link, text));
            Ok(())
        }

        fn close(&mut self, link: LinkId, code: u16, _reason: &str) {
            self.calls.push(Call::Close(link, code));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Call, FakeTransport};
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn manager() -> ConnectionManager<FakeTransport> {
        ConnectionManager::new(FakeTransport::default(), Endpoint::default())
    }

    fn open(manager: &mut ConnectionManager<FakeTransport>, now: Instant) -> LinkId {
        manager.connect("tok").unwrap();
        let link = manager.live_link().unwrap();
        manager.handle_event(TransportEvent::opened(link), now);
        link
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(Endpoint::default().url_for("abc"), "ws://localhost:8000/ws/abc");
        assert_eq!(
            Endpoint::new("api.questboard.io", 443, true).url_for("t"),
            "wss://api.questboard.io:443/ws/t"
        );
    }

    #[test]
    fn test_close_classification() {
        assert_eq!(CloseReason::classify(1000), CloseReason::Normal);
        assert_eq!(CloseReason::classify(1006), CloseReason::ServerUnavailable);
        assert_eq!(CloseReason::classify(1008), CloseReason::AuthRejected);
        assert_eq!(CloseReason::classify(1011), CloseReason::Other(1011));
        assert!(!CloseReason::Normal.is_failure());
        assert!(CloseReason::Other(4000).is_failure());
    }

    #[test]
    fn test_connect_rejects_empty_token() {
        let mut m = manager();
        assert!(matches!(m.connect(""), Err(Error::MissingToken)));
        assert!(matches!(m.connect("   "), Err(Error::MissingToken)));
        assert_eq!(m.state(), ConnectionState::Idle);
        assert_eq!(m.transport().open_count(), 0);
    }

    #[test]
    fn test_connect_then_open() {
        let mut m = manager();
        let events = m.connect("tok").unwrap();
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(matches!(
            &events[..],
            [ConnectionEvent::StateChanged(StateChange {
                previous: ConnectionState::Idle,
                current: ConnectionState::Connecting,
                ..
            })]
        ));
        assert_eq!(
            m.transport().calls[0],
            Call::Open(LinkId(1), "ws://localhost:8000/ws/tok".into())
        );

        m.handle_event(TransportEvent::opened(LinkId(1)), Instant::now());
        assert_eq!(m.state(), ConnectionState::Open);
        assert_eq!(m.last_error(), None);
    }

    #[test]
    fn test_reconnect_closes_prior_transport() {
        let mut m = manager();
        let now = Instant::now();
        let first = open(&mut m, now);
        let second = open(&mut m, now);

        assert_ne!(first, second);
        assert_eq!(m.transport().live_links(), vec![second]);
        assert!(m.transport().calls.contains(&Call::Close(first, CLOSE_NORMAL)));
    }

    #[test]
    fn test_stale_link_events_ignored() {
        let mut m = manager();
        let now = Instant::now();
        let first = open(&mut m, now);
        open(&mut m, now);

        let events = m.handle_event(TransportEvent::closed(first, 1006, ""), now);
        assert!(events.is_empty());
        assert_eq!(m.state(), ConnectionState::Open);
    }

    #[test]
    fn test_abnormal_close_sets_last_error() {
        let mut m = manager();
        let now = Instant::now();
        let link = open(&mut m, now);

        let events = m.handle_event(TransportEvent::closed(link, 1006, ""), now);
        assert_eq!(m.state(), ConnectionState::Closed);
        assert_eq!(m.last_error(), Some(CloseReason::ServerUnavailable));
        assert!(m.live_link().is_none());
        match &events[0] {
            ConnectionEvent::StateChanged(change) => {
                assert_eq!(change.reason, Some(CloseReason::ServerUnavailable));
                assert_eq!(change.detail, None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_server_normal_close_has_no_error() {
        let mut m = manager();
        let now = Instant::now();
        let link = open(&mut m, now);
        m.handle_event(TransportEvent::closed(link, 1000, "bye"), now);
        assert_eq!(m.state(), ConnectionState::Closed);
        assert_eq!(m.last_error(), None);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut m = manager();
        let now = Instant::now();
        let link = open(&mut m, now);

        let events = m.disconnect();
        assert_eq!(events.len(), 2);
        assert_eq!(m.state(), ConnectionState::Closed);
        assert!(m.transport().calls.contains(&Call::Close(link, CLOSE_NORMAL)));

        let calls_before = m.transport().calls.len();
        assert!(m.disconnect().is_empty());
        assert_eq!(m.transport().calls.len(), calls_before);
        assert_eq!(m.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_disconnect_clears_last_error() {
        let mut m = manager();
        let now = Instant::now();
        let link = open(&mut m, now);
        m.handle_event(TransportEvent::closed(link, 1008, "Authentication failed"), now);
        assert_eq!(m.last_error(), Some(CloseReason::AuthRejected));

        m.disconnect();
        assert_eq!(m.last_error(), None);
    }

    #[test]
    fn test_send_while_closed_is_safe() {
        let mut m = manager();
        let result = m.send(&Frame::ping(1));
        assert!(matches!(result, Err(Error::NotConnected)));
        assert_eq!(m.state(), ConnectionState::Idle);

        m.connect("tok").unwrap();
        assert!(matches!(m.send(&Frame::ping(1)), Err(Error::NotConnected)));
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(m.transport().sent().is_empty());
    }

    #[test]
    fn test_send_when_open_serializes() {
        let mut m = manager();
        open(&mut m, Instant::now());
        m.send(&Frame::join_group("all")).unwrap();
        assert_eq!(
            m.transport().sent(),
            vec![r#"{"type":"join_group","group_name":"all"}"#]
        );
    }

    #[test]
    fn test_transport_send_failure_propagates() {
        let mut m = manager();
        open(&mut m, Instant::now());
        m.transport_mut().fail_sends = true;
        assert!(matches!(m.send(&Frame::ping(1)), Err(Error::Transport(_))));
        assert_eq!(m.state(), ConnectionState::Open);
    }

    #[test]
    fn test_frames_reach_subscribers_in_order() {
        let mut m = manager();
        let seen: Rc<RefCell<Vec<String>>> = Rc::default();
        let sink = Rc::clone(&seen);
        m.on_frame(move |frame| sink.borrow_mut().push(frame.kind.to_string()));

        let now = Instant::now();
        let link = open(&mut m, now);
        m.handle_event(TransportEvent::text(link, r#"{"type":"connection"}"#), now);
        m.handle_event(TransportEvent::text(link, r#"{"type":"pong"}"#), now);

        assert_eq!(*seen.borrow(), vec!["connection", "pong"]);
        assert_eq!(m.last_frame().unwrap().kind.to_string(), "pong");
    }

    #[test]
    fn test_malformed_frame_is_inert() {
        let mut m = manager();
        let delivered = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&delivered);
        m.on_frame(move |_| *counter.borrow_mut() += 1);
        let changes = Rc::new(RefCell::new(0));
        let change_counter = Rc::clone(&changes);
        m.on_state_change(move |_| *change_counter.borrow_mut() += 1);

        let now = Instant::now();
        let link = open(&mut m, now);
        let changes_before = *changes.borrow();

        assert!(m.handle_event(TransportEvent::text(link, "not json"), now).is_empty());
        assert!(m.handle_event(TransportEvent::text(link, r#"{"data":1}"#), now).is_empty());

        assert_eq!(*delivered.borrow(), 0);
        assert_eq!(*changes.borrow(), changes_before);
        assert_eq!(m.state(), ConnectionState::Open);
        assert!(m.last_frame().is_none());
    }

    #[test]
    fn test_unsubscribe() {
        let mut m = manager();
        let seen = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&seen);
        let id = m.on_state_change(move |_| *counter.borrow_mut() += 1);
        assert_eq!(m.subscriber_count(), 1);

        m.connect("tok").unwrap();
        assert_eq!(*seen.borrow(), 1);

        assert!(m.unsubscribe(id));
        assert!(!m.unsubscribe(id));
        m.disconnect();
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_heartbeat_sends_ping_on_interval() {
        let mut m = manager().with_heartbeat_interval(Duration::from_secs(30));
        let start = Instant::now();
        open(&mut m, start);
        assert_eq!(m.next_deadline(), Some(start + Duration::from_secs(30)));

        m.poll(start + Duration::from_secs(29));
        assert!(m.transport().sent().is_empty());

        m.poll(start + Duration::from_secs(30));
        m.poll(start + Duration::from_secs(61));
        let sent = m.transport().sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|text| text.starts_with(r#"{"type":"ping","timestamp":"#)));
    }

    #[test]
    fn test_heartbeat_stops_after_disconnect() {
        let mut m = manager();
        let start = Instant::now();
        open(&mut m, start);
        m.disconnect();
        assert_eq!(m.next_deadline(), None);

        m.poll(start + Duration::from_secs(120));
        assert!(m.transport().sent().is_empty());
    }
}
