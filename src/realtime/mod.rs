//! The real-time notification channel.
//!
//! - [`connection`] - the Connection Manager: one transport, its lifecycle,
//!   the heartbeat, and frame/state subscriptions
//! - [`reconnect`] - the Reconnection/Backoff Controller
//! - [`client`] - the two composed with toasts and the notification store
//! - [`ws`] - the tokio-tungstenite transport and event loop (feature `net`)

pub mod client;
pub mod connection;
pub mod frame;
pub mod reconnect;
#[cfg(feature = "net")]
pub mod ws;

pub use client::{ClientSettings, Indicator, NotificationClient};
pub use connection::{
    CloseReason, ConnectionEvent, ConnectionManager, ConnectionState, Endpoint, LinkId,
    StateChange, Transport, TransportEvent, TransportEventKind,
};
pub use frame::{Frame, FrameType, NotificationPayload, Priority};
pub use reconnect::{ReconnectController, ReconnectEvent, ReconnectState, RetryPolicy};
