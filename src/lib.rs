//! Questlink - real-time notification client for the Questboard marketplace.
//!
//! This library provides the core functionality for the `ql` CLI tool:
//! the notification WebSocket connection, its reconnection policy, the
//! notification list state fed by it, and the REST collaborator used to
//! manage notifications on the server.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod notifications;
pub mod realtime;
pub mod toast;


/// Library-level error type for Questlink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("KDL error: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[cfg(feature = "net")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Not connected: real-time notifications are currently unavailable")]
    NotConnected,

    #[error("No authentication token available")]
    MissingToken,

    #[error("Failed to connect after {0} attempts")]
    RetriesExhausted(u32),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Questlink operations.
pub type Result<T> = std::result::Result<T, Error>;
