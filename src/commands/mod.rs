//! Command implementations for the `ql` CLI.
//!
//! This module contains the logic behind each CLI command:
//! - `config` - show and edit config.kdl
//! - `token` - manage the stored auth token
//! - `notifications` - REST notification management (feature `net`)
//! - `live` - real-time listen/send/ping sessions (feature `net`)

pub mod config;
#[cfg(feature = "net")]
pub mod live;
#[cfg(feature = "net")]
pub mod notifications;
pub mod token;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Compact JSON for a serializable result. Serialization of these plain
/// structs cannot fail; an empty object is printed if it somehow does.
pub(crate) fn json_line<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
