//! KDL schema definitions for config.kdl and state.kdl.
//!
//! This module provides:
//! - Rust structs representing the KDL schema
//! - Conversion to/from KDL documents
//! - Validation functions

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format of log lines written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

/// Keys accepted by `ql config set`.
pub const CONFIG_KEYS: &[&str] = &[
    "host",
    "port",
    "secure",
    "api-base",
    "heartbeat-secs",
    "retry-base-delay-secs",
    "max-retries",
    "retry-auth-rejected",
    "output-format",
    "log-format",
];

/// User preferences stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// host "api.questboard.io"
/// port 443
/// secure #true
/// api-base "https://api.questboard.io/api/v1"
/// heartbeat-secs 30
/// retry-base-delay-secs 5
/// max-retries 3
/// retry-auth-rejected #false
/// output-format "human"
/// log-format "json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestlinkConfig {
    /// Notification server host
    pub host: Option<String>,
    /// Notification server port
    pub port: Option<u16>,
    /// Use wss:// instead of ws://
    pub secure: Option<bool>,
    /// REST base URL
    pub api_base: Option<String>,
    pub heartbeat_secs: Option<u64>,
    pub retry_base_delay_secs: Option<u64>,
    pub max_retries: Option<u32>,
    /// Whether closes with rejected credentials are retried
    pub retry_auth_rejected: Option<bool>,
    pub output_format: Option<OutputFormat>,
    pub log_format: Option<LogFormat>,
}

impl QuestlinkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(host) = &self.host {
            if host.trim().is_empty() || host.contains('/') {
                return Err(format!("host must be a bare hostname, got '{}'", host));
            }
        }
        if self.port == Some(0) {
            return Err("port must be 1-65535".to_string());
        }
        if self.heartbeat_secs == Some(0) {
            return Err("heartbeat-secs must be at least 1".to_string());
        }
        if self.retry_base_delay_secs == Some(0) {
            return Err("retry-base-delay-secs must be at least 1".to_string());
        }
        if let Some(max) = self.max_retries {
            if max > 10 {
                return Err(format!("max-retries must be 0-10, got {}", max));
            }
        }
        if let Some(base) = &self.api_base {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(format!("api-base must be an http(s) URL, got '{}'", base));
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown nodes and ill-typed values
    /// are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            host: first_string(doc, "host"),
            port: first_integer(doc, "port").and_then(|i| u16::try_from(i).ok()),
            secure: first_bool(doc, "secure"),
            api_base: first_string(doc, "api-base"),
            heartbeat_secs: first_integer(doc, "heartbeat-secs").and_then(|i| u64::try_from(i).ok()),
            retry_base_delay_secs: first_integer(doc, "retry-base-delay-secs")
                .and_then(|i| u64::try_from(i).ok()),
            max_retries: first_integer(doc, "max-retries").and_then(|i| u32::try_from(i).ok()),
            retry_auth_rejected: first_bool(doc, "retry-auth-rejected"),
            output_format: first_string(doc, "output-format").and_then(|s| OutputFormat::parse(&s)),
            log_format: first_string(doc, "log-format").and_then(|s| LogFormat::parse(&s)),
        }
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();
        if let Some(host) = &self.host {
            push_node(&mut doc, "host", KdlValue::String(host.clone()));
        }
        if let Some(port) = self.port {
            push_node(&mut doc, "port", KdlValue::Integer(port as i128));
        }
        if let Some(secure) = self.secure {
            push_node(&mut doc, "secure", KdlValue::Bool(secure));
        }
        if let Some(base) = &self.api_base {
            push_node(&mut doc, "api-base", KdlValue::String(base.clone()));
        }
        if let Some(secs) = self.heartbeat_secs {
            push_node(&mut doc, "heartbeat-secs", KdlValue::Integer(secs as i128));
        }
        if let Some(secs) = self.retry_base_delay_secs {
            push_node(&mut doc, "retry-base-delay-secs", KdlValue::Integer(secs as i128));
        }
        if let Some(max) = self.max_retries {
            push_node(&mut doc, "max-retries", KdlValue::Integer(max as i128));
        }
        if let Some(retry) = self.retry_auth_rejected {
            push_node(&mut doc, "retry-auth-rejected", KdlValue::Bool(retry));
        }
        if let Some(format) = &self.output_format {
            push_node(&mut doc, "output-format", KdlValue::String(format.as_str().to_string()));
        }
        if let Some(format) = &self.log_format {
            push_node(&mut doc, "log-format", KdlValue::String(format.as_str().to_string()));
        }
        doc
    }

    /// Set one key from its string form, as given on the command line.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
            value
                .parse()
                .map_err(|_| format!("{} expects a number, got '{}'", key, value))
        }
        fn boolean(key: &str, value: &str) -> Result<bool, String> {
            match value.to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(format!("{} expects true or false, got '{}'", key, value)),
            }
        }

        match key {
            "host" => self.host = Some(value.to_string()),
            "port" => self.port = Some(number(key, value)?),
            "secure" => self.secure = Some(boolean(key, value)?),
            "api-base" => self.api_base = Some(value.to_string()),
            "heartbeat-secs" => self.heartbeat_secs = Some(number(key, value)?),
            "retry-base-delay-secs" => self.retry_base_delay_secs = Some(number(key, value)?),
            "max-retries" => self.max_retries = Some(number(key, value)?),
            "retry-auth-rejected" => self.retry_auth_rejected = Some(boolean(key, value)?),
            "output-format" => {
                self.output_format = Some(
                    OutputFormat::parse(value)
                        .ok_or_else(|| format!("output-format must be json or human, got '{}'", value))?,
                )
            }
            "log-format" => {
                self.log_format = Some(
                    LogFormat::parse(value)
                        .ok_or_else(|| format!("log-format must be text or json, got '{}'", value))?,
                )
            }
            other => {
                return Err(format!(
                    "unknown config key '{}' (expected one of: {})",
                    other,
                    CONFIG_KEYS.join(", ")
                ));
            }
        }
        self.validate()
    }
}

/// Runtime state stored in state.kdl.
///
/// This file contains the auth token.
/// **MUST be created with 0600 permissions (owner read/write only)**.
///
/// ```kdl
/// auth-token "eyJhbGciOi..."
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestlinkState {
    pub auth_token: Option<String>,
}

impl QuestlinkState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask the token for display purposes.
    ///
    /// Shows only the first 4 and last 4 characters.
    pub fn masked_token(&self) -> Option<String> {
        self.auth_token.as_deref().map(mask_token)
    }

    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            auth_token: first_string(doc, "auth-token"),
        }
    }

    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();
        if let Some(token) = &self.auth_token {
            push_node(&mut doc, "auth-token", KdlValue::String(token.clone()));
        }
        doc
    }
}

/// Required permissions for state.kdl (Unix: 0600, owner read/write only).
#[cfg(unix)]
pub const STATE_FILE_MODE: u32 = 0o600;

/// Required permissions for config.kdl (Unix: 0644, readable by all).
#[cfg(unix)]
pub const CONFIG_FILE_MODE: u32 = 0o644;

/// Mask a secret, keeping only its ends. Short secrets are hidden entirely.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        "****".to_string()
    } else if chars.len() <= 12 {
        let head: String = chars.iter().take(4).collect();
        format!("{}...", head)
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

fn first_value<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .map(|entry| entry.value())
}

fn first_string(doc: &KdlDocument, name: &str) -> Option<String> {
    first_value(doc, name)
        .and_then(|v| v.as_string())
        .map(str::to_string)
}

fn first_integer(doc: &KdlDocument, name: &str) -> Option<i128> {
    first_value(doc, name).and_then(|v| v.as_integer())
}

fn first_bool(doc: &KdlDocument, name: &str) -> Option<bool> {
    first_value(doc, name).and_then(|v| v.as_bool())
}

fn push_node(doc: &mut KdlDocument, name: &str, value: KdlValue) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(value));
    doc.nodes_mut().push(node);
}
