//! CLI argument definitions for Questlink.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// `ql --version` output with build metadata.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("QL_GIT_COMMIT"),
    ", built ",
    env!("QL_BUILD_TIMESTAMP"),
    ")"
);

/// Questlink - real-time notification client for Questboard.
///
/// Start with `ql token set <TOKEN>`, then `ql listen` to follow live notifications.
#[derive(Parser, Debug)]
#[command(name = "ql")]
#[command(author, version, long_version = LONG_VERSION)]
#[command(about = "Real-time notification client for Questboard", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to this file (rotated daily)
    #[arg(long = "log-file", global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Notification server host (overrides QL_HOST and config.kdl)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Notification server port (overrides QL_PORT and config.kdl)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Auth token for this invocation (overrides QL_TOKEN and state.kdl)
    #[arg(long, global = true, hide = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and print frames as they arrive
    ///
    /// Reconnects automatically after abnormal closes. Stops on Ctrl-C,
    /// after --max-frames frames, or when automatic retries are exhausted.
    Listen {
        /// Join this group once connected (repeatable)
        #[arg(short = 'g', long = "group")]
        groups: Vec<String>,

        /// Stop after this many frames
        #[arg(short = 'n', long)]
        max_frames: Option<usize>,
    },

    /// Connect, send one frame, and disconnect
    Send {
        /// Frame type (e.g. notification, join_group)
        #[arg(short = 't', long = "type")]
        kind: String,

        /// Frame data as a JSON value
        #[arg(short = 'd', long)]
        data: Option<String>,

        /// Target group
        #[arg(short = 'g', long)]
        group: Option<String>,
    },

    /// Connect, send a ping, and report the pong round trip
    Ping {
        /// Give up waiting for the pong after this many seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },

    /// Manage notifications through the REST API
    Notifications {
        #[command(subcommand)]
        command: NotificationCommands,
    },

    /// Configuration management (config.kdl)
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Auth token management (state.kdl)
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

/// Notification subcommands
#[derive(Subcommand, Debug)]
pub enum NotificationCommands {
    /// List notifications
    List {
        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: u32,

        /// Page size
        #[arg(long, default_value = "20")]
        limit: u32,

        /// Only unread notifications
        #[arg(long)]
        unread: bool,

        /// Only this category (task, application, message, payment, achievement, system)
        #[arg(long)]
        category: Option<String>,
    },

    /// Show notification counts
    Stats,

    /// Mark a notification as read
    Read {
        /// Notification ID
        id: i64,
    },

    /// Mark all notifications as read
    ReadAll,

    /// Dismiss a notification
    Dismiss {
        /// Notification ID
        id: i64,
    },

    /// Dismiss all notifications
    DismissAll,

    /// Delete a notification
    Delete {
        /// Notification ID
        id: i64,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration and where each value came from
    Show,

    /// Set a configuration value in config.kdl
    Set {
        /// Configuration key (e.g. host, port, max-retries)
        key: String,
        /// Configuration value
        value: String,
    },
}

/// Token subcommands
#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    /// Store the auth token in state.kdl
    Set {
        /// Auth token
        #[arg(value_name = "TOKEN")]
        value: String,
    },

    /// Remove the stored auth token
    Clear,

    /// Show the effective token (masked) and its source
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_listen_groups() {
        let cli = Cli::try_parse_from(["ql", "listen", "-g", "team-1", "--group", "team-2", "-n", "5"])
            .unwrap();
        match cli.command {
            Commands::Listen { groups, max_frames } => {
                assert_eq!(groups, vec!["team-1", "team-2"]);
                assert_eq!(max_frames, Some(5));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ql", "ping", "-H", "-vv", "--port", "9000"]).unwrap();
        assert!(cli.human_readable);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.port, Some(9000));
    }

    #[test]
    fn test_send_requires_type() {
        assert!(Cli::try_parse_from(["ql", "send", "--data", "{}"]).is_err());
    }
}
