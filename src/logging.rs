//! tracing subscriber setup for the `ql` binary.
//!
//! Logs go to stderr so stdout stays reserved for command output. The level
//! comes from `-v` unless `QL_LOG` carries an `EnvFilter` directive.

use std::path::{Path, PathBuf};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::LogFormat;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "QL_LOG";

const DEFAULT_LOG_FILE: &str = "questlink.log";

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Number of `-v` flags.
    pub verbosity: u8,
    pub format: LogFormat,
    /// Also write logs here, rotated daily.
    pub file: Option<PathBuf>,
}

/// Keeps the file writer flushing; drop it last.
pub struct LoggingGuard {
    _guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the global subscriber.
///
/// Calling this twice leaves the first subscriber in place.
pub fn init(config: &LoggingConfig) -> LoggingGuard {
    let filter = EnvFilter::builder()
        .with_default_directive(level_from_verbosity(config.verbosity).into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(build_stderr_layer(config.format));

    let mut guard = None;
    let mut file_error = None;
    if let Some(path) = &config.file {
        let (dir, prefix) = split_log_path(path);
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&dir, prefix);
                let (writer, worker) = tracing_appender::non_blocking(appender);
                layers.push(Box::new(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true),
                ));
                guard = Some(worker);
            }
            Err(err) => {
                file_error = Some(format!("log dir init failed for {}: {err}", dir.display()));
            }
        }
    }

    layers.push(Box::new(filter));

    if Registry::default().with(layers).try_init().is_err() {
        tracing::debug!("global subscriber already installed");
    }
    if let Some(error) = file_error {
        tracing::warn!("{error}");
    }

    LoggingGuard { _guard: guard }
}

fn build_stderr_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Text => Box::new(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true),
        ),
    }
}

fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Split `--log-file` into the rotation directory and file-name prefix.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
    (dir, prefix)
}
