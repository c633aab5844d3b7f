//! Unified precedence resolution for configuration and state.
//!
//! ## Token Precedence (highest to lowest)
//!
//! 1. `--token` CLI flag
//! 2. `QL_TOKEN` environment variable
//! 3. state.kdl (`~/.local/share/questlink/state.kdl`)
//!
//! ## Config Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment (`QL_HOST`, `QL_PORT`)
//! 3. config.kdl (`~/.config/questlink/config.kdl`)
//! 4. Built-in defaults

use std::time::Duration;

use serde::Serialize;

use crate::config::ConfigPaths;
use crate::config::schema::{LogFormat, OutputFormat, QuestlinkConfig, mask_token};
use crate::notifications::DEFAULT_API_BASE;
use crate::realtime::client::ClientSettings;
use crate::realtime::connection::{DEFAULT_HEARTBEAT_INTERVAL, Endpoint};
use crate::realtime::reconnect::RetryPolicy;
use crate::{Error, Result};

/// Environment variable name for the auth token override.
pub const TOKEN_ENV: &str = "QL_TOKEN";

/// Environment variable name for the server host override.
pub const HOST_ENV: &str = "QL_HOST";

/// Environment variable name for the server port override.
pub const PORT_ENV: &str = "QL_PORT";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from config.kdl or state.kdl
    File,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::File => write!(f, "file"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub host: Resolved<String>,
    pub port: Resolved<u16>,
    pub secure: Resolved<bool>,
    pub api_base: Resolved<String>,
    pub heartbeat_secs: Resolved<u64>,
    pub retry_base_delay_secs: Resolved<u64>,
    pub max_retries: Resolved<u32>,
    pub retry_auth_rejected: Resolved<bool>,
    pub output_format: Resolved<OutputFormat>,
    pub log_format: Resolved<LogFormat>,
}

impl ResolvedConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.value.clone(), self.port.value, self.secure.value)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base.value
    }

    pub fn output_format(&self) -> &OutputFormat {
        &self.output_format.value
    }

    /// Settings for building a notification client.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            endpoint: self.endpoint(),
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs.value),
            retry: RetryPolicy {
                base_delay: Duration::from_secs(self.retry_base_delay_secs.value),
                max_retries: self.max_retries.value,
                retry_auth_rejected: self.retry_auth_rejected.value,
            },
        }
    }
}

/// CLI flag overrides for configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secure: Option<bool>,
    pub api_base: Option<String>,
    pub output_format: Option<OutputFormat>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }
}

/// Resolve configuration with full precedence chain, reading the process
/// environment.
pub fn resolve_config(paths: &ConfigPaths, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    resolve_config_with_env(paths, overrides, |name| std::env::var(name).ok())
}

fn resolve_config_with_env(
    paths: &ConfigPaths,
    overrides: &ConfigOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let file = paths.read_config()?;
    file.validate().map_err(Error::InvalidInput)?;

    let env_host = env(HOST_ENV).filter(|h| !h.is_empty());
    let env_port = match env(PORT_ENV).filter(|p| !p.is_empty()) {
        Some(raw) => Some(raw.parse::<u16>().map_err(|_| {
            Error::InvalidInput(format!("{} must be a port number, got '{}'", PORT_ENV, raw))
        })?),
        None => None,
    };

    let QuestlinkConfig {
        host,
        port,
        secure,
        api_base,
        heartbeat_secs,
        retry_base_delay_secs,
        max_retries,
        retry_auth_rejected,
        output_format,
        log_format,
    } = file;
    let defaults = RetryPolicy::default();

    Ok(ResolvedConfig {
        host: pick(
            overrides.host.clone(),
            env_host.map(|h| (h, HOST_ENV)),
            host,
            "localhost".to_string(),
        ),
        port: pick(overrides.port, env_port.map(|p| (p, PORT_ENV)), port, 8000),
        secure: pick(overrides.secure, None, secure, false),
        api_base: pick(
            overrides.api_base.clone(),
            None,
            api_base,
            DEFAULT_API_BASE.to_string(),
        ),
        heartbeat_secs: pick(None, None, heartbeat_secs, DEFAULT_HEARTBEAT_INTERVAL.as_secs()),
        retry_base_delay_secs: pick(
            None,
            None,
            retry_base_delay_secs,
            defaults.base_delay.as_secs(),
        ),
        max_retries: pick(None, None, max_retries, defaults.max_retries),
        retry_auth_rejected: pick(None, None, retry_auth_rejected, defaults.retry_auth_rejected),
        output_format: pick(overrides.output_format.clone(), None, output_format, OutputFormat::Json),
        log_format: pick(None, None, log_format, LogFormat::Text),
    })
}

fn pick<T>(cli: Option<T>, env: Option<(T, &str)>, file: Option<T>, default: T) -> Resolved<T> {
    if let Some(value) = cli {
        Resolved::new(value, ValueSource::CliFlag)
    } else if let Some((value, name)) = env {
        Resolved::new(value, ValueSource::EnvVar(name.to_string()))
    } else if let Some(value) = file {
        Resolved::new(value, ValueSource::File)
    } else {
        Resolved::new(default, ValueSource::Default)
    }
}

/// Resolved auth token.
#[derive(Debug, Clone)]
pub struct ResolvedToken(pub Resolved<String>);

impl ResolvedToken {
    pub fn value(&self) -> &str {
        &self.0.value
    }

    pub fn source(&self) -> &ValueSource {
        &self.0.source
    }

    /// Token with only its ends visible.
    pub fn masked(&self) -> String {
        mask_token(&self.0.value)
    }
}

/// Resolve the auth token: CLI flag > `QL_TOKEN` > state.kdl.
///
/// Empty values at any level are treated as absent.
pub fn resolve_token(paths: &ConfigPaths, cli: Option<&str>) -> Result<Option<ResolvedToken>> {
    resolve_token_with_env(paths, cli, |name| std::env::var(name).ok())
}

fn resolve_token_with_env(
    paths: &ConfigPaths,
    cli: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Option<ResolvedToken>> {
    if let Some(token) = cli.filter(|t| !t.trim().is_empty()) {
        return Ok(Some(ResolvedToken(Resolved::new(
            token.to_string(),
            ValueSource::CliFlag,
        ))));
    }
    if let Some(token) = env(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
        return Ok(Some(ResolvedToken(Resolved::new(
            token,
            ValueSource::EnvVar(TOKEN_ENV.to_string()),
        ))));
    }
    Ok(paths
        .read_state()?
        .auth_token
        .filter(|t| !t.trim().is_empty())
        .map(|token| ResolvedToken(Resolved::new(token, ValueSource::File))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuestlinkState;
    use crate::test_utils::TestEnv;
    use serial_test::serial;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_resolve_config_defaults() {
        let env = TestEnv::new();
        let config = resolve_config_with_env(&env.paths(), &ConfigOverrides::new(), no_env).unwrap();

        assert_eq!(config.host.value, "localhost");
        assert_eq!(config.host.source, ValueSource::Default);
        assert_eq!(config.port.value, 8000);
        assert_eq!(config.api_base(), DEFAULT_API_BASE);
        assert_eq!(config.heartbeat_secs.value, 30);
        assert_eq!(config.max_retries.value, 3);
        assert!(config.retry_auth_rejected.value);
        assert_eq!(config.client_settings(), ClientSettings::default());
    }

    #[test]
    fn test_precedence_cli_env_file() {
        let env = TestEnv::new();
        let paths = env.paths();
        paths
            .write_config(&QuestlinkConfig {
                host: Some("file.example".into()),
                port: Some(7000),
                max_retries: Some(5),
                ..Default::default()
            })
            .unwrap();

        let env_vars = |name: &str| match name {
            HOST_ENV => Some("env.example".to_string()),
            PORT_ENV => Some("7100".to_string()),
            _ => None,
        };
        let overrides = ConfigOverrides::new().with_port(7200);
        let config = resolve_config_with_env(&paths, &overrides, env_vars).unwrap();

        assert_eq!(config.host.value, "env.example");
        assert_eq!(config.host.source, ValueSource::EnvVar(HOST_ENV.to_string()));
        assert_eq!(config.port.value, 7200);
        assert_eq!(config.port.source, ValueSource::CliFlag);
        assert_eq!(config.max_retries.value, 5);
        assert_eq!(config.max_retries.source, ValueSource::File);
        assert_eq!(
            config.endpoint().url_for("tok"),
            "ws://env.example:7200/ws/tok"
        );
    }

    #[test]
    fn test_bad_port_env_is_rejected() {
        let env = TestEnv::new();
        let result = resolve_config_with_env(&env.paths(), &ConfigOverrides::new(), |name| {
            (name == PORT_ENV).then(|| "eighty".to_string())
        });
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_client_settings_from_file() {
        let env = TestEnv::new();
        let paths = env.paths();
        paths
            .write_config(&QuestlinkConfig {
                heartbeat_secs: Some(10),
                retry_base_delay_secs: Some(2),
                retry_auth_rejected: Some(false),
                ..Default::default()
            })
            .unwrap();

        let settings = resolve_config_with_env(&paths, &ConfigOverrides::new(), no_env)
            .unwrap()
            .client_settings();
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(settings.retry.delay_for(3), Duration::from_secs(6));
        assert!(!settings.retry.retry_auth_rejected);
    }

    #[test]
    fn test_token_precedence() {
        let env = TestEnv::new();
        let paths = env.paths();
        assert!(resolve_token_with_env(&paths, None, no_env).unwrap().is_none());

        paths
            .write_state(&QuestlinkState {
                auth_token: Some("from-file".into()),
            })
            .unwrap();
        let token = resolve_token_with_env(&paths, None, no_env).unwrap().unwrap();
        assert_eq!(token.value(), "from-file");
        assert_eq!(token.source(), &ValueSource::File);

        let from_env = |name: &str| (name == TOKEN_ENV).then(|| "from-env".to_string());
        let token = resolve_token_with_env(&paths, None, from_env).unwrap().unwrap();
        assert_eq!(token.value(), "from-env");

        let token = resolve_token_with_env(&paths, Some("from-cli"), from_env)
            .unwrap()
            .unwrap();
        assert_eq!(token.source(), &ValueSource::CliFlag);
    }

    #[test]
    fn test_blank_token_is_absent() {
        let env = TestEnv::new();
        let blank = |_: &str| Some("   ".to_string());
        assert!(resolve_token_with_env(&env.paths(), Some(""), blank)
            .unwrap()
            .is_none());
    }

    #[test]
    #[serial]
    fn test_resolve_token_reads_process_env() {
        let env = TestEnv::new();
        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::set_var(TOKEN_ENV, "process-token") };
        let token = resolve_token(&env.paths(), None).unwrap().unwrap();
        unsafe { std::env::remove_var(TOKEN_ENV) };

        assert_eq!(token.value(), "process-token");
        assert_eq!(token.source(), &ValueSource::EnvVar(TOKEN_ENV.to_string()));
    }
}
