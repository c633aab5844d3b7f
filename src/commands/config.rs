//! `ql config show|set`.

use serde::Serialize;

use crate::commands::{Output, json_line};
use crate::config::{ConfigOverrides, ConfigPaths, ResolvedConfig, resolve_config};
use crate::{Error, Result};

#[derive(Debug, Serialize)]
pub struct ConfigShow {
    pub config_file: String,
    pub settings: ResolvedConfig,
}

impl Output for ConfigShow {
    fn to_json(&self) -> String {
        json_line(self)
    }

    fn to_human(&self) -> String {
        let s = &self.settings;
        let mut lines = vec![format!("Config file: {}", self.config_file), String::new()];
        let mut row = |key: &str, value: String, source: &dyn std::fmt::Display| {
            lines.push(format!("  {:<22} {:<36} ({})", key, value, source));
        };
        row("host", s.host.value.clone(), &s.host.source);
        row("port", s.port.value.to_string(), &s.port.source);
        row("secure", s.secure.value.to_string(), &s.secure.source);
        row("api-base", s.api_base.value.clone(), &s.api_base.source);
        row(
            "heartbeat-secs",
            s.heartbeat_secs.value.to_string(),
            &s.heartbeat_secs.source,
        );
        row(
            "retry-base-delay-secs",
            s.retry_base_delay_secs.value.to_string(),
            &s.retry_base_delay_secs.source,
        );
        row("max-retries", s.max_retries.value.to_string(), &s.max_retries.source);
        row(
            "retry-auth-rejected",
            s.retry_auth_rejected.value.to_string(),
            &s.retry_auth_rejected.source,
        );
        row(
            "output-format",
            s.output_format.value.to_string(),
            &s.output_format.source,
        );
        row(
            "log-format",
            s.log_format.value.as_str().to_string(),
            &s.log_format.source,
        );
        lines.join("\n")
    }
}

pub fn config_show(paths: &ConfigPaths, overrides: &ConfigOverrides) -> Result<ConfigShow> {
    Ok(ConfigShow {
        config_file: paths.config_file().display().to_string(),
        settings: resolve_config(paths, overrides)?,
    })
}

#[derive(Debug, Serialize)]
pub struct ConfigSet {
    pub key: String,
    pub value: String,
    pub path: String,
}

impl Output for ConfigSet {
    fn to_json(&self) -> String {
        json_line(self)
    }

    fn to_human(&self) -> String {
        format!("Set {} = {} in {}", self.key, self.value, self.path)
    }
}

pub fn config_set(paths: &ConfigPaths, key: &str, value: &str) -> Result<ConfigSet> {
    let mut config = paths.read_config()?;
    config.set(key, value).map_err(Error::InvalidInput)?;
    paths.write_config(&config)?;
    tracing::info!(key, "config updated");
    Ok(ConfigSet {
        key: key.to_string(),
        value: value.to_string(),
        path: paths.config_file().display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;

    #[test]
    fn test_config_set_persists() {
        let env = TestEnv::new();
        let paths = env.paths();
        let result = config_set(&paths, "max-retries", "5").unwrap();
        assert_eq!(result.key, "max-retries");
        assert_eq!(paths.read_config().unwrap().max_retries, Some(5));
    }

    #[test]
    fn test_config_set_unknown_key() {
        let env = TestEnv::new();
        let err = config_set(&env.paths(), "colour", "red").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!env.paths().config_file().exists());
    }

    #[test]
    fn test_config_show_human_lists_sources() {
        let env = TestEnv::new();
        let paths = env.paths();
        config_set(&paths, "host", "notify.example").unwrap();

        let overrides = ConfigOverrides::new().with_port(9100);
        let human = config_show(&paths, &overrides).unwrap().to_human();
        assert!(human.contains("notify.example"));
        assert!(human.contains("(file)"));
        assert!(human.contains("9100"));
        assert!(human.contains("(cli)"));
    }
}
