//! Configuration and state management for Questlink.
//!
//! This module defines KDL schemas for two distinct files:
//!
//! ## config.kdl - User preferences (safe to sync across machines)
//!
//! Located at `~/.config/questlink/config.kdl`. Contains the notification
//! server location, heartbeat and retry tuning, and output/log formats.
//!
//! ## state.kdl - Runtime state (machine-specific, contains secrets)
//!
//! Located at `~/.local/share/questlink/state.kdl`. Contains:
//! - `auth-token` - the session token used for the socket path and REST calls
//!
//! ## Security
//!
//! **CRITICAL**: `state.kdl` MUST be written with 0600 permissions (owner read/write only)
//! because it contains the auth token.
//!
//! ## Precedence
//!
//! CLI flag > environment > file > defaults.
//! Use the [`resolver`] module for unified precedence resolution.

pub mod resolver;
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

pub use resolver::{
    ConfigOverrides, HOST_ENV, PORT_ENV, Resolved, ResolvedConfig, ResolvedToken, TOKEN_ENV,
    ValueSource, resolve_config, resolve_token,
};
pub use schema::{LogFormat, OutputFormat, QuestlinkConfig, QuestlinkState, mask_token};
#[cfg(unix)]
pub use schema::{CONFIG_FILE_MODE, STATE_FILE_MODE};

use crate::{Error, Result};

/// Environment variable relocating the config directory.
pub const CONFIG_DIR_ENV: &str = "QL_CONFIG_DIR";

/// Environment variable relocating the data directory.
pub const DATA_DIR_ENV: &str = "QL_DATA_DIR";

const CONFIG_FILE: &str = "config.kdl";
const STATE_FILE: &str = "state.kdl";

/// Locations of config.kdl and state.kdl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ConfigPaths {
    pub fn new(config_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Standard locations, honoring `QL_CONFIG_DIR` and `QL_DATA_DIR`.
    pub fn discover() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Other("Could not determine config directory".to_string()))?
                .join("questlink"),
        };
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?
                .join("questlink"),
        };
        Ok(Self::new(config_dir, data_dir))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE)
    }

    /// Read config.kdl. A missing file is an empty config.
    pub fn read_config(&self) -> Result<QuestlinkConfig> {
        Ok(read_kdl(&self.config_file())?
            .map(|doc| QuestlinkConfig::from_kdl(&doc))
            .unwrap_or_default())
    }

    pub fn write_config(&self, config: &QuestlinkConfig) -> Result<()> {
        config.validate().map_err(Error::InvalidInput)?;
        let path = self.config_file();
        write_kdl(&path, &config.to_kdl().to_string())?;
        #[cfg(unix)]
        set_mode(&path, CONFIG_FILE_MODE)?;
        Ok(())
    }

    /// Read state.kdl. A missing file is an empty state.
    pub fn read_state(&self) -> Result<QuestlinkState> {
        Ok(read_kdl(&self.state_file())?
            .map(|doc| QuestlinkState::from_kdl(&doc))
            .unwrap_or_default())
    }

    /// Write state.kdl with owner-only permissions.
    pub fn write_state(&self, state: &QuestlinkState) -> Result<()> {
        let path = self.state_file();
        write_kdl(&path, &state.to_kdl().to_string())?;
        #[cfg(unix)]
        set_mode(&path, STATE_FILE_MODE)?;
        Ok(())
    }
}

fn read_kdl(path: &Path) -> Result<Option<kdl::KdlDocument>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text.parse()?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_kdl(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}
