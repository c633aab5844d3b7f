//! Common test utilities for questlink integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch
//! the user's `~/.config/questlink/` or `~/.local/share/questlink/`.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with isolated config and data directories.
///
/// The `ql()` method returns a `Command` that sets `QL_CONFIG_DIR` and
/// `QL_DATA_DIR` per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub config_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            config_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the ql binary with isolated directories.
    ///
    /// Inherited `QL_TOKEN`/`QL_HOST`/`QL_PORT`/`QL_LOG` are removed so the
    /// developer's shell cannot leak into tests.
    pub fn ql(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ql"));
        cmd.env("QL_CONFIG_DIR", self.config_dir.path());
        cmd.env("QL_DATA_DIR", self.data_dir.path());
        for var in ["QL_TOKEN", "QL_HOST", "QL_PORT", "QL_LOG"] {
            cmd.env_remove(var);
        }
        cmd
    }

    pub fn config_path(&self) -> &std::path::Path {
        self.config_dir.path()
    }

    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    pub fn config_file(&self) -> std::path::PathBuf {
        self.config_dir.path().join("config.kdl")
    }

    pub fn state_file(&self) -> std::path::PathBuf {
        self.data_dir.path().join("state.kdl")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
