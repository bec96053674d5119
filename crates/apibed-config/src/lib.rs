//! Shared configuration for the apibed test harness.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then an
//! optional `apibed.toml`, then `APIBED_*` environment variables, then any
//! command-line flags handed to [`Config::load_from_iter`]. Test suites
//! normally call [`Config::load_from_env`] so the test runner's own argument
//! vector never reaches the parser.

mod defaults;
mod logging;
mod stderr;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_APP_ID, DEFAULT_CLOSE_GRACE_MS, DEFAULT_EMULATOR_COMMAND, DEFAULT_LOG_FILTER,
    default_app_id, default_close_grace_ms, default_emulator_args, default_emulator_command,
    default_log_filter, default_log_filter_string, default_log_format, default_stderr_mode,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use stderr::{StderrMode, StderrModeParseError};

/// Program name used when loading without a real argument vector.
const PROGRAM_NAME: &str = "apibed";

/// Resolved harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "APIBED")]
pub struct Config {
    /// Executable that hosts the emulator (typically a Python interpreter).
    #[serde(default = "default_emulator_command")]
    pub emulator_command: Utf8PathBuf,
    /// Ordered arguments passed to the emulator executable.
    #[serde(default = "default_emulator_args")]
    pub emulator_args: Vec<String>,
    /// Milliseconds to wait for a graceful exit before killing the emulator.
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
    /// Handling of the emulator's standard error stream.
    #[serde(default = "default_stderr_mode")]
    pub stderr: StderrMode,
    /// Application identity reported to code under test.
    #[serde(default = "default_app_id")]
    pub app_id: String,
    /// `tracing` filter expression used when installing harness telemetry.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format for harness logs.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            emulator_command: default_emulator_command(),
            emulator_args: default_emulator_args(),
            close_grace_ms: default_close_grace_ms(),
            stderr: default_stderr_mode(),
            app_id: default_app_id(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from files and the environment only.
    ///
    /// # Errors
    ///
    /// Returns the loader error when a configuration file or environment
    /// variable cannot be parsed.
    pub fn load_from_env() -> Result<Self, Arc<OrthoError>> {
        Self::load_from_iter([OsString::from(PROGRAM_NAME)])
    }

    /// Grace period granted to the emulator on close.
    #[must_use]
    pub const fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    /// Emulator executable.
    #[must_use]
    pub fn emulator_command(&self) -> &Utf8PathBuf {
        &self.emulator_command
    }

    /// Emulator arguments in launch order.
    #[must_use]
    pub fn emulator_args(&self) -> &[String] {
        &self.emulator_args
    }

    /// Stderr handling policy.
    #[must_use]
    pub const fn stderr_mode(&self) -> StderrMode {
        self.stderr
    }

    /// Configured application identity.
    #[must_use]
    pub fn app_id(&self) -> &str {
        self.app_id.as_str()
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
