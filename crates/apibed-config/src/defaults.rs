use camino::Utf8PathBuf;

use crate::logging::LogFormat;
use crate::stderr::StderrMode;

/// Interpreter used to launch the emulator when nothing else is configured.
pub const DEFAULT_EMULATOR_COMMAND: &str = "python";

/// Grace period granted to the emulator after `#quit#` before it is killed.
pub const DEFAULT_CLOSE_GRACE_MS: u64 = 3_000;

/// Application identity reported to code under test.
pub const DEFAULT_APP_ID: &str = "testbed-test";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default emulator command.
pub fn default_emulator_command() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_EMULATOR_COMMAND)
}

/// The emulator takes no arguments unless configured.
pub fn default_emulator_args() -> Vec<String> {
    Vec::new()
}

/// Default close grace period in milliseconds.
pub fn default_close_grace_ms() -> u64 {
    DEFAULT_CLOSE_GRACE_MS
}

/// Owned application id used where allocation is required (e.g. serde).
pub fn default_app_id() -> String {
    DEFAULT_APP_ID.to_owned()
}

/// Default log filter expression.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default handling of the emulator's stderr.
pub fn default_stderr_mode() -> StderrMode {
    StderrMode::Drain
}
