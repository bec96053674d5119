//! Tracing subscriber installation shared by harness test binaries and the
//! stub emulator.
//!
//! Both sides of the pipe log through the same subscriber shape. Events carry
//! their target (`apibed::transport`, `apibed::context`, ...) so a test run's
//! interleaved output can be filtered per layer with `APIBED_LOG_FILTER`.
//! Everything is written to stderr: the emulator's stdout carries framed
//! replies and a stray log line there would desynchronise the transport.

use std::io::{self, IsTerminal};

use apibed_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Proof that telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another global subscriber was already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on first use; later calls are no-ops.
///
/// Tests in one binary may each call this with their own configuration; only
/// the first filter and format take effect for the life of the process.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an invalid filter and
/// [`TelemetryError::Subscriber`] when a different global subscriber is
/// already registered.
///
/// # Examples
///
/// Call it once at the top of a test before starting a transport, so the
/// spawn, exchange and shutdown events are visible when a test fails:
///
/// ```rust
/// use apibed::{Endpoint, Transport};
/// use apibed_config::Config;
///
/// # fn main() -> Result<(), apibed::TelemetryError> {
/// let config = Config::default();
/// apibed::telemetry::initialise(&config)?;
///
/// // A second test in the same binary reuses the installed subscriber.
/// apibed::telemetry::initialise(&config)?;
///
/// let transport = Transport::new(Endpoint::from_config(&config));
/// assert!(!transport.is_running());
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |env_filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
