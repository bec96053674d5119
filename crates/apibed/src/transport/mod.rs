//! Subprocess transport: one emulator child reached over its stdin/stdout.
//!
//! A [`Transport`] owns at most one running emulator. Every call writes one
//! framed request and reads one framed response while holding the pipe lock,
//! so concurrent callers never interleave on the wire. The protocol carries
//! no correlation id; this ordering is what pairs replies with requests.
//!
//! After any failed exchange the session is poisoned and fails fast until it
//! is closed and started again.

mod endpoint;
mod lifecycle;
mod pipe;
mod session;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use apibed_config::{Config, DEFAULT_APP_ID, DEFAULT_CLOSE_GRACE_MS, StderrMode};
use tracing::{debug, info, warn};

pub use self::endpoint::Endpoint;
use self::lifecycle::Shutdown;
use self::session::Session;
use crate::context::{Context, RequestHeaders};
use crate::dispatch::{self, Backend, RoundTrip};
use crate::error::{CallError, StartError, TransportError};
use crate::frame::Sentinel;

/// Log target for transport operations.
pub(crate) const TRANSPORT_TARGET: &str = "apibed::transport";

/// Tunables applied when starting and stopping the emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    close_grace: Duration,
    stderr: StderrMode,
    app_id: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            close_grace: Duration::from_millis(DEFAULT_CLOSE_GRACE_MS),
            stderr: StderrMode::default(),
            app_id: DEFAULT_APP_ID.to_owned(),
        }
    }
}

impl TransportOptions {
    /// Reads the options from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            close_grace: config.close_grace(),
            stderr: config.stderr_mode(),
            app_id: config.app_id().to_owned(),
        }
    }

    /// Overrides how long `close` waits before killing the emulator.
    #[must_use]
    pub const fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Overrides the stderr policy.
    #[must_use]
    pub const fn with_stderr(mut self, stderr: StderrMode) -> Self {
        self.stderr = stderr;
        self
    }

    /// Overrides the application id reported by contexts.
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Grace period between `#quit#` and a kill.
    #[must_use]
    pub const fn close_grace(&self) -> Duration {
        self.close_grace
    }

    /// Stderr policy.
    #[must_use]
    pub const fn stderr(&self) -> StderrMode {
        self.stderr
    }

    /// Application id reported by contexts.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }
}

/// Owns the emulator child and serialises access to its pipes.
///
/// All methods take `&self`; share a transport between threads with `Arc`.
/// Dropping the transport closes any running session.
///
/// # Example
///
/// ```no_run
/// use apibed::{Endpoint, Transport};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Transport::new(Endpoint::new("python", ["emulator.py"]));
/// transport.start()?;
/// let reply = transport.call("echo", "Echo", b"hello", "")?;
/// assert_eq!(reply, b"hello");
/// transport.close();
/// # Ok(())
/// # }
/// ```
pub struct Transport {
    endpoint: Endpoint,
    options: TransportOptions,
    session: Mutex<Option<Arc<Session>>>,
}

impl Transport {
    /// Creates a stopped transport with default options.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_options(endpoint, TransportOptions::default())
    }

    /// Creates a stopped transport with explicit options.
    #[must_use]
    pub const fn with_options(endpoint: Endpoint, options: TransportOptions) -> Self {
        Self {
            endpoint,
            options,
            session: Mutex::new(None),
        }
    }

    /// Creates a stopped transport from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::with_options(
            Endpoint::from_config(config),
            TransportOptions::from_config(config),
        )
    }

    /// Endpoint this transport launches.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Options this transport was built with.
    #[must_use]
    pub const fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Launches the emulator. Does nothing when a session is already open.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::BinaryNotFound`] when the executable does not
    /// exist and [`StartError::SpawnFailed`] for any other launch failure.
    pub fn start(&self) -> Result<(), StartError> {
        let mut slot = self.session_slot();
        if let Some(session) = slot.as_ref() {
            debug!(
                target: TRANSPORT_TARGET,
                pid = session.pid(),
                "emulator already running"
            );
            return Ok(());
        }

        let session = Session::spawn(&self.endpoint, self.options.stderr)?;
        info!(
            target: TRANSPORT_TARGET,
            pid = session.pid(),
            command = %self.endpoint.command().display(),
            "emulator started"
        );
        *slot = Some(Arc::new(session));
        Ok(())
    }

    /// Reports whether a session is open and its process is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.current_session()
            .is_some_and(|session| session.is_alive())
    }

    /// Process id of the running emulator.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.current_session().map(|session| session.pid())
    }

    /// Asks the emulator to exit without closing the session.
    ///
    /// Best effort: a missing session or a failed write is logged, not
    /// returned.
    pub fn send_quit_signal(&self) {
        let result = self
            .require_session()
            .and_then(|session| session.send_sentinel(Sentinel::Quit));
        if let Err(error) = result {
            warn!(target: TRANSPORT_TARGET, error = %error, "failed to send quit signal");
        }
    }

    /// Tells the emulator to discard all in-memory state.
    ///
    /// Queues behind in-flight calls like any other exchange.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotStarted`] without a session and the
    /// usual exchange errors when the write fails.
    pub fn reset(&self) -> Result<(), TransportError> {
        let session = self.require_session()?;
        session.send_sentinel(Sentinel::Reset)?;
        debug!(target: TRANSPORT_TARGET, pid = session.pid(), "emulator reset");
        Ok(())
    }

    /// Stops the emulator. Does nothing when no session is open.
    ///
    /// Sends `#quit#`, waits up to the grace period for the process to exit,
    /// then kills it. The session is always cleared. Callers still queued on
    /// the pipe receive [`TransportError::Closed`].
    pub fn close(&self) {
        let Some(session) = self.session_slot().take() else {
            return;
        };
        let pid = session.pid();
        match session.shutdown(self.options.close_grace) {
            Shutdown::Exited(status) => {
                info!(target: TRANSPORT_TARGET, pid, %status, "emulator stopped");
            }
            Shutdown::Killed => {
                warn!(
                    target: TRANSPORT_TARGET,
                    pid,
                    grace_ms = self.options.close_grace.as_millis(),
                    "emulator killed after close timeout"
                );
            }
        }
    }

    /// Issues one RPC and returns the response payload.
    ///
    /// An empty `request_id` is sent as absent.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Application`] when the emulator reports a
    /// failure, and [`CallError::Transport`] when the exchange fails.
    pub fn call(
        &self,
        service: &str,
        method: &str,
        payload: &[u8],
        request_id: &str,
    ) -> Result<Vec<u8>, CallError> {
        dispatch::call(self, service, method, payload, request_id)
    }

    /// Binds an inbound operation's headers to this transport.
    #[must_use]
    pub fn new_context(&self, headers: RequestHeaders) -> Context<'_> {
        Context::new(self, headers).with_app_id(self.options.app_id.clone())
    }

    /// Starts the emulator, runs `body`, and closes the emulator afterwards,
    /// also when `body` panics.
    ///
    /// # Errors
    ///
    /// Returns the [`StartError`] when the emulator cannot be launched;
    /// `body` does not run in that case.
    pub fn run<T>(&self, body: impl FnOnce(&Self) -> T) -> Result<T, StartError> {
        self.start()?;
        let _closer = CloseOnDrop(self);
        Ok(body(self))
    }

    fn session_slot(&self) -> MutexGuard<'_, Option<Arc<Session>>> {
        self.session
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn current_session(&self) -> Option<Arc<Session>> {
        self.session_slot().clone()
    }

    fn require_session(&self) -> Result<Arc<Session>, TransportError> {
        self.current_session().ok_or(TransportError::NotStarted)
    }
}

impl RoundTrip for Transport {
    fn round_trip(&self, message: &[u8]) -> Result<Vec<u8>, TransportError> {
        // The session lock is released before the exchange so `close` can
        // detach the session while a call is blocked on the pipe.
        self.require_session()?.exchange(message)
    }
}

impl Backend for Transport {
    fn call(
        &self,
        service: &str,
        method: &str,
        payload: &[u8],
        request_id: &str,
    ) -> Result<Vec<u8>, CallError> {
        dispatch::call(self, service, method, payload, request_id)
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

struct CloseOnDrop<'a>(&'a Transport);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests;
