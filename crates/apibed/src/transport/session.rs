//! State owned by one running emulator.

use std::io::{BufRead, BufReader, BufWriter, ErrorKind};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use apibed_config::StderrMode;
use tracing::{debug, warn};

use super::lifecycle::{self, Shutdown};
use super::pipe::StdioPipe;
use super::{Endpoint, TRANSPORT_TARGET};
use crate::error::{StartError, TransportError};
use crate::frame::Sentinel;

type ChildPipe = StdioPipe<BufReader<ChildStdout>, BufWriter<ChildStdin>>;

/// A live emulator: process handle, pipes, and health flags.
///
/// The child handle and the pipes sit behind separate locks so shutdown can
/// reap or kill the process while a caller is still blocked reading.
pub(crate) struct Session {
    pid: u32,
    child: Mutex<Child>,
    pipe: Mutex<Option<ChildPipe>>,
    closed: AtomicBool,
    poisoned: AtomicBool,
    stderr_drain: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Launches the endpoint with piped stdin and stdout.
    pub(crate) fn spawn(endpoint: &Endpoint, stderr: StderrMode) -> Result<Self, StartError> {
        let command_name = endpoint.command().display().to_string();
        debug!(
            target: TRANSPORT_TARGET,
            command = %command_name,
            args = ?endpoint.args(),
            stderr = %stderr,
            "spawning emulator"
        );

        let mut child = Command::new(endpoint.command())
            .args(endpoint.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stderr_stdio(stderr))
            .spawn()
            .map_err(move |error| {
                let source = Arc::new(error);
                if source.kind() == std::io::ErrorKind::NotFound {
                    StartError::BinaryNotFound {
                        command: command_name,
                        source,
                    }
                } else {
                    StartError::SpawnFailed {
                        command: command_name,
                        source,
                    }
                }
            })?;

        let (stdin, stdout) = match take_pipes(&mut child) {
            Ok(streams) => streams,
            Err(error) => {
                lifecycle::wait_or_kill(&mut child, Instant::now());
                return Err(error);
            }
        };
        let stderr_drain = child.stderr.take().map(|stream| drain_stderr(child.id(), stream));

        let pid = child.id();
        debug!(target: TRANSPORT_TARGET, pid, "emulator spawned");

        Ok(Self {
            pid,
            child: Mutex::new(child),
            pipe: Mutex::new(Some(StdioPipe::new(
                BufReader::new(stdout),
                BufWriter::new(stdin),
            ))),
            closed: AtomicBool::new(false),
            poisoned: AtomicBool::new(false),
            stderr_drain: Mutex::new(stderr_drain),
        })
    }

    pub(crate) const fn pid(&self) -> u32 {
        self.pid
    }

    /// Reports whether the process is still alive.
    pub(crate) fn is_alive(&self) -> bool {
        let mut child = self
            .child
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        matches!(child.try_wait(), Ok(None))
    }

    /// One framed write-then-read with the pipe held for both halves.
    pub(crate) fn exchange(&self, message: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.with_pipe(|pipe| pipe.exchange(message))
    }

    pub(crate) fn send_sentinel(&self, sentinel: Sentinel) -> Result<(), TransportError> {
        self.with_pipe(|pipe| pipe.send_sentinel(sentinel))
    }

    fn with_pipe<T>(
        &self,
        operation: impl FnOnce(&mut ChildPipe) -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        let mut guard = self
            .pipe
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        // Checked after acquiring the lock so queued callers observe a close
        // that happened while they waited.
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if self.poisoned.load(Ordering::Acquire) {
            return Err(TransportError::Poisoned);
        }
        let Some(pipe) = guard.as_mut() else {
            return Err(TransportError::Closed);
        };

        operation(pipe).inspect_err(|error| {
            warn!(
                target: TRANSPORT_TARGET,
                pid = self.pid,
                error = %error,
                "exchange failed, session is now unusable"
            );
            self.poisoned.store(true, Ordering::Release);
        })
    }

    /// Sends `#quit#`, waits up to `grace`, then kills. Never fails.
    pub(crate) fn shutdown(&self, grace: Duration) -> Shutdown {
        self.closed.store(true, Ordering::Release);
        let deadline = Instant::now() + grace;

        match lifecycle::lock_until(&self.pipe, deadline) {
            Some(mut guard) => {
                // Dropping the pipe closes the emulator's stdin after the quit.
                if let Some(mut pipe) = guard.take() {
                    if let Err(error) = pipe.send_sentinel(Sentinel::Quit) {
                        debug!(
                            target: TRANSPORT_TARGET,
                            pid = self.pid,
                            error = %error,
                            "quit signal not delivered"
                        );
                    }
                }
            }
            None => warn!(
                target: TRANSPORT_TARGET,
                pid = self.pid,
                "pipe still busy at the close deadline"
            ),
        }

        let outcome = {
            let mut child = self
                .child
                .lock()
                .unwrap_or_else(|poison| poison.into_inner());
            lifecycle::wait_or_kill(&mut child, deadline)
        };
        self.join_stderr_drain();
        outcome
    }

    fn join_stderr_drain(&self) {
        let handle = self
            .stderr_drain
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
        let Some(handle) = handle else {
            return;
        };
        // A grandchild can keep stderr open after the emulator exits.
        if !handle.is_finished() {
            debug!(target: TRANSPORT_TARGET, pid = self.pid, "detaching stderr drain");
            return;
        }
        if handle.join().is_err() {
            warn!(target: TRANSPORT_TARGET, pid = self.pid, "stderr drain panicked");
        }
    }
}

fn stderr_stdio(mode: StderrMode) -> Stdio {
    match mode {
        StderrMode::Drain => Stdio::piped(),
        StderrMode::Inherit => Stdio::inherit(),
        StderrMode::Null => Stdio::null(),
    }
}

fn take_pipes(child: &mut Child) -> Result<(ChildStdin, ChildStdout), StartError> {
    let stdin = child
        .stdin
        .take()
        .ok_or(StartError::MissingPipe { stream: "stdin" })?;
    let stdout = child
        .stdout
        .take()
        .ok_or(StartError::MissingPipe { stream: "stdout" })?;
    Ok((stdin, stdout))
}

fn drain_stderr(pid: u32, stream: ChildStderr) -> JoinHandle<()> {
    thread::spawn(move || {
        drain_lines(pid, BufReader::new(stream));
    })
}

/// Logs stderr until EOF or a hard read error.
///
/// Lines are read as bytes: emulator diagnostics may echo binary payloads,
/// and stopping on them would leave the child writing into a closed pipe.
fn drain_lines<R: BufRead>(pid: u32, mut reader: R) -> usize {
    let mut line = Vec::new();
    let mut drained = 0;
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                drained += 1;
                let text = String::from_utf8_lossy(&line);
                debug!(target: TRANSPORT_TARGET, pid, stderr = %text.trim_end(), "emulator stderr");
            }
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) => {
                debug!(target: TRANSPORT_TARGET, pid, error = %error, "stderr drain stopped");
                break;
            }
        }
    }
    drained
}
