//! Error taxonomy for the transport stack.
//!
//! Each layer owns one `thiserror` enum and wraps the layer beneath it, so a
//! caller can tell a dead pipe from a malformed frame from a request the
//! emulator rejected. I/O errors are wrapped in `Arc` to keep the enums small
//! and `Send + Sync`.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Failures launching the emulator process.
#[derive(Debug, Error)]
pub enum StartError {
    /// The emulator executable could not be found.
    #[error("emulator executable not found: {command}")]
    BinaryNotFound {
        /// Command that was looked up.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The operating system refused to launch the emulator.
    #[error("failed to launch emulator '{command}'")]
    SpawnFailed {
        /// Command that failed to launch.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The emulator script handed to the interpreter does not exist.
    #[error("emulator script not found: {path}")]
    ScriptNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The child was spawned but one of its standard streams was not captured.
    #[error("emulator {stream} was not captured")]
    MissingPipe {
        /// Name of the missing stream.
        stream: &'static str,
    },
}

/// Faults in the line framing itself.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The line body is not valid Base64.
    #[error("frame is not valid base64: {0}")]
    Encoding(#[source] base64::DecodeError),

    /// The stream ended before a complete line was read.
    #[error("stream closed mid-frame after {received} bytes")]
    Truncated {
        /// Bytes of the partial line that did arrive.
        received: usize,
    },

    /// Reading from the stream failed.
    #[error("failed to read frame: {0}")]
    Io(#[source] Arc<io::Error>),
}

/// A frame arrived but its contents could not be understood.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The framing layer failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The framed bytes are not a valid response message.
    #[error("failed to decode response message: {0}")]
    Decode(#[source] prost::DecodeError),
}

/// Failures moving bytes through a running session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No emulator is running; `start` has not been called or `close` has.
    #[error("emulator is not running")]
    NotStarted,

    /// The session was closed while this caller waited for the pipe.
    #[error("emulator session was closed")]
    Closed,

    /// An earlier exchange failed and left the pipe in an unknown state.
    #[error("emulator session is unusable after an earlier protocol failure")]
    Poisoned,

    /// Writing to the emulator failed.
    #[error("failed to write to emulator: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The response could not be read or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    /// Wraps a write-side I/O failure.
    #[must_use]
    pub fn io(error: io::Error) -> Self {
        Self::Io(Arc::new(error))
    }
}

impl From<FrameError> for TransportError {
    fn from(error: FrameError) -> Self {
        Self::Protocol(ProtocolError::Frame(error))
    }
}

/// A well-formed response in which the emulator reported a handled failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("API error {code} ({service}): {detail}")]
pub struct ApplicationError {
    service: String,
    code: i32,
    detail: String,
}

impl ApplicationError {
    /// Builds an application error for the given service.
    #[must_use]
    pub fn new(service: impl Into<String>, code: i32, detail: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            code,
            detail: detail.into(),
        }
    }

    /// Service whose call failed.
    #[must_use]
    pub fn service(&self) -> &str {
        self.service.as_str()
    }

    /// Service-specific error code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Human-readable failure detail.
    #[must_use]
    pub fn detail(&self) -> &str {
        self.detail.as_str()
    }
}

/// Errors returned by a single RPC.
#[derive(Debug, Error)]
pub enum CallError {
    /// The exchange itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The emulator handled the call and reported a failure.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// The emulator's RPC layer rejected the call before the service ran.
    #[error("RPC error {code} calling {service}: {detail}")]
    Rpc {
        /// Service that was called.
        service: String,
        /// RPC error code.
        code: i32,
        /// Detail reported by the emulator.
        detail: String,
    },
}

impl CallError {
    /// Returns the application error when the backend reported one.
    #[must_use]
    pub const fn as_application(&self) -> Option<&ApplicationError> {
        match self {
            Self::Application(error) => Some(error),
            Self::Transport(_) | Self::Rpc { .. } => None,
        }
    }
}

impl From<ProtocolError> for CallError {
    fn from(error: ProtocolError) -> Self {
        Self::Transport(TransportError::Protocol(error))
    }
}

/// Errors returned by typed calls made through a [`crate::Context`].
#[derive(Debug, Error)]
pub enum ContextError {
    /// The call failed.
    #[error(transparent)]
    Call(#[from] CallError),

    /// The response payload is not a valid message of the expected type.
    #[error("failed to decode {service}.{method} response: {source}")]
    Decode {
        /// Service that was called.
        service: String,
        /// Method that was called.
        method: String,
        /// Underlying decode error.
        #[source]
        source: prost::DecodeError,
    },
}
