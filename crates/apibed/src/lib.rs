//! Harness for driving an out-of-process API emulator over its stdio.
//!
//! Tests exercise service-call code against a child emulator instead of a
//! production backend. The crate starts and stops that child, frames requests
//! onto its stdin, and reads framed responses back from its stdout:
//!
//! - [`frame`] encodes one message per line as Base64 with an inner length
//!   header.
//! - [`wire`] defines the request and response envelopes.
//! - [`Transport`] owns the child and serialises callers onto the pipe.
//! - [`dispatch`] turns a service call into one exchange and maps reported
//!   failures to [`ApplicationError`].
//! - [`Context`] binds an inbound operation's headers to a backend and
//!   answers namespace queries locally.
//!
//! Configuration lives in [`apibed_config`]; [`telemetry`] installs the
//! `tracing` subscriber the rest of the crate logs through.

pub mod dispatch;
pub mod frame;
pub mod telemetry;
pub mod wire;

mod context;
mod error;
mod transport;

pub use context::{
    CURRENT_NAMESPACE_HEADER, CallRoute, Context, DEFAULT_NAMESPACE_HEADER, LOCAL_SERVICE,
    LogLevel, NamespaceQuery, REQUEST_ID_HEADER, RequestHeaders,
};
pub use dispatch::{Backend, RoundTrip};
pub use error::{
    ApplicationError, CallError, ContextError, FrameError, ProtocolError, StartError,
    TransportError,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{Endpoint, Transport, TransportOptions};

#[cfg(test)]
mod tests;
