//! Per-operation handle bound to a backend.
//!
//! A [`Context`] carries the inbound request headers and routes service calls
//! either to the backend or, for the reserved namespace queries, answers them
//! locally from those headers. It also forwards leveled log lines to
//! `tracing`, tagged with the operation's request id.

mod headers;

use std::fmt;

use apibed_config::DEFAULT_APP_ID;
use prost::Message;
use tracing::{debug, error, info, warn};

pub use self::headers::RequestHeaders;
use crate::dispatch::Backend;
use crate::error::{CallError, ContextError};
use crate::wire::StringProto;

/// Log target for context operations and forwarded application logs.
pub(crate) const CONTEXT_TARGET: &str = "apibed::context";

/// Service name reserved for metadata queries answered without the backend.
pub const LOCAL_SERVICE: &str = "__go__";

/// Header carrying the namespace of the inbound operation.
pub const CURRENT_NAMESPACE_HEADER: &str = "X-AppEngine-Current-Namespace";

/// Header carrying the application's default namespace.
pub const DEFAULT_NAMESPACE_HEADER: &str = "X-AppEngine-Default-Namespace";

/// Header carrying the inbound operation's request id.
pub const REQUEST_ID_HEADER: &str = "X-Appengine-Internal-Request-Id";

/// Metadata queries answered from the inbound headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceQuery {
    /// `__go__.GetNamespace`.
    Current,
    /// `__go__.GetDefaultNamespace`.
    Default,
}

impl NamespaceQuery {
    /// Header the query is answered from.
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Current => CURRENT_NAMESPACE_HEADER,
            Self::Default => DEFAULT_NAMESPACE_HEADER,
        }
    }
}

/// Where a call is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRoute {
    /// Answered in-process from the headers.
    Local(NamespaceQuery),
    /// Sent to the backend.
    Backend,
}

impl CallRoute {
    /// Picks the route for `service.method`.
    #[must_use]
    pub fn resolve(service: &str, method: &str) -> Self {
        match (service, method) {
            (LOCAL_SERVICE, "GetNamespace") => Self::Local(NamespaceQuery::Current),
            (LOCAL_SERVICE, "GetDefaultNamespace") => Self::Local(NamespaceQuery::Default),
            _ => Self::Backend,
        }
    }
}

/// Severity of a forwarded application log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Routine progress.
    Info,
    /// Something unexpected but recoverable.
    Warning,
    /// A failed operation.
    Error,
    /// A failure the application cannot continue from.
    Critical,
}

/// Handle for one inbound operation.
pub struct Context<'b> {
    backend: &'b dyn Backend,
    headers: RequestHeaders,
    app_id: String,
}

impl<'b> Context<'b> {
    /// Binds `headers` to `backend`, reporting the default application id.
    #[must_use]
    pub fn new(backend: &'b dyn Backend, headers: RequestHeaders) -> Self {
        Self {
            backend,
            headers,
            app_id: DEFAULT_APP_ID.to_owned(),
        }
    }

    /// Overrides the application id.
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// The inbound headers.
    #[must_use]
    pub const fn headers(&self) -> &RequestHeaders {
        &self.headers
    }

    /// Current namespace, empty when the header is absent.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.header_or_empty(CURRENT_NAMESPACE_HEADER)
    }

    /// Default namespace, empty when the header is absent.
    #[must_use]
    pub fn default_namespace(&self) -> &str {
        self.header_or_empty(DEFAULT_NAMESPACE_HEADER)
    }

    /// Request id forwarded with every backend call, empty when absent.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.header_or_empty(REQUEST_ID_HEADER)
    }

    /// Application id, `testbed-test` unless overridden.
    #[must_use]
    pub fn fully_qualified_app_id(&self) -> &str {
        &self.app_id
    }

    /// Routes one call on already-encoded bytes.
    ///
    /// Namespace queries return an encoded `StringProto` built from the
    /// headers and never reach the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`CallError`] for routed calls.
    pub fn call_raw(
        &self,
        service: &str,
        method: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, CallError> {
        match CallRoute::resolve(service, method) {
            CallRoute::Local(query) => {
                debug!(
                    target: CONTEXT_TARGET,
                    service,
                    method,
                    "answering namespace query locally"
                );
                Ok(StringProto::new(self.header_or_empty(query.header())).encode_to_vec())
            }
            CallRoute::Backend => self
                .backend
                .call(service, method, payload, self.request_id()),
        }
    }

    /// Encodes `request`, routes the call, and decodes the reply as `Resp`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Call`] when the call fails and
    /// [`ContextError::Decode`] when the reply is not a valid `Resp`.
    pub fn call<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        request: &Req,
    ) -> Result<Resp, ContextError>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let reply = self.call_raw(service, method, &request.encode_to_vec())?;
        Resp::decode(reply.as_slice()).map_err(|source| ContextError::Decode {
            service: service.to_owned(),
            method: method.to_owned(),
            source,
        })
    }

    /// Forwards a log line at `level`. Never touches the backend.
    pub fn log(&self, level: LogLevel, message: fmt::Arguments<'_>) {
        let request_id = self.request_id();
        let app_id = self.app_id.as_str();
        match level {
            LogLevel::Debug => debug!(target: CONTEXT_TARGET, app_id, request_id, "{message}"),
            LogLevel::Info => info!(target: CONTEXT_TARGET, app_id, request_id, "{message}"),
            LogLevel::Warning => warn!(target: CONTEXT_TARGET, app_id, request_id, "{message}"),
            LogLevel::Error => error!(target: CONTEXT_TARGET, app_id, request_id, "{message}"),
            LogLevel::Critical => error!(
                target: CONTEXT_TARGET,
                app_id,
                request_id,
                critical = true,
                "{message}"
            ),
        }
    }

    /// Forwards a debug line.
    pub fn debug(&self, message: fmt::Arguments<'_>) {
        self.log(LogLevel::Debug, message);
    }

    /// Forwards an info line.
    pub fn info(&self, message: fmt::Arguments<'_>) {
        self.log(LogLevel::Info, message);
    }

    /// Forwards a warning line.
    pub fn warning(&self, message: fmt::Arguments<'_>) {
        self.log(LogLevel::Warning, message);
    }

    /// Forwards an error line.
    pub fn error(&self, message: fmt::Arguments<'_>) {
        self.log(LogLevel::Error, message);
    }

    /// Forwards a critical line, emitted as an error flagged `critical`.
    pub fn critical(&self, message: fmt::Arguments<'_>) {
        self.log(LogLevel::Critical, message);
    }

    fn header_or_empty(&self, name: &str) -> &str {
        self.headers.get(name).unwrap_or_default()
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("headers", &self.headers)
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}
