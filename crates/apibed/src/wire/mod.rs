//! Protobuf envelopes exchanged with the emulator.
//!
//! Field tags match the `remote_api.proto` envelopes understood by App Engine
//! API emulators, so an existing emulator can sit on the far end of the pipe
//! unchanged. Only the fields this stack reads or writes are declared; prost
//! skips unknown fields on decode.

/// Envelope for one outgoing call.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Request {
    /// Target service, for example `datastore_v3`.
    #[prost(string, required, tag = "2")]
    pub service_name: String,
    /// Method within the service.
    #[prost(string, required, tag = "3")]
    pub method: String,
    /// Serialised request message for the method.
    #[prost(bytes = "vec", required, tag = "4")]
    pub request: Vec<u8>,
    /// Identifier of the inbound operation that issued the call.
    #[prost(string, optional, tag = "5")]
    pub request_id: Option<String>,
}

impl Request {
    /// Builds a request envelope. An empty `request_id` is left unset.
    #[must_use]
    pub fn new(service: &str, method: &str, payload: &[u8], request_id: &str) -> Self {
        Self {
            service_name: service.to_owned(),
            method: method.to_owned(),
            request: payload.to_vec(),
            request_id: (!request_id.is_empty()).then(|| request_id.to_owned()),
        }
    }
}

/// Envelope for one reply.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Response {
    /// Serialised response message on success.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub response: Option<Vec<u8>>,
    /// Pickled exception from Python emulators; carried but never interpreted.
    #[prost(bytes = "vec", optional, tag = "2")]
    pub exception: Option<Vec<u8>>,
    /// Failure reported by the service.
    #[prost(message, optional, tag = "3")]
    pub application_error: Option<ApplicationError>,
    /// Serialised exception from Java emulators; carried but never interpreted.
    #[prost(bytes = "vec", optional, tag = "4")]
    pub java_exception: Option<Vec<u8>>,
    /// Failure raised by the emulator's RPC layer.
    #[prost(message, optional, tag = "5")]
    pub rpc_error: Option<RpcError>,
}

impl Response {
    /// A successful reply carrying `payload`.
    #[must_use]
    pub fn success(payload: Vec<u8>) -> Self {
        Self {
            response: Some(payload),
            ..Self::default()
        }
    }

    /// A reply reporting an application failure.
    #[must_use]
    pub fn failure(code: i32, detail: impl Into<String>) -> Self {
        Self {
            application_error: Some(ApplicationError {
                code,
                detail: detail.into(),
            }),
            ..Self::default()
        }
    }
}

/// Failure reported by a service while handling a call.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ApplicationError {
    /// Service-specific error code.
    #[prost(int32, required, tag = "1")]
    pub code: i32,
    /// Human-readable detail.
    #[prost(string, required, tag = "2")]
    pub detail: String,
}

/// Failure raised before the service ran.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct RpcError {
    /// RPC error code.
    #[prost(int32, required, tag = "1")]
    pub code: i32,
    /// Optional detail.
    #[prost(string, optional, tag = "2")]
    pub detail: Option<String>,
}

/// Single-string message used by the namespace queries.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct StringProto {
    /// The carried value.
    #[prost(string, required, tag = "1")]
    pub value: String,
}

impl StringProto {
    /// Wraps a string value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}
