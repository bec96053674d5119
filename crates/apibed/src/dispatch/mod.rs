//! Turns a (service, method, payload) call into one framed exchange.

use prost::Message;
use tracing::debug;

use crate::error::{ApplicationError, CallError, ProtocolError, TransportError};
use crate::wire::{Request, Response};

/// Log target for call dispatch.
pub(crate) const DISPATCH_TARGET: &str = "apibed::dispatch";

/// Sends one encoded message and returns the one reply paired with it.
///
/// Implementations must keep the write and the read together: no other
/// exchange may run between them.
pub trait RoundTrip {
    /// Writes `message` as one frame and reads one frame back.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the exchange fails.
    fn round_trip(&self, message: &[u8]) -> Result<Vec<u8>, TransportError>;
}

/// Anything that can answer an RPC; the seam used by [`crate::Context`].
pub trait Backend {
    /// Issues one RPC and returns the response payload.
    ///
    /// An empty `request_id` means the call carries none.
    ///
    /// # Errors
    ///
    /// Returns a [`CallError`] when the exchange fails or the service
    /// reports a failure.
    fn call(
        &self,
        service: &str,
        method: &str,
        payload: &[u8],
        request_id: &str,
    ) -> Result<Vec<u8>, CallError>;
}

/// Wraps `payload` in a request, exchanges it, and unwraps the response.
///
/// # Errors
///
/// Returns [`CallError::Application`] carrying `service` when the emulator
/// reports an application error, [`CallError::Rpc`] for an RPC-layer
/// rejection, and [`CallError::Transport`] when the exchange or the response
/// decode fails.
pub fn call<T: RoundTrip + ?Sized>(
    transport: &T,
    service: &str,
    method: &str,
    payload: &[u8],
    request_id: &str,
) -> Result<Vec<u8>, CallError> {
    let request = Request::new(service, method, payload, request_id);
    debug!(
        target: DISPATCH_TARGET,
        service,
        method,
        request_id,
        bytes = payload.len(),
        "dispatching call"
    );

    let reply = transport.round_trip(&request.encode_to_vec())?;
    let response = Response::decode(reply.as_slice()).map_err(ProtocolError::Decode)?;
    into_payload(service, method, response)
}

fn into_payload(service: &str, method: &str, response: Response) -> Result<Vec<u8>, CallError> {
    if let Some(failure) = response.application_error {
        debug!(
            target: DISPATCH_TARGET,
            service,
            method,
            code = failure.code,
            detail = %failure.detail,
            "service reported an application error"
        );
        return Err(ApplicationError::new(service, failure.code, failure.detail).into());
    }
    if let Some(rejection) = response.rpc_error {
        return Err(CallError::Rpc {
            service: service.to_owned(),
            code: rejection.code,
            detail: rejection.detail.unwrap_or_default(),
        });
    }
    Ok(response.response.unwrap_or_default())
}
