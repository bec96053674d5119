//! Shared helpers for driving the emulator binary through `apibed`.

use std::time::Duration;

use apibed::{CallError, Endpoint, Transport, TransportOptions};
use apibed_emulator::{AllocateIdsRequest, AllocateIdsResponse, FailRequest};
use prost::Message;

/// Grace period used by the tests; short so timeouts stay cheap.
pub const TEST_GRACE: Duration = Duration::from_millis(500);

/// Transport launching the emulator binary with `args`.
pub fn emulator(args: &[&str]) -> Transport {
    Transport::with_options(
        Endpoint::new(env!("CARGO_BIN_EXE_apibed-emulator"), args.iter().copied()),
        TransportOptions::default().with_close_grace(TEST_GRACE),
    )
}

/// Allocates `size` datastore ids and returns the inclusive range.
pub fn allocate(transport: &Transport, size: i64) -> Result<(i64, i64), CallError> {
    let payload = AllocateIdsRequest { size: Some(size) }.encode_to_vec();
    let reply = transport.call("datastore_v3", "AllocateIds", &payload, "")?;
    let block = AllocateIdsResponse::decode(reply.as_slice())
        .map_err(|error| CallError::from(apibed::ProtocolError::Decode(error)))?;
    Ok((block.start, block.end))
}

/// Asks `service` to fail with the given code and detail.
pub fn fail(transport: &Transport, service: &str, code: i32, detail: &str) -> CallError {
    let payload = FailRequest {
        code,
        detail: detail.to_owned(),
    }
    .encode_to_vec();
    match transport.call(service, "Fail", &payload, "") {
        Ok(reply) => panic!("Fail returned a payload: {reply:?}"),
        Err(error) => error,
    }
}
