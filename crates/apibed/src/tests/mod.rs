//! Crate-level tests spanning the context, dispatcher, and wire envelopes.


use std::cell::RefCell;

use prost::Message;

use crate::dispatch::{self, RoundTrip};
use crate::error::TransportError;
use crate::wire::{Request, Response, StringProto};
use crate::{CallError, Context, RequestHeaders};

/// In-memory emulator: echoes payloads, fails `fail.*` calls, and records
/// every request it sees.
#[derive(Default)]
pub(crate) struct ScriptedEmulator {
    seen: RefCell<Vec<Request>>,
}

impl ScriptedEmulator {
    pub(crate) fn requests(&self) -> Vec<Request> {
        self.seen.borrow().clone()
    }
}

impl RoundTrip for ScriptedEmulator {
    fn round_trip(&self, message: &[u8]) -> Result<Vec<u8>, TransportError> {
        let request = Request::decode(message).expect("scripted emulator got a request");
        let response = if request.service_name == "fail" {
            Response::failure(4, "bad arg")
        } else {
            Response::success(request.request.clone())
        };
        self.seen.borrow_mut().push(request);
        Ok(response.encode_to_vec())
    }
}

impl crate::Backend for ScriptedEmulator {
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

#[test]
fn typed_call_round_trips_through_the_dispatcher() {
    let emulator = ScriptedEmulator::default();
    let context = Context::new(
        &emulator,
        RequestHeaders::new().with(crate::REQUEST_ID_HEADER, "op-1"),
    );

    let reply: StringProto = context
        .call("echo", "Echo", &StringProto::new("hello"))
        .expect("echo call");

    assert_eq!(reply.value, "hello");
    let requests = emulator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests.first().map(Request::request_id), Some("op-1"));
}

#[test]
fn application_errors_reach_the_context_caller_intact() {
    let emulator = ScriptedEmulator::default();
    let context = Context::new(&emulator, RequestHeaders::new());

    let error = context
        .call_raw("fail", "Fail", b"")
        .expect_err("fail service always fails");

    let application = error.as_application().expect("application error");
    assert_eq!(application.to_string(), "API error 4 (fail): bad arg");
}
