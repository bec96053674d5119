//! Service implementations and their request/response messages.

use apibed::wire::{Request, Response};
use prost::Message;

/// Application error code for malformed or unsupported calls.
pub const BAD_REQUEST: i32 = 1;

/// `datastore_v3.AllocateIds` request. Only the block size is honoured.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct AllocateIdsRequest {
    /// Number of ids to reserve.
    #[prost(int64, optional, tag = "2")]
    pub size: Option<i64>,
}

/// `datastore_v3.AllocateIds` response: an inclusive id range.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct AllocateIdsResponse {
    /// First id in the block.
    #[prost(int64, required, tag = "1")]
    pub start: i64,
    /// Last id in the block, inclusive.
    #[prost(int64, required, tag = "2")]
    pub end: i64,
}

/// Request for any service's `Fail` method, naming the application error to
/// report.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct FailRequest {
    /// Error code to report.
    #[prost(int32, required, tag = "1")]
    pub code: i32,
    /// Error detail to report.
    #[prost(string, required, tag = "2")]
    pub detail: String,
}

/// In-memory state cleared by `#reset#`.
#[derive(Debug)]
pub struct ServiceState {
    next_id: i64,
}

impl Default for ServiceState {
    fn default() -> Self {
        Self { next_id: 1 }
    }
}

impl ServiceState {
    /// Drops everything allocated so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Routes one request to its service and builds the reply.
    pub fn handle(&mut self, request: &Request) -> Response {
        match (request.service_name.as_str(), request.method.as_str()) {
            ("datastore_v3", "AllocateIds") => self.allocate_ids(&request.request),
            ("echo", "Echo") => Response::success(request.request.clone()),
            (_, "Fail") => fail(&request.request),
            (service, method) => {
                Response::failure(BAD_REQUEST, format!("unknown call {service}.{method}"))
            }
        }
    }

    fn allocate_ids(&mut self, payload: &[u8]) -> Response {
        let Ok(request) = AllocateIdsRequest::decode(payload) else {
            return Response::failure(BAD_REQUEST, "malformed AllocateIdsRequest");
        };
        let size = request.size.unwrap_or(1);
        if size < 1 {
            return Response::failure(BAD_REQUEST, "size must be positive");
        }
        let start = self.next_id;
        let Some(next) = start.checked_add(size) else {
            return Response::failure(BAD_REQUEST, "id space exhausted");
        };
        self.next_id = next;
        Response::success(
            AllocateIdsResponse {
                start,
                end: next - 1,
            }
            .encode_to_vec(),
        )
    }
}

fn fail(payload: &[u8]) -> Response {
    match FailRequest::decode(payload) {
        Ok(request) => Response::failure(request.code, request.detail),
        Err(_) => Response::failure(BAD_REQUEST, "malformed FailRequest"),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn request(service: &str, method: &str, payload: &[u8]) -> Request {
        Request::new(service, method, payload, "")
    }

    fn allocate(state: &mut ServiceState, size: i64) -> AllocateIdsResponse {
        let payload = AllocateIdsRequest { size: Some(size) }.encode_to_vec();
        let response = state.handle(&request("datastore_v3", "AllocateIds", &payload));
        AllocateIdsResponse::decode(response.response()).expect("allocation response")
    }

    #[test]
    fn allocations_are_contiguous_and_disjoint() {
        let mut state = ServiceState::default();

        let first = allocate(&mut state, 10);
        let second = allocate(&mut state, 10);

        assert_eq!((first.start, first.end), (1, 10));
        assert_eq!((second.start, second.end), (11, 20));
    }

    #[test]
    fn reset_restarts_the_id_counter() {
        let mut state = ServiceState::default();
        allocate(&mut state, 5);

        state.reset();

        assert_eq!(allocate(&mut state, 1).start, 1);
    }

    #[rstest]
    #[case::zero(0)]
    #[case::negative(-3)]
    fn non_positive_sizes_are_rejected(#[case] size: i64) {
        let mut state = ServiceState::default();
        let payload = AllocateIdsRequest { size: Some(size) }.encode_to_vec();

        let response = state.handle(&request("datastore_v3", "AllocateIds", &payload));

        let failure = response.application_error.expect("application error");
        assert_eq!(failure.code, BAD_REQUEST);
    }

    #[test]
    fn echo_returns_the_payload() {
        let mut state = ServiceState::default();
        let response = state.handle(&request("echo", "Echo", b"a\nb"));
        assert_eq!(response.response(), b"a\nb");
    }

    #[test]
    fn fail_reports_the_requested_error() {
        let mut state = ServiceState::default();
        let payload = FailRequest {
            code: 4,
            detail: String::from("bad arg"),
        }
        .encode_to_vec();

        let response = state.handle(&request("x", "Fail", &payload));

        let failure = response.application_error.expect("application error");
        assert_eq!((failure.code, failure.detail.as_str()), (4, "bad arg"));
    }

    #[test]
    fn unknown_calls_fail_with_bad_request() {
        let mut state = ServiceState::default();

        let response = state.handle(&request("memcache", "Get", b""));

        let failure = response.application_error.expect("application error");
        assert_eq!(failure.code, BAD_REQUEST);
        assert!(failure.detail.contains("memcache.Get"));
    }
}
