//! Process-level tests driving the transport against stock Unix tools.
//!
//! `cat` echoes every framed line, which makes it a convenient stand-in for
//! an emulator that replies with its input.

#![cfg(unix)]

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use super::*;
use crate::error::{FrameError, ProtocolError};

fn quick_options() -> TransportOptions {
    TransportOptions::default()
        .with_close_grace(Duration::from_millis(300))
        .with_stderr(StderrMode::Null)
}

#[fixture]
fn echo_transport() -> Transport {
    Transport::with_options(Endpoint::new("cat", Vec::<String>::new()), quick_options())
}

fn silent_transport() -> Transport {
    Transport::with_options(Endpoint::new("sleep", ["30"]), quick_options())
}

#[rstest]
fn start_is_idempotent(echo_transport: Transport) {
    echo_transport.start().expect("first start");
    let first = echo_transport.pid();
    echo_transport.start().expect("second start");

    assert!(first.is_some());
    assert_eq!(echo_transport.pid(), first);
    assert!(echo_transport.is_running());
}

#[rstest]
fn close_is_idempotent(echo_transport: Transport) {
    echo_transport.close();
    echo_transport.start().expect("start");
    echo_transport.close();
    echo_transport.close();

    assert!(!echo_transport.is_running());
    assert_eq!(echo_transport.pid(), None);
}

#[rstest]
fn round_trip_pairs_one_reply_with_one_request(echo_transport: Transport) {
    echo_transport.start().expect("start");

    let first = echo_transport.round_trip(b"hello").expect("first exchange");
    let second = echo_transport.round_trip(b"a\nb").expect("second exchange");

    assert_eq!(first, b"hello");
    assert_eq!(second, b"a\nb");
}

#[rstest]
fn calls_before_start_fail_with_not_started(echo_transport: Transport) {
    let error = echo_transport.round_trip(b"x").expect_err("no session");
    assert!(matches!(error, TransportError::NotStarted));
    assert!(matches!(
        echo_transport.reset(),
        Err(TransportError::NotStarted)
    ));
}

#[rstest]
fn restart_after_close_spawns_a_new_process(echo_transport: Transport) {
    echo_transport.start().expect("start");
    let first = echo_transport.pid();
    echo_transport.close();
    echo_transport.start().expect("restart");

    assert!(echo_transport.pid().is_some());
    assert_ne!(echo_transport.pid(), first);
    assert_eq!(echo_transport.round_trip(b"again").expect("call"), b"again");
}

#[test]
fn missing_executable_is_reported() {
    let transport = Transport::new(Endpoint::new(
        "/nonexistent/apibed-emulator-binary",
        Vec::<String>::new(),
    ));

    let error = transport.start().expect_err("binary does not exist");

    assert!(matches!(error, StartError::BinaryNotFound { .. }));
    assert!(!transport.is_running());
}

#[test]
fn close_kills_an_unresponsive_child_after_the_grace_period() {
    let transport = silent_transport();
    transport.start().expect("start");

    let started = Instant::now();
    transport.close();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(250), "closed too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "close overran: {elapsed:?}");
    assert_eq!(transport.pid(), None);
}

#[test]
fn malformed_reply_poisons_the_session() {
    let transport = Transport::with_options(
        Endpoint::new("sh", ["-c", "read line; echo '!!'; cat"]),
        quick_options(),
    );
    transport.start().expect("start");

    let first = transport.round_trip(b"x").expect_err("reply is not base64");
    let second = transport.round_trip(b"y").expect_err("session is poisoned");

    assert!(matches!(
        first,
        TransportError::Protocol(ProtocolError::Frame(FrameError::Encoding(_)))
    ));
    assert!(matches!(second, TransportError::Poisoned));

    transport.close();
    transport.start().expect("restart clears the poison");
    assert_eq!(transport.round_trip(b"z").expect("fresh session"), b"z");
}

#[test]
fn binary_stderr_does_not_break_the_session() {
    let script = r#"printf 'bad \377 byte\n' >&2; sleep 0.2; while read line; do printf 'more diag\n' >&2; echo "$line"; done"#;
    let transport = Transport::with_options(
        Endpoint::new("sh", ["-c", script]),
        quick_options().with_stderr(StderrMode::Drain),
    );
    transport.start().expect("start");
    thread::sleep(Duration::from_millis(400));

    assert_eq!(transport.round_trip(b"hello").expect("first exchange"), b"hello");
    assert_eq!(transport.round_trip(b"again").expect("second exchange"), b"again");
    transport.close();
}

#[test]
fn close_fails_queued_callers_and_truncates_the_in_flight_call() {
    let transport = Arc::new(silent_transport());
    transport.start().expect("start");

    let in_flight = {
        let transport = Arc::clone(&transport);
        thread::spawn(move || transport.round_trip(b"never answered"))
    };
    thread::sleep(Duration::from_millis(100));
    let queued = {
        let transport = Arc::clone(&transport);
        thread::spawn(move || transport.round_trip(b"waiting"))
    };
    thread::sleep(Duration::from_millis(100));

    transport.close();

    let in_flight_result = in_flight.join().expect("in-flight thread");
    let queued_result = queued.join().expect("queued thread");
    assert!(matches!(
        in_flight_result,
        Err(TransportError::Protocol(ProtocolError::Frame(
            FrameError::Truncated { .. }
        )))
    ));
    assert!(matches!(queued_result, Err(TransportError::Closed)));
}

#[rstest]
fn run_closes_after_the_body(echo_transport: Transport) {
    let pid = echo_transport
        .run(|transport| transport.pid())
        .expect("run");

    assert!(pid.is_some());
    assert_eq!(echo_transport.pid(), None);
}

#[rstest]
fn run_closes_when_the_body_panics(echo_transport: Transport) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        echo_transport.run(|_| panic!("body failed"))
    }));

    assert!(outcome.is_err());
    assert_eq!(echo_transport.pid(), None);
}

#[test]
fn options_follow_configuration() {
    let config = Config {
        close_grace_ms: 1_500,
        stderr: StderrMode::Inherit,
        app_id: String::from("other-app"),
        ..Config::default()
    };

    let transport = Transport::from_config(&config);

    assert_eq!(transport.options().close_grace(), Duration::from_millis(1_500));
    assert_eq!(transport.options().stderr(), StderrMode::Inherit);
    assert_eq!(transport.options().app_id(), "other-app");
    assert_eq!(transport.endpoint().command(), std::path::Path::new("python"));
}
