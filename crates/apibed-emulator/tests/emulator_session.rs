//! Behaviour scenarios for an emulator session driven through `apibed`.

mod support;

use apibed::{CallError, Transport};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use support::{allocate, emulator, fail};

#[derive(Default)]
struct World {
    transport: Option<Transport>,
    blocks: Vec<(i64, i64)>,
    after_reset: Option<(i64, i64)>,
    failure: Option<CallError>,
}

impl World {
    fn transport(&self) -> &Transport {
        self.transport
            .as_ref()
            .expect("a running emulator should have been started")
    }

    fn allocate_block(&mut self, count: i64) {
        let block = allocate(self.transport(), count).expect("allocation");
        self.blocks.push(block);
    }
}

#[fixture]
fn world() -> World {
    World::default()
}

#[given("a running emulator")]
fn given_running(world: &mut World) {
    let transport = emulator(&[]);
    transport.start().expect("start emulator");
    world.transport = Some(transport);
}

#[when("a first block of {count} ids is allocated")]
fn when_first_allocated(world: &mut World, count: i64) {
    world.allocate_block(count);
}

#[when("a second block of {count} ids is allocated")]
fn when_second_allocated(world: &mut World, count: i64) {
    world.allocate_block(count);
}

#[when("the emulator is reset")]
fn when_reset(world: &mut World) {
    world.transport().reset().expect("reset");
}

#[when("a block of {count} ids is allocated after the reset")]
fn when_allocated_after_reset(world: &mut World, count: i64) {
    world.after_reset = Some(allocate(world.transport(), count).expect("allocation"));
}

#[when("service \"{service}\" is asked to fail with code {code} and detail \"{detail}\"")]
fn when_fail(world: &mut World, service: String, code: i32, detail: String) {
    world.failure = Some(fail(world.transport(), &service, code, &detail));
}

#[when("the emulator is closed twice")]
fn when_closed_twice(world: &mut World) {
    world.transport().close();
    world.transport().close();
}

#[then("the two blocks before the reset do not overlap")]
fn then_disjoint(world: &mut World) {
    match world.blocks.as_slice() {
        [first, second] => assert!(second.0 > first.1, "{first:?} overlaps {second:?}"),
        other => panic!("expected two blocks, got {other:?}"),
    }
}

#[then("the block after the reset starts no later than the first block")]
fn then_restarted(world: &mut World) {
    let first = world.blocks.first().expect("first block");
    let after = world.after_reset.expect("block after reset");
    assert!(after.0 <= first.0, "counter survived reset: {after:?}");
}

#[then("the call fails with application error {code} \"{detail}\" from \"{service}\"")]
fn then_application_error(world: &mut World, code: i32, detail: String, service: String) {
    let failure = world.failure.as_ref().expect("a failed call");
    let application = failure.as_application().expect("application error");
    assert_eq!(application.code(), code);
    assert_eq!(application.detail(), detail);
    assert_eq!(application.service(), service);
}

#[then("the transport reports that it is stopped")]
fn then_stopped(world: &mut World) {
    assert!(!world.transport().is_running());
    assert_eq!(world.transport().pid(), None);
}

#[scenario(
    path = "tests/features/emulator_session.feature",
    name = "Reset isolates allocated ids"
)]
fn reset_isolates_allocated_ids(world: World) {
    drop(world);
}

#[scenario(
    path = "tests/features/emulator_session.feature",
    name = "Application errors name the calling service"
)]
fn application_errors_name_the_calling_service(world: World) {
    drop(world);
}

#[scenario(
    path = "tests/features/emulator_session.feature",
    name = "Closing twice is harmless"
)]
fn closing_twice_is_harmless(world: World) {
    drop(world);
}
