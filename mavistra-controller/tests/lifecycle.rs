mod common;

use common::{Event, FakeTransport, ManualClock, TestCell, serial, setup, started};
use mavistra_controller::{
    ControllerConfig, Duration, Error, LinkStatus, TransportError, config::DEFAULT_COMMAND_TIMEOUT,
};

#[test]
fn begin_opens_transport_and_advertises() {
    static CELL: TestCell = TestCell::new();
    let (controller, fake, _clock) = started(&CELL);

    assert!(controller.is_initialized());
    assert!(!controller.is_connected());
    assert_eq!(fake.events(), [Event::Open, Event::Advertise]);
    assert_eq!(
        fake.with(|state| state.advertised_name.clone()).as_deref(),
        Some("MavistraController")
    );
}

#[test]
fn begin_twice_has_no_side_effects() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, _clock) = started(&CELL);

    assert_eq!(controller.begin(), Ok(()));
    assert_eq!(fake.events(), [Event::Open, Event::Advertise]);
}

#[test]
fn configured_name_is_advertised() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, _clock) = setup(&CELL, ControllerConfig::new("Left Pad"));

    controller.begin().unwrap();
    assert_eq!(controller.advertising_name(), "Left Pad");
    assert_eq!(
        fake.with(|state| state.advertised_name.clone()).as_deref(),
        Some("Left Pad")
    );
}

#[test]
fn failed_open_releases_transport_and_allows_retry() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, _clock) = setup(&CELL, ControllerConfig::default());
    fake.with(|state| state.fail_open = Some(TransportError::Characteristic));

    assert_eq!(
        controller.begin(),
        Err(Error::Transport(TransportError::Characteristic))
    );
    assert!(!controller.is_initialized());
    assert_eq!(fake.events(), [Event::Open, Event::Close]);

    fake.with(|state| state.fail_open = None);
    assert_eq!(controller.begin(), Ok(()));
    assert!(controller.is_initialized());
    assert!(fake.is_open());
}

#[test]
fn failed_advertising_releases_transport() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, _clock) = setup(&CELL, ControllerConfig::default());
    fake.with(|state| state.fail_advertising = true);

    assert_eq!(
        controller.begin(),
        Err(Error::Transport(TransportError::Advertising))
    );
    assert!(!controller.is_initialized());
    assert!(!fake.is_open());
    assert_eq!(fake.events(), [Event::Open, Event::Advertise, Event::Close]);
}

#[test]
fn second_controller_is_rejected() {
    static CELL: TestCell = TestCell::new();
    static OTHER: TestCell = TestCell::new();
    let (mut controller, _fake, _clock) = setup(&CELL, ControllerConfig::default());

    let (transport, same_cell) = FakeTransport::new();
    let second = CELL.init(ControllerConfig::default(), transport, ManualClock::default());
    assert!(matches!(second, Err(Error::AlreadyConstructed)));

    let (transport, other_cell) = FakeTransport::new();
    let second = OTHER.init(ControllerConfig::default(), transport, ManualClock::default());
    assert!(matches!(second, Err(Error::AlreadyConstructed)));

    assert!(same_cell.events().is_empty());
    assert!(other_cell.events().is_empty());
    assert_eq!(controller.begin(), Ok(()));
}

#[test]
fn retired_controller_lets_another_cell_construct() {
    static FIRST: TestCell = TestCell::new();
    static SECOND: TestCell = TestCell::new();
    let _serial = serial();

    let (transport, first) = FakeTransport::new();
    let controller = FIRST
        .init(ControllerConfig::default(), transport, ManualClock::default())
        .unwrap();
    controller.begin().unwrap();
    first.set_peer_count(1);
    first.write(b"L_UP\n");
    controller.retire();

    assert_eq!(first.events(), [Event::Open, Event::Advertise, Event::Close]);
    assert!(!first.is_open());

    // A spent cell never hands out a controller again
    let (transport, reused) = FakeTransport::new();
    let again = FIRST.init(ControllerConfig::default(), transport, ManualClock::default());
    assert!(matches!(again, Err(Error::AlreadyConstructed)));
    assert!(reused.events().is_empty());

    let (transport, _second) = FakeTransport::new();
    let controller = SECOND
        .init(ControllerConfig::default(), transport, ManualClock::default())
        .unwrap();
    assert!(!controller.is_active("L_UP"));
    controller.retire();
}

#[test]
fn command_timeout_is_fixed_after_begin() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, _fake, _clock) = setup(&CELL, ControllerConfig::default());
    assert_eq!(controller.command_timeout(), DEFAULT_COMMAND_TIMEOUT);

    assert_eq!(controller.set_command_timeout(Duration::millis(300)), Ok(()));
    controller.begin().unwrap();

    assert_eq!(
        controller.set_command_timeout(Duration::millis(50)),
        Err(Error::AlreadyStarted)
    );
    assert_eq!(controller.command_timeout(), Duration::millis(300));
}

#[test]
fn connect_is_notified_once() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, _clock) = started(&CELL);

    fake.set_peer_count(1);
    controller.poll();
    controller.poll();

    assert!(controller.is_connected());
    assert_eq!(fake.notifications(), [LinkStatus::Connected]);
}

#[test]
fn disconnect_releases_commands_then_notifies_then_readvertises() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, clock) = started(&CELL);

    fake.set_peer_count(1);
    controller.poll();
    fake.write(b"L_UP\n");
    fake.write(b"BTN_1:1\n");
    clock.advance(10);
    controller.poll();
    assert!(controller.is_active("L_UP"));
    assert!(controller.is_active("BTN_1"));

    // Frames written just before the link drops are still released
    fake.write(b"L_UP\n");
    fake.set_peer_count(0);
    controller.poll();

    assert!(!controller.is_connected());
    assert!(!controller.is_active("L_UP"));
    assert!(!controller.is_active("BTN_1"));
    assert_eq!(
        fake.events(),
        [
            Event::Open,
            Event::Advertise,
            Event::Notify(LinkStatus::Connected),
            Event::Notify(LinkStatus::Disconnected),
            Event::Advertise,
        ]
    );
}

#[test]
fn one_transition_per_sampled_edge() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, _clock) = started(&CELL);

    for peer_count in [1, 0, 1] {
        fake.set_peer_count(peer_count);
        controller.poll();
        controller.poll();
    }

    assert_eq!(
        fake.notifications(),
        [
            LinkStatus::Connected,
            LinkStatus::Disconnected,
            LinkStatus::Connected
        ]
    );
    assert_eq!(fake.count(Event::Advertise), 2);
}

#[test]
fn unsampled_blip_produces_no_transition() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, _clock) = started(&CELL);

    fake.set_peer_count(1);
    controller.poll();

    // Drops and comes back between two polls
    fake.set_peer_count(0);
    fake.set_peer_count(1);
    controller.poll();

    assert_eq!(fake.notifications(), [LinkStatus::Connected]);
}

#[test]
fn advertising_restart_failure_is_not_fatal() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, _clock) = started(&CELL);

    fake.set_peer_count(1);
    controller.poll();
    fake.with(|state| state.fail_advertising = true);
    fake.set_peer_count(0);
    controller.poll();

    assert!(controller.is_initialized());
    assert!(!controller.is_connected());
    assert_eq!(
        fake.notifications(),
        [LinkStatus::Connected, LinkStatus::Disconnected]
    );
}

#[test]
fn poll_before_begin_does_nothing() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, _clock) = setup(&CELL, ControllerConfig::default());

    fake.set_peer_count(1);
    controller.poll();

    assert!(!controller.is_connected());
    assert!(fake.events().is_empty());
}

#[test]
fn reset_closes_transport_and_forgets_commands() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, clock) = started(&CELL);

    fake.set_peer_count(1);
    controller.poll();
    clock.set(20);
    fake.write(b"R_CENTER\n");
    assert_eq!(controller.last_activity().map(|at| at.ticks()), Some(20));

    controller.reset();

    assert!(!controller.is_initialized());
    assert!(!controller.is_connected());
    assert!(!controller.is_active("R_CENTER"));
    assert_eq!(controller.last_activity(), None);
    assert!(!fake.is_open());
    assert_eq!(fake.count(Event::Close), 1);

    // Reconfigurable again before the next begin()
    assert_eq!(controller.set_command_timeout(Duration::millis(200)), Ok(()));
    controller.begin().unwrap();
    assert_eq!(fake.count(Event::Open), 2);
    assert!(fake.is_open());
}

#[test]
fn reset_before_begin_leaves_transport_alone() {
    static CELL: TestCell = TestCell::new();
    let (mut controller, fake, _clock) = setup(&CELL, ControllerConfig::default());

    controller.reset();
    assert!(fake.events().is_empty());
}
