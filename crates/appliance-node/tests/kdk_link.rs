//! Integration tests for a KDK connection talking to a scripted fixture.
//!
//! # Purpose
//!
//! These tests drive a `KdkConnectionManager` through its public API the
//! same way the node does: one `tick(now)` per update interval, with the
//! fake fixture answering everything written in between.  They verify:
//!
//! - The happy path: power-up SYNC, the full handshake and the first poll.
//! - Failure paths: a fixture that stops answering, and a malformed
//!   change notification.
//! - Registration rules: clients are published in registration order and
//!   nobody can register once the link has started.

mod common;

use std::time::Instant;

use appliance_core::domain::fan::{FanDirection, FanState};
use appliance_core::protocol::kdk::command;
use appliance_core::protocol::kdk::parameter::ids;
use appliance_core::{ConnectionId, EntityId};
use appliance_node::application::capabilities::Pollable;
use appliance_node::application::entity::{EntityState, StateEvent};
use appliance_node::application::kdk::connection::{ConnectionSettings, KdkConnectionManager};
use appliance_node::application::kdk::fan::{FanSettings, KdkFan};
use appliance_node::application::kdk::fsm::LinkState;
use appliance_node::application::manage_clients::RegistrationError;
use appliance_node::infrastructure::serial::mock::MockSerialPort;
use common::{FakeKdkDevice, TABLE_ID, STEP};

/// Ticks the manager `ticks` times, letting the fixture answer after each.
struct Link {
    manager: KdkConnectionManager,
    device: FakeKdkDevice,
    t0: Instant,
    ticks: u32,
}

impl Link {
    fn with_fan() -> Self {
        let port = MockSerialPort::new();
        let mut manager = KdkConnectionManager::new(
            ConnectionId::new("ceiling"),
            ConnectionSettings::default(),
            Box::new(port.clone()),
        );
        manager
            .register_client(Box::new(fan("fan")))
            .expect("registration before start");

        let t0 = Instant::now();
        manager.setup(t0);
        Self {
            manager,
            device: FakeKdkDevice::new(port),
            t0,
            ticks: 0,
        }
    }

    fn run(&mut self, ticks: u32) -> Vec<StateEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            let now = self.t0 + STEP * self.ticks;
            events.extend(self.manager.tick(now).events);
            self.device.respond(now);
            self.ticks += 1;
        }
        events
    }
}

fn fan(id: &str) -> KdkFan {
    KdkFan::new(FanSettings {
        id: EntityId::new(id),
        name: id.to_string(),
    })
}

fn fan_event(id: &str, on: bool, speed: u8) -> StateEvent {
    StateEvent {
        entity: EntityId::new(id),
        state: EntityState::Fan(FanState {
            on,
            speed,
            direction: FanDirection::Forward,
        }),
    }
}

// ── Handshake ─────────────────────────────────────────────────────────────────

#[test]
fn test_power_up_handshake_reaches_idle_and_publishes_fan_state() {
    // Arrange
    let mut link = Link::with_fan();
    link.device.power_up();

    // Act
    let events = link.run(40);

    // Assert: the handshake ran in the documented order.
    assert_eq!(
        &link.device.requests[..15],
        &[
            command::SYNC,
            command::HANDSHAKE_0C00,
            command::HANDSHAKE_1000,
            command::DEVICE_INFO,
            command::HANDSHAKE_1200,
            command::HANDSHAKE_4100,
            command::HANDSHAKE_4C01,
            command::TABLE_ID,
            command::PARAMETER_LIST,
            command::READ_ATTRIBUTES,
            command::HANDSHAKE_1800,
            command::MODULE_STATUS,
            command::MODULE_STATUS,
            command::READ_PARAMETERS,
            command::READ_PARAMETERS,
        ]
    );
    assert_eq!(link.manager.state(), LinkState::Idle);
    assert!(link.manager.is_ready());

    // The device and its table were learned along the way.
    assert_eq!(link.manager.device_info().model, "F-M15EXY");
    assert_eq!(link.manager.device_info().serial, "0012345");
    assert_eq!(link.manager.table().id().to_le_bytes(), TABLE_ID);
    assert_eq!(link.manager.table().len(), 28);

    // One state event, published after the first poll.
    assert_eq!(events, vec![fan_event("fan", true, 3)]);
}

#[test]
fn test_idle_link_does_not_repoll_before_poll_interval() {
    let mut link = Link::with_fan();
    link.device.power_up();
    link.run(40);
    let reads_before = link.device.requests.len();

    // Five seconds of idling, well inside the 15 s poll interval.
    let events = link.run(50);

    assert!(events.is_empty());
    assert_eq!(link.device.requests.len(), reads_before);
}

// ── Failure paths ─────────────────────────────────────────────────────────────

#[test]
fn test_silent_device_publishes_nothing_until_it_answers_again() {
    // Arrange
    let mut link = Link::with_fan();
    link.device.silent = true;
    link.device.power_up();

    // Act: twenty seconds without a single answer.
    let silent_events = link.run(200);

    // Assert
    assert!(silent_events.is_empty());
    assert!(!link.manager.is_ready());
    let syncs = link
        .device
        .requests
        .iter()
        .filter(|&&c| c == command::SYNC)
        .count();
    assert!(syncs >= 2, "the link should have resynchronised, saw {syncs} SYNC(s)");

    // Once the device answers again the handshake completes.
    link.device.silent = false;
    let events = link.run(100);
    assert!(link.manager.is_ready());
    assert_eq!(events, vec![fan_event("fan", true, 3)]);
}

#[test]
fn test_malformed_change_notification_is_not_applied() {
    // Arrange
    let mut link = Link::with_fan();
    link.device.power_up();
    link.run(40);

    // A notification claiming speed 5 whose second entry is cut short.
    let mut payload = vec![0x00];
    payload.extend_from_slice(&TABLE_ID);
    payload.push(2);
    payload.extend_from_slice(&ids::FAN_SPEED.0.to_le_bytes());
    payload.extend_from_slice(&[0x01, 0x35]);
    payload.extend_from_slice(&ids::FAN_DIRECTION.0.to_le_bytes());
    payload.push(0x01);

    // Act
    link.device.notify_raw(payload);
    let events = link.run(10);

    // Assert
    assert!(events.is_empty());
    assert_eq!(link.manager.get_parameter_data(ids::FAN_SPEED), &[0x33]);
}

#[test]
fn test_change_notification_triggers_poll_and_publishes() {
    let mut link = Link::with_fan();
    link.device.power_up();
    link.run(40);

    link.device.set(ids::FAN_SPEED, 0x35);
    link.device.notify(&[ids::FAN_SPEED]);
    let events = link.run(10);

    assert_eq!(events, vec![fan_event("fan", true, 5)]);
}

// ── Registration ──────────────────────────────────────────────────────────────

#[test]
fn test_clients_are_published_in_registration_order() {
    // Arrange: "b" registers before "a".
    let port = MockSerialPort::new();
    let mut manager = KdkConnectionManager::new(
        ConnectionId::new("ceiling"),
        ConnectionSettings::default(),
        Box::new(port.clone()),
    );
    manager.register_client(Box::new(fan("b"))).expect("b");
    manager.register_client(Box::new(fan("a"))).expect("a");
    let mut device = FakeKdkDevice::new(port);
    let t0 = Instant::now();
    manager.setup(t0);
    device.power_up();

    // Act
    let mut events = Vec::new();
    for i in 0..40 {
        let now = t0 + STEP * i;
        events.extend(manager.tick(now).events);
        device.respond(now);
    }

    // Assert
    let order: Vec<_> = events.iter().map(|e| e.entity.to_string()).collect();
    assert_eq!(order, vec!["b", "a"]);
}

#[test]
fn test_registration_after_start_is_rejected() {
    let mut link = Link::with_fan();

    let result = link.manager.register_client(Box::new(fan("late")));

    assert!(
        matches!(result, Err(RegistrationError::AlreadyStarted { .. })),
        "got {result:?}"
    );
    assert_eq!(link.manager.clients().len(), 1);
}

#[test]
fn test_duplicate_client_is_rejected() {
    let mut manager = KdkConnectionManager::new(
        ConnectionId::new("ceiling"),
        ConnectionSettings::default(),
        Box::new(MockSerialPort::new()),
    );
    manager.register_client(Box::new(fan("fan"))).expect("first");

    let result = manager.register_client(Box::new(fan("fan")));

    assert!(matches!(
        result,
        Err(RegistrationError::DuplicateIdentity { .. })
    ));
}
