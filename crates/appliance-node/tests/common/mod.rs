//! Scripted appliances shared by the integration tests.
//!
//! Both fakes sit on the far end of a [`MockSerialPort`]: the driver under
//! test writes requests into the port, and `respond()` reads them back and
//! injects whatever a real appliance would have answered.
//!
//! ```text
//!   driver ──write──► MockSerialPort ──take_written──► fake device
//!   driver ◄──read─── MockSerialPort ◄────inject────── fake device
//! ```

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use appliance_core::protocol::kdk::command::{self, RESPONSE_BIT};
use appliance_core::protocol::kdk::parameter::{
    ids, ATTRIBUTE_METADATA, INITIAL_READ_IDS, POLL_IDS,
};
use appliance_core::protocol::kdk::{FrameReceiver, KdkFrame, ParameterId, Received};
use appliance_core::protocol::mel::encode_request;
use appliance_core::protocol::mel::frame::flags;
use appliance_core::protocol::mel::message::kind;
use appliance_node::infrastructure::serial::mock::MockSerialPort;

/// Tick cadence used by every test.
pub const STEP: Duration = Duration::from_millis(100);

pub const TABLE_ID: [u8; 3] = [0x01, 0x3A, 0x01];
pub const DEVICE_INFO: &str = "F-M15EXY+0012345";

/// An attribute parameter the fake declares, read once during the handshake.
pub const ATTRIBUTE_ID: ParameterId = ParameterId(0x8200);

const DATA_METADATA: u8 = 0xE2;

// ── KDK ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Parameter {
    metadata: u8,
    data: Vec<u8>,
}

/// A KDK fan/light fixture that answers every request it sees.
pub struct FakeKdkDevice {
    pub port: MockSerialPort,
    receiver: FrameReceiver,
    parameters: BTreeMap<ParameterId, Parameter>,
    /// Commands received, in order.
    pub requests: Vec<u16>,
    /// While `true`, requests are read but never answered.
    pub silent: bool,
    notification_counter: u8,
}

impl FakeKdkDevice {
    /// A fixture with the fan on at speed 3 and the main light on.
    pub fn new(port: MockSerialPort) -> Self {
        let mut parameters = BTreeMap::new();
        for id in POLL_IDS.iter().chain(INITIAL_READ_IDS.iter()) {
            parameters.insert(
                *id,
                Parameter {
                    metadata: DATA_METADATA,
                    data: vec![0x31],
                },
            );
        }
        parameters.insert(
            ATTRIBUTE_ID,
            Parameter {
                metadata: ATTRIBUTE_METADATA,
                data: vec![0x00, 0x00, 0x01, 0x00],
            },
        );

        let mut device = Self {
            port,
            receiver: FrameReceiver::new(),
            parameters,
            requests: Vec::new(),
            silent: false,
            notification_counter: 0x80,
        };
        device.set(ids::FAN_STATE, 0x30);
        device.set(ids::FAN_SPEED, 0x33);
        device.set(ids::FAN_DIRECTION, 0x41);
        device.set(ids::LIGHT_STATE, 0x30);
        device.set(ids::LIGHT_MODE, 0x42);
        device.set(ids::LIGHT_BRIGHTNESS, 80);
        device.set(ids::LIGHT_COLOR, 100);
        device.set(ids::NIGHT_LIGHT_BRIGHTNESS, 50);
        device
    }

    /// Changes a register locally, as the wall switch would.
    pub fn set(&mut self, id: ParameterId, value: u8) {
        if let Some(parameter) = self.parameters.get_mut(&id) {
            parameter.data = vec![value];
        }
    }

    pub fn get(&self, id: ParameterId) -> Option<u8> {
        self.parameters.get(&id).and_then(|p| p.data.first().copied())
    }

    /// Emits the power-up SYNC marker.
    pub fn power_up(&self) {
        self.port.inject(&[0x66, 0x00, 0x00, 0x06, 0x00, 0x00]);
    }

    /// Sends a 0x0A10 change notification with a raw payload.
    pub fn notify_raw(&mut self, payload: Vec<u8>) {
        self.notification_counter = self.notification_counter.wrapping_add(1);
        let frame = KdkFrame::new(self.notification_counter, command::CHANGE_NOTIFICATION, payload);
        self.port.inject(&frame.encode().expect("encode notification"));
    }

    /// Sends a 0x0A10 change notification carrying the current value of
    /// `changed`.
    pub fn notify(&mut self, changed: &[ParameterId]) {
        let payload = self.value_report(changed);
        self.notify_raw(payload);
    }

    /// Reads everything the driver wrote and answers each request.
    pub fn respond(&mut self, now: Instant) {
        for byte in self.port.take_written() {
            match self.receiver.push(byte, now) {
                Ok(Received::Frame(frame)) if !frame.is_response() => self.handle(&frame),
                _ => {}
            }
        }
    }

    fn handle(&mut self, request: &KdkFrame) {
        self.requests.push(request.command);
        if self.silent {
            return;
        }

        let payload = match request.command {
            command::SYNC => return,
            command::DEVICE_INFO => {
                let mut p = vec![0u8; 6];
                p.push(DEVICE_INFO.len() as u8);
                p.extend_from_slice(DEVICE_INFO.as_bytes());
                p
            }
            command::TABLE_ID => {
                let mut p = vec![0x00, 0x00];
                p.extend_from_slice(&TABLE_ID);
                p
            }
            command::PARAMETER_LIST => self.descriptor_list(),
            command::READ_ATTRIBUTES => {
                let requested = requested_ids(&request.payload[3..]);
                self.value_report(&requested)
            }
            command::READ_PARAMETERS => {
                let requested = requested_ids(&request.payload[4..]);
                self.value_report(&requested)
            }
            command::WRITE_PARAMETERS => {
                self.apply_write(&request.payload[4..]);
                vec![0x00]
            }
            _ => vec![0x00],
        };

        let reply = KdkFrame::new(request.counter, request.command | RESPONSE_BIT, payload);
        self.port.inject(&reply.encode().expect("encode reply"));
    }

    fn descriptor_list(&self) -> Vec<u8> {
        let mut p = vec![0u8; 8];
        p.extend_from_slice(&(self.parameters.len() as u16).to_be_bytes());
        for (id, parameter) in &self.parameters {
            p.extend_from_slice(&id.0.to_le_bytes());
            p.push(parameter.metadata);
            p.push(parameter.data.len() as u8);
        }
        p
    }

    /// Status byte, table id, count and `id, length, data` per known id.
    pub fn value_report(&self, requested: &[ParameterId]) -> Vec<u8> {
        let known: Vec<_> = requested
            .iter()
            .filter_map(|id| self.parameters.get(id).map(|p| (*id, &p.data)))
            .collect();
        let mut p = vec![0x00];
        p.extend_from_slice(&TABLE_ID);
        p.push(known.len() as u8);
        for (id, data) in known {
            p.extend_from_slice(&id.0.to_le_bytes());
            p.push(data.len() as u8);
            p.extend_from_slice(data);
        }
        p
    }

    fn apply_write(&mut self, body: &[u8]) {
        let count = body[0] as usize;
        let mut index = 1;
        for _ in 0..count {
            let id = ParameterId(u16::from_le_bytes([body[index], body[index + 1]]));
            let len = body[index + 2] as usize;
            let data = body[index + 3..index + 3 + len].to_vec();
            if let Some(parameter) = self.parameters.get_mut(&id) {
                parameter.data = data;
            }
            index += 3 + len;
        }
    }
}

/// Ids of an id list body: count, then `id (LE), 0x00` each.
fn requested_ids(body: &[u8]) -> Vec<ParameterId> {
    let count = body[0] as usize;
    body[1..1 + count * 3]
        .chunks_exact(3)
        .map(|entry| ParameterId(u16::from_le_bytes([entry[0], entry[1]])))
        .collect()
}

// ── MEL-AC ────────────────────────────────────────────────────────────────────

/// The parameters a fake MEL unit reports.
#[derive(Debug, Clone, Copy)]
pub struct UnitState {
    pub power: u8,
    pub mode: u8,
    /// Target temperature as `°C - 10`.
    pub setpoint: u8,
    pub fan: u8,
    pub vane_vertical: u8,
    /// Room temperature in half degrees above 0 °C, high-bit encoding.
    pub room_half_degrees: u8,
    pub operating: bool,
}

impl Default for UnitState {
    /// Cooling to 22 °C at medium fan in a 25 °C room.
    fn default() -> Self {
        Self {
            power: 1,
            mode: 3,
            setpoint: 12,
            fan: 3,
            vane_vertical: 7,
            room_half_degrees: 50,
            operating: true,
        }
    }
}

/// A MEL-AC unit that answers the driver's last request.
pub struct FakeMelUnit {
    pub port: MockSerialPort,
    pub state: UnitState,
    /// Flags of every request received, without `OUT`.
    pub requests: Vec<u8>,
    /// Payloads of the SET requests received.
    pub sets: Vec<Vec<u8>>,
}

impl FakeMelUnit {
    pub fn new(port: MockSerialPort) -> Self {
        Self {
            port,
            state: UnitState::default(),
            requests: Vec::new(),
            sets: Vec::new(),
        }
    }

    fn reply(request_flags: u8, payload: &[u8]) -> Vec<u8> {
        encode_request(flags::IN | request_flags, payload).expect("encode reply")
    }

    fn params_payload(&self) -> Vec<u8> {
        let mut p = vec![0u8; 16];
        p[0] = kind::GET_PARAMS;
        p[3] = self.state.power;
        p[4] = self.state.mode;
        p[5] = self.state.setpoint;
        p[6] = self.state.fan;
        p[7] = self.state.vane_vertical;
        p
    }

    fn temp_payload(&self) -> Vec<u8> {
        let mut p = vec![0u8; 16];
        p[0] = kind::GET_TEMP;
        p[6] = 0x80 | self.state.room_half_degrees;
        p
    }

    fn status_payload(&self) -> Vec<u8> {
        let mut p = vec![0u8; 16];
        p[0] = kind::GET_STATUS;
        p[3] = 40;
        p[4] = u8::from(self.state.operating);
        p
    }

    pub fn respond(&mut self) {
        let sent = self.port.take_written();
        if sent.len() < 6 {
            return;
        }
        let request_flags = sent[1] & !flags::OUT;
        self.requests.push(request_flags);

        let reply = if request_flags == flags::CONNECT {
            Self::reply(flags::CONNECT, &[0x00])
        } else if request_flags == flags::SET {
            self.sets.push(sent[5..sent.len() - 1].to_vec());
            Self::reply(flags::SET, &[0x01, 0x00, 0x00])
        } else {
            match sent[5] {
                kind::GET_PARAMS => Self::reply(flags::GET, &self.params_payload()),
                kind::GET_TEMP => Self::reply(flags::GET, &self.temp_payload()),
                _ => Self::reply(flags::GET, &self.status_payload()),
            }
        };
        self.port.inject(&reply);
    }
}
