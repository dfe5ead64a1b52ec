//! MEL-AC message payloads: request builders, response parsers and the
//! parameter enums they carry.

use std::fmt;

use crate::protocol::error::{require_len, ProtocolError};

/// Message type, the first payload byte.
pub mod kind {
    pub const SET_PARAMS: u8 = 0x01;
    pub const GET_PARAMS: u8 = 0x02;
    pub const GET_TEMP: u8 = 0x03;
    pub const GET_TIMERS: u8 = 0x05;
    pub const GET_STATUS: u8 = 0x06;
    /// Room temperature reported by an external sensor.
    pub const SET_ROOM_TEMP: u8 = 0x07;
    pub const CONNECT: u8 = 0xCA;
}

/// Size of every GET and SET payload.
pub const PAYLOAD_LEN: usize = 16;

/// Temperature limits the unit accepts, in °C.
pub const TEMPERATURE_MIN: f32 = 16.0;
pub const TEMPERATURE_MAX: f32 = 31.0;
pub const TEMPERATURE_DEFAULT: f32 = 25.0;

// ── Parameter enums ───────────────────────────────────────────────────────────

/// Declares a `u8`-backed parameter enum with its wire values and labels.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $value:literal => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, u8> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $label),+
                })
            }
        }
    };
}

wire_enum! {
    Power { Off = 0 => "OFF", On = 1 => "ON" }
}

wire_enum! {
    Mode {
        Heat = 1 => "HEAT",
        Dry = 2 => "DRY",
        Cool = 3 => "COOL",
        Fan = 7 => "FAN",
        Auto = 8 => "AUTO",
    }
}

wire_enum! {
    FanSpeed {
        Auto = 0 => "AUTO",
        Quiet = 1 => "QUIET",
        Speed1 = 2 => "1",
        Speed2 = 3 => "2",
        Speed3 = 5 => "3",
        Speed4 = 6 => "4",
    }
}

wire_enum! {
    /// Up/down vane position.
    VaneVertical {
        Auto = 0 => "AUTO",
        Position1 = 1 => "1",
        Position2 = 2 => "2",
        Position3 = 3 => "3",
        Position4 = 4 => "4",
        Position5 = 5 => "5",
        Swing = 7 => "SWING",
    }
}

wire_enum! {
    /// Left/right vane position.
    VaneHorizontal {
        Auto = 0 => "AUTO",
        LeftMax = 1 => "LEFT_MAX",
        Left = 2 => "LEFT",
        Center = 3 => "CENTER",
        Right = 4 => "RIGHT",
        RightMax = 5 => "RIGHT_MAX",
        Split = 8 => "SPLIT",
        Swing = 12 => "SWING",
    }
}

/// How the unit encodes the set-point.  Newer units report half degrees in a
/// second field; older ones only have the whole-degree field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureEncoding {
    /// `value + 10` °C, whole degrees.
    #[default]
    Offset,
    /// `(value & 0x7F) / 2` °C.
    HalfDegrees,
}

// ── Requests ──────────────────────────────────────────────────────────────────

pub fn connect_request() -> [u8; 2] {
    [kind::CONNECT, 0x01]
}

/// 16-byte GET payload for `kind`.
pub fn get_request(kind: u8) -> [u8; PAYLOAD_LEN] {
    let mut payload = [0u8; PAYLOAD_LEN];
    payload[0] = kind;
    payload
}

// ── GET_PARAMS ────────────────────────────────────────────────────────────────

mod params_offset {
    pub const POWER: usize = 3;
    pub const MODE: usize = 4;
    pub const TEMPERATURE_1: usize = 5;
    pub const FAN: usize = 6;
    pub const VANE_VERTICAL: usize = 7;
    pub const VANE_HORIZONTAL: usize = 10;
    pub const TEMPERATURE_2: usize = 11;
}

const MODE_MASK: u8 = 0x07;
const ISEE_BIT: u8 = 0x08;
const VANE_HORIZONTAL_FLAG: u8 = 0x80;

/// Decoded GET_PARAMS response.
///
/// Enum fields are `Err(raw)` when the unit reports a value this module does
/// not know; the caller logs those and keeps its previous value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamsReport {
    pub power: Result<Power, u8>,
    pub isee: bool,
    pub mode: Result<Mode, u8>,
    pub fan: Result<FanSpeed, u8>,
    pub vane_vertical: Result<VaneVertical, u8>,
    pub vane_horizontal: Result<VaneHorizontal, u8>,
    /// Upper bit of the horizontal vane byte.
    pub vane_horizontal_flag: bool,
    pub target_temperature: f32,
    pub encoding: TemperatureEncoding,
}

pub fn parse_params(payload: &[u8]) -> Result<ParamsReport, ProtocolError> {
    use params_offset::*;

    require_len(payload, TEMPERATURE_2 + 1)?;

    let mode_byte = payload[MODE];
    let horizontal = payload[VANE_HORIZONTAL];

    let (target_temperature, encoding) = if payload[TEMPERATURE_2] != 0 {
        (
            f32::from(payload[TEMPERATURE_2] & 0x7F) / 2.0,
            TemperatureEncoding::HalfDegrees,
        )
    } else {
        (
            f32::from(payload[TEMPERATURE_1]) + 10.0,
            TemperatureEncoding::Offset,
        )
    };

    Ok(ParamsReport {
        power: Power::try_from(payload[POWER]),
        isee: mode_byte & ISEE_BIT != 0,
        mode: Mode::try_from(mode_byte & MODE_MASK),
        fan: FanSpeed::try_from(payload[FAN]),
        vane_vertical: VaneVertical::try_from(payload[VANE_VERTICAL]),
        vane_horizontal: VaneHorizontal::try_from(horizontal & !VANE_HORIZONTAL_FLAG),
        vane_horizontal_flag: horizontal & VANE_HORIZONTAL_FLAG != 0,
        target_temperature,
        encoding,
    })
}

// ── GET_TEMP / GET_STATUS / SET result ────────────────────────────────────────

/// Room temperature from a GET_TEMP response.
pub fn parse_room_temperature(payload: &[u8]) -> Result<f32, ProtocolError> {
    require_len(payload, 7)?;
    Ok(if payload[6] != 0 {
        f32::from(payload[6] & 0x7F) / 2.0
    } else {
        f32::from(payload[3]) + 10.0
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub compressor_operating: bool,
    pub compressor_frequency: u8,
}

pub fn parse_status(payload: &[u8]) -> Result<StatusReport, ProtocolError> {
    require_len(payload, 5)?;
    Ok(StatusReport {
        compressor_operating: payload[4] != 0,
        compressor_frequency: payload[3],
    })
}

/// Error code of a SET response; zero means success.
pub fn parse_set_result(payload: &[u8]) -> Result<u16, ProtocolError> {
    require_len(payload, 3)?;
    Ok(u16::from_le_bytes([payload[1], payload[2]]))
}

// ── SET_PARAMS ────────────────────────────────────────────────────────────────

mod set_offset {
    pub const POWER: usize = 3;
    pub const MODE: usize = 4;
    pub const TEMPERATURE_1: usize = 5;
    pub const FAN: usize = 6;
    pub const VANE_VERTICAL: usize = 7;
    pub const VANE_HORIZONTAL: usize = 12;
    pub const TEMPERATURE_2: usize = 14;
}

/// Bits of the SET_PARAMS control word naming which fields are valid.
pub mod control {
    pub const POWER: u16 = 0x0001;
    pub const MODE: u16 = 0x0002;
    pub const TEMPERATURE: u16 = 0x0004;
    pub const FAN: u16 = 0x0008;
    pub const VANE_VERTICAL: u16 = 0x0010;
    pub const VANE_HORIZONTAL: u16 = 0x0100;
}

/// Pending parameter changes.  Only fields that are `Some` are sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetParams {
    pub power: Option<Power>,
    pub mode: Option<Mode>,
    pub temperature: Option<f32>,
    pub fan: Option<FanSpeed>,
    pub vane_vertical: Option<VaneVertical>,
    pub vane_horizontal: Option<VaneHorizontal>,
}

impl SetParams {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Builds the SET_PARAMS payload, or `None` if nothing is set.
    ///
    /// The temperature is clamped to the unit's 16–31 °C range and encoded the
    /// way the unit last reported its set-point.
    pub fn encode(&self, encoding: TemperatureEncoding) -> Option<[u8; PAYLOAD_LEN]> {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[0] = kind::SET_PARAMS;
        let mut bits = 0u16;

        if let Some(power) = self.power {
            payload[set_offset::POWER] = power as u8;
            bits |= control::POWER;
        }
        if let Some(mode) = self.mode {
            payload[set_offset::MODE] = mode as u8;
            bits |= control::MODE;
        }
        if let Some(value) = self.temperature {
            let value = value.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX);
            match encoding {
                TemperatureEncoding::HalfDegrees => {
                    payload[set_offset::TEMPERATURE_2] = (value * 2.0).round() as u8 | 0x80;
                }
                TemperatureEncoding::Offset => {
                    payload[set_offset::TEMPERATURE_1] = (TEMPERATURE_MAX - value) as u8;
                }
            }
            bits |= control::TEMPERATURE;
        }
        if let Some(fan) = self.fan {
            payload[set_offset::FAN] = fan as u8;
            bits |= control::FAN;
        }
        if let Some(vane) = self.vane_vertical {
            payload[set_offset::VANE_VERTICAL] = vane as u8;
            bits |= control::VANE_VERTICAL;
        }
        if let Some(vane) = self.vane_horizontal {
            payload[set_offset::VANE_HORIZONTAL] = vane as u8;
            bits |= control::VANE_HORIZONTAL;
        }

        if bits == 0 {
            return None;
        }
        payload[1..3].copy_from_slice(&bits.to_le_bytes());
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_payload() -> Vec<u8> {
        let mut p = vec![0u8; PAYLOAD_LEN];
        p[0] = kind::GET_PARAMS;
        p[3] = 1; // power on
        p[4] = 0x08 | 3; // iSee + cool
        p[5] = 14; // 24 °C in offset encoding
        p[6] = 3; // fan speed 2
        p[7] = 7; // vertical swing
        p[10] = 0x80 | 3; // flag + centre
        p
    }

    #[test]
    fn test_parse_params_offset_encoding() {
        // Arrange
        let payload = params_payload();

        // Act
        let report = parse_params(&payload).expect("parse");

        // Assert
        assert_eq!(report.power, Ok(Power::On));
        assert!(report.isee);
        assert_eq!(report.mode, Ok(Mode::Cool));
        assert_eq!(report.fan, Ok(FanSpeed::Speed2));
        assert_eq!(report.vane_vertical, Ok(VaneVertical::Swing));
        assert_eq!(report.vane_horizontal, Ok(VaneHorizontal::Center));
        assert!(report.vane_horizontal_flag);
        assert_eq!(report.target_temperature, 24.0);
        assert_eq!(report.encoding, TemperatureEncoding::Offset);
    }

    #[test]
    fn test_parse_params_half_degree_encoding_wins_when_present() {
        let mut payload = params_payload();
        payload[11] = 0x80 | 45; // 22.5 °C

        let report = parse_params(&payload).expect("parse");

        assert_eq!(report.target_temperature, 22.5);
        assert_eq!(report.encoding, TemperatureEncoding::HalfDegrees);
    }

    #[test]
    fn test_parse_params_unknown_fan_is_reported_raw() {
        let mut payload = params_payload();
        payload[6] = 4;
        let report = parse_params(&payload).expect("parse");
        assert_eq!(report.fan, Err(4));
    }

    #[test]
    fn test_parse_params_short_payload_is_rejected() {
        assert!(parse_params(&[kind::GET_PARAMS, 0, 0, 1]).is_err());
    }

    #[test]
    fn test_room_temperature_prefers_half_degree_field() {
        let mut payload = vec![0u8; PAYLOAD_LEN];
        payload[3] = 12;
        assert_eq!(parse_room_temperature(&payload), Ok(22.0));
        payload[6] = 0x80 | 43;
        assert_eq!(parse_room_temperature(&payload), Ok(21.5));
    }

    #[test]
    fn test_set_params_empty_encodes_nothing() {
        assert_eq!(SetParams::default().encode(TemperatureEncoding::Offset), None);
    }

    #[test]
    fn test_set_params_control_bits_and_offsets() {
        // Arrange
        let set = SetParams {
            power: Some(Power::On),
            mode: Some(Mode::Heat),
            vane_horizontal: Some(VaneHorizontal::Swing),
            ..SetParams::default()
        };

        // Act
        let payload = set.encode(TemperatureEncoding::Offset).expect("payload");

        // Assert
        assert_eq!(payload[0], kind::SET_PARAMS);
        assert_eq!(u16::from_le_bytes([payload[1], payload[2]]), 0x0103);
        assert_eq!(payload[3], 1);
        assert_eq!(payload[4], 1);
        assert_eq!(payload[12], 12);
    }

    #[test]
    fn test_set_temperature_is_clamped_and_encoded() {
        let set = SetParams {
            temperature: Some(40.0),
            ..SetParams::default()
        };
        let offset = set.encode(TemperatureEncoding::Offset).expect("payload");
        assert_eq!(offset[5], 0);

        let set = SetParams {
            temperature: Some(22.5),
            ..SetParams::default()
        };
        let half = set.encode(TemperatureEncoding::HalfDegrees).expect("payload");
        assert_eq!(half[14], 0x80 | 45);
        assert_eq!(u16::from_le_bytes([half[1], half[2]]), control::TEMPERATURE);
    }

    #[test]
    fn test_set_result_is_little_endian() {
        assert_eq!(parse_set_result(&[kind::SET_PARAMS, 0x02, 0x01]), Ok(0x0102));
    }
}
