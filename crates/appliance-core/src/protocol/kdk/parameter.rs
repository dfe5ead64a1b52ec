//! The KDK parameter table and the payloads that read and write it.
//!
//! # How the device stores state (for beginners)
//!
//! A KDK device does not send "fan speed = 3" messages.  Instead it exposes
//! a table of numbered parameters, each a handful of raw bytes:
//!
//! ```text
//!   id      size  meaning
//!   0x8000  1     fan power     (0x30 on, 0x31 off)
//!   0xF000  1     fan speed     (0x31..0x3A)
//!   0xF300  1     light power
//!   ...
//! ```
//!
//! During the handshake the module asks for the table layout (0x0110) and
//! from then on reads (0x0910) and writes (0x0810) batches of values.  The
//! fan and light drivers only ever see raw parameter bytes; turning those
//! into speeds and brightness is their job.
//!
//! Every parser in this module validates the whole payload before returning
//! anything, so a truncated frame can never leave the table half-updated.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::error::{require_len, ProtocolError};
use crate::protocol::hex::HexBytes;

/// Largest number of ids a single read request may carry.
pub const MAX_REQUEST_IDS: usize = 80;

/// Data bytes of a parameter before the device has reported it.
pub const UNKNOWN_DATA_BYTE: u8 = 0x55;

/// Descriptor metadata marking the attribute parameters read by 0x0210.
pub const ATTRIBUTE_METADATA: u8 = 0x40;

/// Leading byte of read and write requests.
const REQUEST_TYPE: u8 = 0x02;

/// Value reports start after a status byte and the 3-byte table id.
const VALUE_REPORT_OFFSET: usize = 4;

/// Well-known parameter ids.
pub mod ids {
    use super::ParameterId;

    pub const FAN_STATE: ParameterId = ParameterId(0x8000);
    pub const FAN_SPEED: ParameterId = ParameterId(0xF000);
    pub const FAN_DIRECTION: ParameterId = ParameterId(0xF100);
    pub const FAN_YURAGI: ParameterId = ParameterId(0xF200);
    pub const LIGHT_STATE: ParameterId = ParameterId(0xF300);
    pub const LIGHT_MODE: ParameterId = ParameterId(0xF400);
    pub const LIGHT_BRIGHTNESS: ParameterId = ParameterId(0xF500);
    pub const LIGHT_COLOR: ParameterId = ParameterId(0xF600);
    pub const NIGHT_LIGHT_BRIGHTNESS: ParameterId = ParameterId(0xF700);
}

/// Ids read once at the end of the handshake and never polled.
pub const INITIAL_READ_IDS: [ParameterId; 13] = [
    ParameterId(0x8100),
    ParameterId(0x8600),
    ParameterId(0x8C00),
    ParameterId(0x9300),
    ParameterId(0xFC00),
    ParameterId(0xFD00),
    ParameterId(0xFE00),
    ParameterId(0xF001),
    ParameterId(0xF101),
    ParameterId(0xF201),
    ParameterId(0xF301),
    ParameterId(0xF401),
    ParameterId(0xF501),
];

/// Ids read on every poll.
pub const POLL_IDS: [ParameterId; 14] = [
    ids::FAN_STATE,
    ids::FAN_SPEED,
    ParameterId(0x8800),
    ParameterId(0xF800),
    ids::FAN_YURAGI,
    ids::FAN_DIRECTION,
    ParameterId(0xF900),
    ParameterId(0xFA00),
    ParameterId(0xFB00),
    ids::LIGHT_STATE,
    ids::LIGHT_BRIGHTNESS,
    ids::LIGHT_MODE,
    ids::NIGHT_LIGHT_BRIGHTNESS,
    ids::LIGHT_COLOR,
];

// ── Identifiers ───────────────────────────────────────────────────────────────

/// 16-bit parameter id, little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParameterId(pub u16);

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// The 3-byte table id the device hands out during the handshake.  Every
/// read and write request must quote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableId(u32);

impl TableId {
    pub fn from_le_bytes(bytes: [u8; 3]) -> Self {
        Self(u32::from(bytes[0]) | u32::from(bytes[1]) << 8 | u32::from(bytes[2]) << 16)
    }

    pub fn to_le_bytes(self) -> [u8; 3] {
        let b = self.0.to_le_bytes();
        [b[0], b[1], b[2]]
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06X}", self.0)
    }
}

// ── Table entries ─────────────────────────────────────────────────────────────

/// Layout of one parameter as reported by 0x0110.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub id: ParameterId,
    /// Meaning unknown; `0x40` marks attribute parameters.
    pub metadata: u8,
    pub size: u8,
}

/// An id with its data bytes, either reported by the device or to be
/// written to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterValue {
    pub id: ParameterId,
    pub data: Vec<u8>,
}

impl ParameterValue {
    pub fn new(id: ParameterId, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    pub fn byte(id: ParameterId, value: u8) -> Self {
        Self {
            id,
            data: vec![value],
        }
    }
}

/// Product identification from 0x1100.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub model: String,
    pub serial: String,
}

/// Errors raised when a write batch does not match the table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("unknown parameter {0}")]
    UnknownParameter(ParameterId),

    #[error("parameter {id} expects {expected} bytes, got {got}")]
    SizeMismatch {
        id: ParameterId,
        got: usize,
        expected: usize,
    },

    #[error("{count} ids exceed the request limit of {max}")]
    TooManyIds { count: usize, max: usize },
}

// ── Response parsers ──────────────────────────────────────────────────────────

/// Parses the 0x1100 response.
///
/// The info string length sits at payload offset 6 and the string follows.
/// It has the form `MODEL+SERIAL`; without a `+` the whole string is the
/// model.
pub fn parse_device_info(payload: &[u8]) -> Result<DeviceInfo, ProtocolError> {
    require_len(payload, 7)?;
    let len = payload[6] as usize;
    require_len(payload, 7 + len)?;

    let info = String::from_utf8_lossy(&payload[7..7 + len]);
    let (model, serial) = info.split_once('+').unwrap_or((&*info, ""));
    Ok(DeviceInfo {
        model: model.to_string(),
        serial: serial.to_string(),
    })
}

/// Parses the 0x0010 response: table id at payload offset 2.
pub fn parse_table_id(payload: &[u8]) -> Result<TableId, ProtocolError> {
    require_len(payload, 5)?;
    Ok(TableId::from_le_bytes([payload[2], payload[3], payload[4]]))
}

/// Parses the 0x0110 response.
///
/// A big-endian entry count sits at offset 8, followed by 4-byte entries of
/// `id (LE), metadata, size`.
pub fn parse_descriptors(payload: &[u8]) -> Result<Vec<ParameterDescriptor>, ProtocolError> {
    require_len(payload, 10)?;
    let count = u16::from_be_bytes([payload[8], payload[9]]) as usize;
    require_len(payload, 10 + count * 4)?;

    Ok(payload[10..10 + count * 4]
        .chunks_exact(4)
        .map(|entry| ParameterDescriptor {
            id: ParameterId(u16::from_le_bytes([entry[0], entry[1]])),
            metadata: entry[2],
            size: entry[3],
        })
        .collect())
}

/// Parses a value report (responses to 0x0210/0x0910 and the 0x0A10
/// notification).
///
/// After the status byte and table id comes a count and then entries of
/// `id (LE), length, data`.
pub fn parse_value_report(payload: &[u8]) -> Result<Vec<ParameterValue>, ProtocolError> {
    require_len(payload, VALUE_REPORT_OFFSET + 1)?;
    let body = &payload[VALUE_REPORT_OFFSET..];
    let count = body[0] as usize;

    let mut values = Vec::with_capacity(count);
    let mut index = 1;
    for _ in 0..count {
        let rest = &body[index..];
        require_len(rest, 3)?;
        let id = ParameterId(u16::from_le_bytes([rest[0], rest[1]]));
        let len = rest[2] as usize;
        require_len(rest, 3 + len)?;
        values.push(ParameterValue::new(id, rest[3..3 + len].to_vec()));
        index += 3 + len;
    }
    Ok(values)
}

// ── Request builders ──────────────────────────────────────────────────────────

/// Table id, count and `id (LE), 0x00` per requested id.
fn encode_id_list(table: TableId, ids: &[ParameterId]) -> Result<Vec<u8>, ParameterError> {
    if ids.len() > MAX_REQUEST_IDS {
        return Err(ParameterError::TooManyIds {
            count: ids.len(),
            max: MAX_REQUEST_IDS,
        });
    }

    let mut buf = Vec::with_capacity(4 + ids.len() * 3);
    buf.extend_from_slice(&table.to_le_bytes());
    buf.push(ids.len() as u8);
    for id in ids {
        buf.extend_from_slice(&id.0.to_le_bytes());
        buf.push(0x00);
    }
    Ok(buf)
}

/// Payload of a 0x0910 read request.
pub fn encode_read_request(table: TableId, ids: &[ParameterId]) -> Result<Vec<u8>, ParameterError> {
    let mut buf = vec![REQUEST_TYPE];
    buf.extend(encode_id_list(table, ids)?);
    Ok(buf)
}

/// Payload of the 0x0210 attribute read.
pub fn encode_attribute_request(
    table: TableId,
    ids: &[ParameterId],
) -> Result<Vec<u8>, ParameterError> {
    encode_id_list(table, ids)
}

/// Payload of the 0x0110 descriptor list request.
pub fn encode_list_request(table: TableId) -> Vec<u8> {
    let mut buf = table.to_le_bytes().to_vec();
    buf.extend_from_slice(&[0x00, 0x01]);
    buf
}

// ── Table ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Entry {
    descriptor: ParameterDescriptor,
    data: Vec<u8>,
}

/// The device's parameter table as mirrored by the module.
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    id: TableId,
    entries: BTreeMap<ParameterId, Entry>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn set_id(&mut self, id: TableId) {
        self.id = id;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces the layout.  Every data byte is reset to
    /// [`UNKNOWN_DATA_BYTE`] until the device reports a value.
    pub fn load_descriptors(&mut self, descriptors: Vec<ParameterDescriptor>) {
        self.entries = descriptors
            .into_iter()
            .map(|d| {
                (
                    d.id,
                    Entry {
                        descriptor: d,
                        data: vec![UNKNOWN_DATA_BYTE; d.size as usize],
                    },
                )
            })
            .collect();
    }

    /// Current data of `id`, or an empty slice for an id the device did not
    /// declare.
    pub fn get(&self, id: ParameterId) -> &[u8] {
        self.entries.get(&id).map(|e| e.data.as_slice()).unwrap_or(&[])
    }

    /// First data byte of `id`, if any.
    pub fn byte(&self, id: ParameterId) -> Option<u8> {
        self.get(id).first().copied()
    }

    pub fn descriptor(&self, id: ParameterId) -> Option<&ParameterDescriptor> {
        self.entries.get(&id).map(|e| &e.descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = (&ParameterDescriptor, &[u8])> {
        self.entries
            .values()
            .map(|e| (&e.descriptor, e.data.as_slice()))
    }

    /// Ids whose descriptor carries `metadata`, in ascending order.
    pub fn ids_with_metadata(&self, metadata: u8) -> Vec<ParameterId> {
        self.entries
            .values()
            .filter(|e| e.descriptor.metadata == metadata)
            .map(|e| e.descriptor.id)
            .collect()
    }

    /// Stores reported values and returns the ids that were stored.
    ///
    /// Unknown ids and values of the wrong size are skipped with a warning;
    /// they never overwrite anything.
    pub fn apply(&mut self, values: &[ParameterValue]) -> Vec<ParameterId> {
        let mut applied = Vec::with_capacity(values.len());
        for value in values {
            let Some(entry) = self.entries.get_mut(&value.id) else {
                warn!("PARAM> unknown parameter {}", value.id);
                continue;
            };
            if entry.data.len() != value.data.len() {
                warn!(
                    "PARAM> parameter {} size mismatch: got={}, exp={}",
                    value.id,
                    value.data.len(),
                    entry.data.len()
                );
                continue;
            }
            entry.data.clone_from(&value.data);
            debug!("PARAM> GET {}={}", value.id, HexBytes(&value.data));
            applied.push(value.id);
        }
        applied
    }

    /// Builds the 0x0810 payload for a batch of writes.
    ///
    /// Duplicate ids collapse to the last value given.  The whole batch is
    /// rejected if any id is unknown or any value has the wrong size.
    pub fn prepare_write(&self, batch: &[ParameterValue]) -> Result<Vec<u8>, ParameterError> {
        let mut unique: BTreeMap<ParameterId, &[u8]> = BTreeMap::new();
        for value in batch {
            let entry = self
                .entries
                .get(&value.id)
                .ok_or(ParameterError::UnknownParameter(value.id))?;
            if entry.data.len() != value.data.len() {
                return Err(ParameterError::SizeMismatch {
                    id: value.id,
                    got: value.data.len(),
                    expected: entry.data.len(),
                });
            }
            unique.insert(value.id, &value.data);
        }
        if unique.len() > MAX_REQUEST_IDS {
            return Err(ParameterError::TooManyIds {
                count: unique.len(),
                max: MAX_REQUEST_IDS,
            });
        }

        let mut buf = vec![REQUEST_TYPE];
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.push(unique.len() as u8);
        for (id, data) in unique {
            buf.extend_from_slice(&id.0.to_le_bytes());
            buf.push(data.len() as u8);
            buf.extend_from_slice(data);
            debug!("PARAM> SET {id}={}", HexBytes(data));
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ParameterTable {
        let mut table = ParameterTable::new();
        table.set_id(TableId::from_le_bytes([0x01, 0x3A, 0x01]));
        table.load_descriptors(vec![
            ParameterDescriptor {
                id: ids::FAN_STATE,
                metadata: 0xE2,
                size: 1,
            },
            ParameterDescriptor {
                id: ParameterId(0x8200),
                metadata: ATTRIBUTE_METADATA,
                size: 4,
            },
            ParameterDescriptor {
                id: ids::FAN_SPEED,
                metadata: 0xE2,
                size: 1,
            },
        ]);
        table
    }

    #[test]
    fn test_device_info_splits_model_and_serial() {
        // Arrange: captured 0x1100 payload prefix.
        let mut payload = vec![0x00, 0x00, 0x01, 0x00, 0x01, 0x0A, 0x16];
        payload.extend_from_slice(b"K12UC+VBHH-GY242200126");

        // Act
        let info = parse_device_info(&payload).expect("parse");

        // Assert
        assert_eq!(info.model, "K12UC");
        assert_eq!(info.serial, "VBHH-GY242200126");
    }

    #[test]
    fn test_device_info_without_separator_is_all_model() {
        let mut payload = vec![0, 0, 0, 0, 0, 0, 5];
        payload.extend_from_slice(b"K15UC");
        let info = parse_device_info(&payload).expect("parse");
        assert_eq!(info.model, "K15UC");
        assert_eq!(info.serial, "");
    }

    #[test]
    fn test_device_info_truncated_string_is_malformed() {
        let payload = vec![0, 0, 0, 0, 0, 0, 20, b'K'];
        assert!(matches!(
            parse_device_info(&payload),
            Err(ProtocolError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_table_id_is_three_bytes_little_endian() {
        let id = parse_table_id(&[0x00, 0x01, 0x01, 0x3A, 0x01]).expect("parse");
        assert_eq!(id.to_string(), "0x013A01");
        assert_eq!(id.to_le_bytes(), [0x01, 0x3A, 0x01]);
    }

    #[test]
    fn test_descriptors_count_is_big_endian() {
        // Arrange
        let mut payload = vec![0x00, 0x01, 0x3A, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x02];
        payload.extend_from_slice(&[0x00, 0x80, 0xE2, 0x01]);
        payload.extend_from_slice(&[0x00, 0x82, 0x40, 0x04]);

        // Act
        let descriptors = parse_descriptors(&payload).expect("parse");

        // Assert
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].id, ParameterId(0x8000));
        assert_eq!(descriptors[1].metadata, 0x40);
        assert_eq!(descriptors[1].size, 4);
    }

    #[test]
    fn test_value_report_truncated_entry_is_rejected_entirely() {
        // Arrange: count says 2, second entry cut short.
        let payload = vec![
            0x00, 0x01, 0x3A, 0x01, 0x02, 0x00, 0x80, 0x01, 0x30, 0x00, 0xF0, 0x01,
        ];

        // Act
        let result = parse_value_report(&payload);

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn test_load_descriptors_fills_unknown_bytes() {
        let table = table();
        assert_eq!(table.get(ParameterId(0x8200)), &[0x55, 0x55, 0x55, 0x55]);
    }

    #[test]
    fn test_get_unknown_id_returns_empty() {
        let table = table();
        assert!(table.get(ParameterId(0x1234)).is_empty());
    }

    #[test]
    fn test_apply_skips_unknown_and_wrong_size() {
        // Arrange
        let mut table = table();
        let values = vec![
            ParameterValue::byte(ids::FAN_STATE, 0x30),
            ParameterValue::byte(ParameterId(0x9999), 0x01),
            ParameterValue::new(ids::FAN_SPEED, vec![0x31, 0x32]),
        ];

        // Act
        let applied = table.apply(&values);

        // Assert
        assert_eq!(applied, vec![ids::FAN_STATE]);
        assert_eq!(table.get(ids::FAN_STATE), &[0x30]);
        assert_eq!(table.get(ids::FAN_SPEED), &[0x55]);
    }

    #[test]
    fn test_prepare_write_last_duplicate_wins_and_counts_unique() {
        // Arrange
        let table = table();
        let batch = vec![
            ParameterValue::byte(ids::FAN_STATE, 0x31),
            ParameterValue::byte(ids::FAN_SPEED, 0x33),
            ParameterValue::byte(ids::FAN_STATE, 0x30),
        ];

        // Act
        let payload = table.prepare_write(&batch).expect("prepare");

        // Assert
        assert_eq!(
            payload,
            vec![
                0x02, 0x01, 0x3A, 0x01, 0x02, // type, table, count
                0x00, 0x80, 0x01, 0x30, // fan state
                0x00, 0xF0, 0x01, 0x33, // fan speed
            ]
        );
    }

    #[test]
    fn test_prepare_write_rejects_size_mismatch() {
        let table = table();
        let batch = vec![ParameterValue::new(ids::FAN_STATE, vec![0x30, 0x30])];
        assert_eq!(
            table.prepare_write(&batch),
            Err(ParameterError::SizeMismatch {
                id: ids::FAN_STATE,
                got: 2,
                expected: 1
            })
        );
    }

    #[test]
    fn test_read_request_matches_captured_layout() {
        let table = table();
        let payload =
            encode_read_request(table.id(), &[ids::FAN_STATE, ids::FAN_SPEED]).expect("encode");
        assert_eq!(
            payload,
            vec![0x02, 0x01, 0x3A, 0x01, 0x02, 0x00, 0x80, 0x00, 0x00, 0xF0, 0x00]
        );
    }

    #[test]
    fn test_read_request_rejects_too_many_ids() {
        let ids = vec![ids::FAN_STATE; MAX_REQUEST_IDS + 1];
        assert!(matches!(
            encode_read_request(TableId::default(), &ids),
            Err(ParameterError::TooManyIds { .. })
        ));
    }

    #[test]
    fn test_attribute_ids_selected_by_metadata() {
        let table = table();
        assert_eq!(
            table.ids_with_metadata(ATTRIBUTE_METADATA),
            vec![ParameterId(0x8200)]
        );
        let payload =
            encode_attribute_request(table.id(), &[ParameterId(0x8200)]).expect("encode");
        assert_eq!(payload, vec![0x01, 0x3A, 0x01, 0x01, 0x00, 0x82, 0x00]);
    }
}
