//! KDK frame encoding and decoding.

use crate::protocol::error::{require_len, ProtocolError};

use super::command::RESPONSE_BIT;

/// First byte of every normal frame.
pub const START: u8 = 0x5A;

/// First byte of the SYNC frame the device sends on power-up.
pub const SYNC: u8 = 0x66;

/// START, COUNTER, COMMAND (2), reserved, LENGTH.
pub const HEADER_LEN: usize = 6;

pub const CHECKSUM_LEN: usize = 1;

/// Largest frame the receiver buffers: header, a full 255-byte payload and
/// the checksum.
pub const BUFFER_SIZE: usize = 256 + HEADER_LEN;

/// A decoded KDK frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdkFrame {
    pub counter: u8,
    pub command: u16,
    pub payload: Vec<u8>,
}

impl KdkFrame {
    pub fn new(counter: u8, command: u16, payload: Vec<u8>) -> Self {
        Self {
            counter,
            command,
            payload,
        }
    }

    /// `true` when bit 15 of the command is set.
    pub fn is_response(&self) -> bool {
        self.command & RESPONSE_BIT != 0
    }

    /// The command with the response bit cleared.
    pub fn base_command(&self) -> u16 {
        self.command & !RESPONSE_BIT
    }

    /// Builds the reply to a device-initiated request: same counter, response
    /// bit set.
    pub fn response_to(&self, payload: Vec<u8>) -> Self {
        Self {
            counter: self.counter,
            command: self.command | RESPONSE_BIT,
            payload,
        }
    }

    /// Serialises the frame, appending the checksum.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooLarge`] if the payload does not fit
    /// the one-byte length field.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let length = u8::try_from(self.payload.len()).map_err(|_| ProtocolError::FrameTooLarge {
            length: HEADER_LEN + self.payload.len() + CHECKSUM_LEN,
            capacity: BUFFER_SIZE,
        })?;

        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len() + CHECKSUM_LEN);
        buf.push(START);
        buf.push(self.counter);
        buf.extend_from_slice(&self.command.to_le_bytes());
        buf.push(0x00);
        buf.push(length);
        buf.extend_from_slice(&self.payload);
        buf.push(checksum(&buf));
        Ok(buf)
    }
}

/// Two's complement of the byte sum.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0u8.wrapping_sub(sum)
}

/// Decodes one complete frame from `bytes`.
///
/// Trailing bytes after the checksum are ignored.
///
/// # Errors
///
/// - [`ProtocolError::InsufficientData`] if the buffer is shorter than the
///   header or the declared length.
/// - [`ProtocolError::InvalidStart`] if the first byte is not `0x5A`.
/// - [`ProtocolError::ChecksumMismatch`] if the checksum is wrong.
pub fn decode_frame(bytes: &[u8]) -> Result<KdkFrame, ProtocolError> {
    require_len(bytes, HEADER_LEN)?;

    if bytes[0] != START {
        return Err(ProtocolError::InvalidStart(bytes[0]));
    }

    let length = bytes[5] as usize;
    let body_len = HEADER_LEN + length;
    require_len(bytes, body_len + CHECKSUM_LEN)?;

    let expected = checksum(&bytes[..body_len]);
    let got = bytes[body_len];
    if got != expected {
        return Err(ProtocolError::ChecksumMismatch { got, expected });
    }

    Ok(KdkFrame {
        counter: bytes[1],
        command: u16::from_le_bytes([bytes[2], bytes[3]]),
        payload: bytes[HEADER_LEN..body_len].to_vec(),
    })
}
