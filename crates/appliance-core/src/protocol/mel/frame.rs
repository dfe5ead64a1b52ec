//! MEL-AC frame encoding, decoding and the byte receiver.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::protocol::error::{require_len, ProtocolError};
use crate::protocol::hex::HexBytes;

pub const START: u8 = 0xFC;
pub const VERSION_MAJOR: u8 = 0x01;
pub const VERSION_MINOR: u8 = 0x30;

/// START, FLAGS, VERSION (2), LENGTH.
pub const HEADER_LEN: usize = 5;
pub const CHECKSUM_LEN: usize = 1;

/// Largest frame accepted; observed payloads are at most 26 bytes.
pub const BUFFER_SIZE: usize = 32;

/// Maximum wait for a response and maximum gap between two of its bytes.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Frame flag bits.
pub mod flags {
    pub const IN: u8 = 0x20;
    pub const OUT: u8 = 0x40;
    pub const SET: u8 = 0x01;
    pub const GET: u8 = 0x02;
    pub const CONNECT: u8 = 0x18 | GET;
}

/// A decoded MEL-AC frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MelFrame {
    pub flags: u8,
    pub payload: Vec<u8>,
}

impl MelFrame {
    /// `true` if every bit of `mask` is set in the frame flags.
    pub fn has_flags(&self, mask: u8) -> bool {
        self.flags & mask == mask
    }

    /// First payload byte.
    pub fn kind(&self) -> Option<u8> {
        self.payload.first().copied()
    }
}

pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    START.wrapping_sub(sum)
}

/// Builds an outgoing frame.  `OUT` is added to `request_flags`.
///
/// # Errors
///
/// Returns [`ProtocolError::FrameTooLarge`] if the frame would not fit the
/// unit's 32-byte buffer.
pub fn encode_request(request_flags: u8, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let length = HEADER_LEN + payload.len() + CHECKSUM_LEN;
    if length > BUFFER_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            length,
            capacity: BUFFER_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(length);
    buf.extend_from_slice(&[
        START,
        flags::OUT | request_flags,
        VERSION_MAJOR,
        VERSION_MINOR,
        payload.len() as u8,
    ]);
    buf.extend_from_slice(payload);
    buf.push(checksum(&buf));
    Ok(buf)
}

/// Decodes one complete frame.
pub fn decode_frame(bytes: &[u8]) -> Result<MelFrame, ProtocolError> {
    require_len(bytes, HEADER_LEN)?;
    if bytes[0] != START {
        return Err(ProtocolError::InvalidStart(bytes[0]));
    }
    check_version(bytes[2], bytes[3])?;

    let body_len = HEADER_LEN + bytes[4] as usize;
    require_len(bytes, body_len + CHECKSUM_LEN)?;

    let expected = checksum(&bytes[..body_len]);
    let got = bytes[body_len];
    if got != expected {
        return Err(ProtocolError::ChecksumMismatch { got, expected });
    }

    Ok(MelFrame {
        flags: bytes[1],
        payload: bytes[HEADER_LEN..body_len].to_vec(),
    })
}

fn check_version(major: u8, minor: u8) -> Result<(), ProtocolError> {
    if major != VERSION_MAJOR || minor != VERSION_MINOR {
        return Err(ProtocolError::UnsupportedVersion { major, minor });
    }
    Ok(())
}

/// Byte-at-a-time receiver.
#[derive(Debug)]
pub struct FrameReceiver {
    buffer: Vec<u8>,
    last_byte_at: Option<Instant>,
}

impl FrameReceiver {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(BUFFER_SIZE),
            last_byte_at: None,
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Consumes one byte and returns a frame once one is complete.
    ///
    /// The header is validated as soon as it has arrived so a bad version or
    /// an oversized length is rejected without waiting for the rest.
    pub fn push(&mut self, byte: u8, now: Instant) -> Result<Option<MelFrame>, ProtocolError> {
        if let Some(last) = self.last_byte_at {
            if now.saturating_duration_since(last) > RECEIVE_TIMEOUT && !self.buffer.is_empty() {
                trace!("RX> inter-byte timeout, dropping {}", HexBytes(&self.buffer));
                self.buffer.clear();
            }
        }
        self.last_byte_at = Some(now);

        if self.buffer.is_empty() && byte != START {
            return Err(ProtocolError::InvalidStart(byte));
        }
        self.buffer.push(byte);

        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        if self.buffer.len() == HEADER_LEN {
            if let Err(e) = check_version(self.buffer[2], self.buffer[3]) {
                self.buffer.clear();
                return Err(e);
            }
        }

        let expected_len = HEADER_LEN + self.buffer[4] as usize + CHECKSUM_LEN;
        if expected_len > BUFFER_SIZE {
            self.buffer.clear();
            return Err(ProtocolError::FrameTooLarge {
                length: expected_len,
                capacity: BUFFER_SIZE,
            });
        }
        if self.buffer.len() < expected_len {
            return Ok(None);
        }

        trace!("RX> {}", HexBytes(&self.buffer));
        let result = decode_frame(&self.buffer);
        self.buffer.clear();
        result.map(Some)
    }
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}
