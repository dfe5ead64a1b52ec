//! Error type shared by both protocol families.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while receiving or decoding a frame.
///
/// [`Timeout`](ProtocolError::Timeout) is the only variant that does not
/// describe corrupted input; every other variant means a frame (or the start
/// of one) was seen but must not be applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// No complete frame arrived before the deadline.
    #[error("no response within {waited:?}")]
    Timeout { waited: Duration },

    /// Not enough bytes to decode the frame or payload field.
    #[error("insufficient data: need {needed} bytes, have {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The first byte is not a known frame marker.
    #[error("invalid frame start byte: 0x{0:02X}")]
    InvalidStart(u8),

    /// The trailing checksum does not match the frame content.
    #[error("checksum mismatch: got 0x{got:02X}, expected 0x{expected:02X}")]
    ChecksumMismatch { got: u8, expected: u8 },

    /// The declared length does not fit into the receive buffer.
    #[error("frame of {length} bytes exceeds buffer capacity of {capacity}")]
    FrameTooLarge { length: usize, capacity: usize },

    /// The header carries a protocol version this implementation does not speak.
    #[error("unsupported protocol version {major:#04x}.{minor:#04x}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// The payload is structurally invalid for its command.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl ProtocolError {
    /// `true` for a missed deadline, `false` for corrupted input.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Returns `InsufficientData` unless `bytes` holds at least `needed` bytes.
pub(crate) fn require_len(bytes: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if bytes.len() < needed {
        return Err(ProtocolError::InsufficientData {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}
