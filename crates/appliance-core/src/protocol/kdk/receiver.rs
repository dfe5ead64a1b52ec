//! Byte-at-a-time KDK frame receiver.
//!
//! The receiver is fed one byte per call and reports when a frame (or a
//! SYNC marker) is complete.  It never blocks and never looks at the clock
//! itself; the caller passes `now` so tests can drive time explicitly.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::protocol::error::ProtocolError;
use crate::protocol::hex::HexBytes;

use super::frame::{decode_frame, KdkFrame, CHECKSUM_LEN, HEADER_LEN, START, SYNC};

/// A gap longer than this between two bytes discards the partial frame.
pub const BYTE_TIMEOUT: Duration = Duration::from_millis(100);

/// What the receiver has after consuming one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// More bytes are needed.
    Incomplete,
    /// The device announced a (re)start.
    Sync,
    /// A complete, checksum-verified frame.
    Frame(KdkFrame),
}

#[derive(Debug)]
pub struct FrameReceiver {
    buffer: Vec<u8>,
    last_byte_at: Option<Instant>,
    byte_timeout: Duration,
}

impl FrameReceiver {
    pub fn new() -> Self {
        Self::with_byte_timeout(BYTE_TIMEOUT)
    }

    pub fn with_byte_timeout(byte_timeout: Duration) -> Self {
        Self {
            buffer: Vec::with_capacity(super::frame::BUFFER_SIZE),
            last_byte_at: None,
            byte_timeout,
        }
    }

    /// Discards any partially received frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes of the frame currently being assembled.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Consumes one byte.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidStart`] for a stray byte outside a frame.
    ///   The byte is dropped; this is line noise, not a fault.
    /// - [`ProtocolError::ChecksumMismatch`] when a complete frame fails
    ///   verification.  The frame is dropped and the receiver starts over.
    pub fn push(&mut self, byte: u8, now: Instant) -> Result<Received, ProtocolError> {
        if let Some(last) = self.last_byte_at {
            let gap = now.saturating_duration_since(last);
            if gap > self.byte_timeout && !self.buffer.is_empty() {
                trace!(
                    "RX> inter-byte timeout after {gap:?}, dropping {}",
                    HexBytes(&self.buffer)
                );
                self.buffer.clear();
            }
        }
        self.last_byte_at = Some(now);

        if self.buffer.is_empty() && byte != START && byte != SYNC {
            return Err(ProtocolError::InvalidStart(byte));
        }

        self.buffer.push(byte);

        if self.buffer.len() < HEADER_LEN {
            return Ok(Received::Incomplete);
        }

        if self.buffer[0] == SYNC {
            trace!("RX> SYNC {}", HexBytes(&self.buffer));
            self.buffer.clear();
            return Ok(Received::Sync);
        }

        let expected_len = HEADER_LEN + self.buffer[5] as usize + CHECKSUM_LEN;
        if self.buffer.len() < expected_len {
            return Ok(Received::Incomplete);
        }

        trace!("RX> {}", HexBytes(&self.buffer));
        let result = decode_frame(&self.buffer);
        self.buffer.clear();
        result.map(Received::Frame)
    }
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}
