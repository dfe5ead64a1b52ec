//! The byte-transport contract every serial driver is written against.
//!
//! A transport offers exactly what a bare UART peripheral offers: a count of
//! bytes waiting in the receive buffer, a way to pop one of them, and a way to
//! write bytes out.  There is no framing and no timeout handling here; both
//! are the job of the protocol receivers in [`crate::protocol`].
//!
//! # Why non-blocking? (for beginners)
//!
//! All drivers on a node share one cooperative scheduler.  If one driver sat
//! in a blocking `read()` waiting for a slow device, every other driver would
//! stall with it.  So reads never wait: a driver asks how many bytes are
//! [`available`](SerialTransport::available), consumes those, and returns.
//! The "wait up to N milliseconds" behaviour is built on top by remembering
//! *when* a request was sent and checking the deadline on each tick.

use thiserror::Error;

/// Error type for transport writes.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying device or socket rejected the write.
    #[error("serial write failed: {0}")]
    Write(#[from] std::io::Error),

    /// The reader side has gone away (device unplugged, socket closed).
    #[error("serial transport is closed")]
    Closed,
}

/// A byte-oriented, non-blocking serial link.
///
/// Implementations must be `Send` so a driver owning one can be moved into
/// the runtime task.
pub trait SerialTransport: Send {
    /// Number of received bytes that can be read without waiting.
    fn available(&mut self) -> usize;

    /// Pops one received byte, or `None` when the receive buffer is empty.
    fn read_byte(&mut self) -> Option<u8>;

    /// Writes `bytes` to the link.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the bytes could not be handed to the
    /// device.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

impl<T: SerialTransport + ?Sized> SerialTransport for Box<T> {
    fn available(&mut self) -> usize {
        (**self).available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write_all(bytes)
    }
}
