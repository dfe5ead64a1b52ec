//! Frame counter for the KDK request/response protocol.
//!
//! # What is the frame counter? (for beginners)
//!
//! Every KDK request carries a one-byte counter and the device echoes that
//! byte in its response.  Comparing the two lets the link tell a fresh answer
//! apart from a late answer to a request that was already retransmitted.
//!
//! The counter is *pre-incremented*: [`FrameCounter::next`] bumps the value
//! first and then returns it.  After a SYNC from the device the counter is
//! reset to `0xFF`, so the first request of a new session carries `0x00`.
//!
//! Unlike a network sequence number this counter lives inside a single
//! connection manager that is only ever touched from the scheduler, so a
//! plain `u8` is enough; no atomics are needed.

/// Wrapping one-byte request counter.
///
/// # Examples
///
/// ```rust
/// use appliance_core::protocol::FrameCounter;
///
/// let mut counter = FrameCounter::new();
/// assert_eq!(counter.next(), 0x00);
/// assert_eq!(counter.next(), 0x01);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCounter {
    value: u8,
}

impl FrameCounter {
    /// Value the counter holds right after a reset.
    pub const RESET_VALUE: u8 = 0xFF;

    /// Creates a counter whose first [`next`](Self::next) returns `0x00`.
    pub fn new() -> Self {
        Self {
            value: Self::RESET_VALUE,
        }
    }

    /// Increments the counter and returns the new value, wrapping at `0xFF`.
    pub fn next(&mut self) -> u8 {
        self.value = self.value.wrapping_add(1);
        self.value
    }

    /// Returns the value carried by the most recent request.
    pub fn current(&self) -> u8 {
        self.value
    }

    /// Starts a new session.
    pub fn reset(&mut self) {
        self.value = Self::RESET_VALUE;
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}
