//! Mock serial port for unit testing.
//!
//! Clones share one buffer pair, so a test can hand one clone to a driver
//! and keep another to inject device bytes and inspect what was written.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use appliance_core::{SerialTransport, TransportError};

#[derive(Default)]
struct Buffers {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

/// A [`SerialTransport`] backed by in-memory buffers.
#[derive(Clone, Default)]
pub struct MockSerialPort {
    buffers: Arc<Mutex<Buffers>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes as if the device had sent them.
    pub fn inject(&self, bytes: &[u8]) {
        self.buffers
            .lock()
            .expect("lock poisoned")
            .rx
            .extend(bytes.iter().copied());
    }

    /// Returns and clears everything written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.buffers.lock().expect("lock poisoned").tx)
    }

    /// Everything written so far, without clearing it.
    pub fn written(&self) -> Vec<u8> {
        self.buffers.lock().expect("lock poisoned").tx.clone()
    }

    /// Bytes injected but not yet read.
    pub fn unread(&self) -> usize {
        self.buffers.lock().expect("lock poisoned").rx.len()
    }
}

impl SerialTransport for MockSerialPort {
    fn available(&mut self) -> usize {
        self.unread()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.buffers.lock().expect("lock poisoned").rx.pop_front()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.buffers
            .lock()
            .expect("lock poisoned")
            .tx
            .extend_from_slice(bytes);
        Ok(())
    }
}
