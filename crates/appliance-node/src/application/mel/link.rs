//! Request/response plumbing for one MEL-AC UART.
//!
//! The unit only ever answers the node, so at most one request is in
//! flight.  After [`MelLink::send`] the link is *busy* until either a
//! complete frame arrives or [`RECEIVE_TIMEOUT`] passes.  The driver looks
//! at the outcome once the link is idle again.

use std::time::Instant;

use appliance_core::protocol::mel::frame::RECEIVE_TIMEOUT;
use appliance_core::protocol::mel::{encode_request, FrameReceiver, MelFrame};
use appliance_core::protocol::HexBytes;
use appliance_core::{ProtocolError, SerialTransport};
use tracing::{error, trace, warn};

pub struct MelLink {
    name: String,
    transport: Box<dyn SerialTransport>,
    receiver: FrameReceiver,
    busy: bool,
    sent_at: Option<Instant>,
    timed_out: bool,
    response: Option<MelFrame>,
}

impl MelLink {
    pub fn new(name: impl Into<String>, transport: Box<dyn SerialTransport>) -> Self {
        Self {
            name: name.into(),
            transport,
            receiver: FrameReceiver::new(),
            busy: false,
            sent_at: None,
            timed_out: false,
            response: None,
        }
    }

    /// `true` while a request waits for its response.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// `true` if the last request went unanswered.
    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Takes the response to the last request, if one arrived.
    pub fn take_response(&mut self) -> Option<MelFrame> {
        self.response.take()
    }

    /// Sends a request.  The previous outcome is discarded.
    pub fn send(&mut self, flags: u8, payload: &[u8], now: Instant) {
        self.receiver.reset();
        self.timed_out = false;
        self.response = None;

        let bytes = match encode_request(flags, payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("{}: cannot encode request: {e}", self.name);
                return;
            }
        };
        trace!("{}: TX> {}", self.name, HexBytes(&bytes));
        if let Err(e) = self.transport.write_all(&bytes) {
            warn!("{}: {e}", self.name);
        }
        self.busy = true;
        self.sent_at = Some(now);
    }

    /// Checks the deadline and consumes every byte that has arrived.
    ///
    /// Returns the error that made a frame unusable, if any.
    pub fn tick(&mut self, now: Instant) -> Option<ProtocolError> {
        let mut fault = None;

        if self.busy {
            if let Some(sent_at) = self.sent_at {
                let waited = now.saturating_duration_since(sent_at);
                if waited > RECEIVE_TIMEOUT {
                    self.busy = false;
                    self.timed_out = true;
                    fault = Some(ProtocolError::Timeout { waited });
                }
            }
        }

        while self.transport.available() > 0 {
            let Some(byte) = self.transport.read_byte() else {
                break;
            };
            match self.receiver.push(byte, now) {
                Ok(Some(frame)) => {
                    self.busy = false;
                    self.response = Some(frame);
                }
                Ok(None) => {}
                Err(ProtocolError::InvalidStart(byte)) => {
                    trace!("{}: RX> noise 0x{byte:02X}", self.name);
                }
                Err(e) => {
                    warn!("{}: {e}", self.name);
                    fault = Some(e);
                }
            }
        }

        fault
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::infrastructure::serial::mock::MockSerialPort;
    use appliance_core::protocol::mel::frame::flags;

    fn link(port: &MockSerialPort) -> MelLink {
        MelLink::new("ac", Box::new(port.clone()))
    }

    #[test]
    fn test_send_marks_link_busy_and_writes_frame() {
        // Arrange
        let port = MockSerialPort::new();
        let mut link = link(&port);

        // Act
        link.send(flags::CONNECT, &[0xCA, 0x01], Instant::now());

        // Assert
        assert!(link.is_busy());
        assert_eq!(
            port.take_written(),
            vec![0xFC, 0x5A, 0x01, 0x30, 0x02, 0xCA, 0x01, 0xA8]
        );
    }

    #[test]
    fn test_complete_response_clears_busy() {
        let port = MockSerialPort::new();
        let mut link = link(&port);
        let t0 = Instant::now();
        link.send(flags::GET, &[0x02; 16], t0);
        port.inject(&encode_request(flags::IN | flags::GET, &[0x02; 16]).expect("encode"));

        let fault = link.tick(t0 + Duration::from_millis(50));

        assert_eq!(fault, None);
        assert!(!link.is_busy());
        assert!(!link.is_timed_out());
        assert_eq!(link.take_response().and_then(|f| f.kind()), Some(0x02));
    }

    #[test]
    fn test_silence_past_deadline_times_out() {
        let port = MockSerialPort::new();
        let mut link = link(&port);
        let t0 = Instant::now();
        link.send(flags::GET, &[0x02; 16], t0);

        assert_eq!(link.tick(t0 + RECEIVE_TIMEOUT), None);
        let fault = link.tick(t0 + RECEIVE_TIMEOUT + Duration::from_millis(1));

        assert!(fault.is_some_and(|e| e.is_timeout()));
        assert!(!link.is_busy());
        assert!(link.is_timed_out());
        assert_eq!(link.take_response(), None);
    }

    #[test]
    fn test_corrupted_frame_is_reported_and_link_stays_busy() {
        let port = MockSerialPort::new();
        let mut link = link(&port);
        let t0 = Instant::now();
        link.send(flags::GET, &[0x02; 16], t0);
        let mut bytes = encode_request(flags::IN | flags::GET, &[0x02; 16]).expect("encode");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        port.inject(&bytes);

        let fault = link.tick(t0);

        assert!(matches!(fault, Some(ProtocolError::ChecksumMismatch { .. })));
        assert!(link.is_busy());
    }
}
