//! ChannelTransport: a blocking byte source turned into a non-blocking
//! [`SerialTransport`].
//!
//! # How it works (for beginners)
//!
//! ```text
//!   device / socket ──read()──► reader thread ──mpsc──► VecDeque ──► driver tick
//!                                                           ▲
//!                                      available() drains ──┘ without waiting
//! ```
//!
//! A dedicated thread sits in the blocking `read()` and forwards whatever
//! arrives over a channel.  The driver's tick only ever calls `try_recv`,
//! so the cooperative scheduler never waits on the device.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use appliance_core::{SerialTransport, TransportError};
use tracing::{debug, warn};

const READ_CHUNK: usize = 256;

pub struct ChannelTransport {
    name: String,
    writer: Box<dyn Write + Send>,
    rx: Receiver<Vec<u8>>,
    buffer: VecDeque<u8>,
    closed: bool,
}

impl ChannelTransport {
    /// Spawns the reader thread for `reader`; bytes are written to `writer`.
    pub fn spawn<R>(
        name: impl Into<String>,
        mut reader: R,
        writer: Box<dyn Write + Send>,
    ) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let thread_name = format!("serial-{name}");
        let log_name = name.clone();

        thread::Builder::new().name(thread_name).spawn(move || {
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) => {
                        debug!("{log_name}: end of stream");
                        break;
                    }
                    Ok(n) => {
                        if tx.send(chunk[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    // Devices are opened with a read timeout; a quiet line is not an error.
                    Err(e)
                        if matches!(
                            e.kind(),
                            std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
                        ) => {}
                    Err(e) => {
                        warn!("{log_name}: read failed: {e}");
                        break;
                    }
                }
            }
        })?;

        Ok(Self {
            name,
            writer,
            rx,
            buffer: VecDeque::new(),
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` once the reader thread has exited.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(bytes) => self.buffer.extend(bytes),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        warn!("{}: reader has stopped", self.name);
                    }
                    self.closed = true;
                    break;
                }
            }
        }
    }
}

impl SerialTransport for ChannelTransport {
    fn available(&mut self) -> usize {
        self.drain();
        self.buffer.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.buffer.is_empty() {
            self.drain();
        }
        self.buffer.pop_front()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }
}
