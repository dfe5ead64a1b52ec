//! KDK fan/light serial protocol.
//!
//! # Frame format
//!
//! ```text
//! ┌───────┬─────────┬───────────────┬──────┬────────┬──────────────┬──────────┐
//! │ START │ COUNTER │ COMMAND (LE)  │ 0x00 │ LENGTH │ PAYLOAD      │ CHECKSUM │
//! │ 0x5A  │ 1 byte  │ 2 bytes       │      │ 1 byte │ LENGTH bytes │ 1 byte   │
//! └───────┴─────────┴───────────────┴──────┴────────┴──────────────┴──────────┘
//! ```
//!
//! - The checksum is the two's complement of the byte sum of everything
//!   before it, so summing a whole valid frame yields zero.
//! - Responses carry the request command with bit 15 set and echo the
//!   request's counter byte.
//! - A frame starting with `0x66` instead of `0x5A` is a SYNC emitted by the
//!   device when it powers up.  It means "start the handshake again".
//!
//! # Parameter model
//!
//! The device exposes a table of parameters, each identified by a 16-bit id
//! and holding a fixed number of data bytes.  The module learns the table
//! layout during the handshake and afterwards reads (0x0910) and writes
//! (0x0810) parameter values in batches.  See [`parameter`].

pub mod command;
pub mod frame;
pub mod parameter;
pub mod receiver;

pub use frame::{checksum, decode_frame, KdkFrame};
pub use parameter::{
    DeviceInfo, ParameterDescriptor, ParameterError, ParameterId, ParameterTable, ParameterValue,
    TableId,
};
pub use receiver::{FrameReceiver, Received};
