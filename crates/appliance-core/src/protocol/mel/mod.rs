//! MEL-AC air-conditioner serial protocol.
//!
//! # Frame format
//!
//! ```text
//! ┌───────┬───────┬───────────┬───────────┬────────┬──────────────┬──────────┐
//! │ START │ FLAGS │ VER MAJOR │ VER MINOR │ LENGTH │ PAYLOAD      │ CHECKSUM │
//! │ 0xFC  │       │ 0x01      │ 0x30      │        │ LENGTH bytes │          │
//! └───────┴───────┴───────────┴───────────┴────────┴──────────────┴──────────┘
//! ```
//!
//! The first payload byte is the message type (see [`message::kind`]); the
//! checksum is `0xFC` minus the byte sum of everything before it.
//!
//! Unlike KDK there is no counter and no parameter table: the unit answers
//! each request with one fixed-layout payload and the module simply asks
//! again if nothing arrives.

pub mod frame;
pub mod message;

pub use frame::{decode_frame, encode_request, FrameReceiver, MelFrame};
pub use message::{
    FanSpeed, Mode, ParamsReport, Power, SetParams, StatusReport, TemperatureEncoding,
    VaneHorizontal, VaneVertical,
};
