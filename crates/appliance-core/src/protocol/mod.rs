//! Wire protocols: frame codecs, byte receivers and message payloads.
//!
//! - [`kdk`] – the fan/light protocol: counter-tagged request/response frames
//!   over a parameter table.
//! - [`mel`] – the air-conditioner protocol: fixed-layout 16-byte payloads.

pub mod error;
pub mod hex;
pub mod kdk;
pub mod mel;
pub mod sequence;

pub use error::ProtocolError;
pub use hex::HexBytes;
pub use sequence::FrameCounter;
