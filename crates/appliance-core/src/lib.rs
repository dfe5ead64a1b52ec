//! # appliance-core
//!
//! Shared library for the appliance node: the two serial wire protocols, the
//! domain entities the drivers expose, and the byte-transport contract the
//! drivers are written against.
//!
//! It has no dependencies on threads, sockets, files or an async runtime, so
//! everything in here can be exercised from plain unit tests.
//!
//! # Architecture overview (for beginners)
//!
//! The node talks to two families of household appliances over UART links:
//!
//! - **KDK** ceiling fans with an integrated light.  One serial link carries
//!   the state of several logical entities (the fan, the main light and the
//!   night light), so the application keeps a single connection manager per
//!   link and lets every entity register with it.
//! - **MEL-AC** split air conditioners.  Each unit has its own link and its
//!   own driver; nothing is shared.
//!
//! This crate defines:
//!
//! - **`protocol`** – How bytes travel over each link.  Frames are encoded
//!   and checksummed here, and the byte-at-a-time receivers turn a stream of
//!   bytes into typed frames without ever blocking.
//!
//! - **`domain`** – Pure business types: fan, light and climate state,
//!   commands, capability sets, the climate "visual" temperature range and the
//!   colour-temperature conversions.
//!
//! - **`transport`** – The [`SerialTransport`] trait.  The application crate
//!   provides real implementations; tests provide scripted ones.

pub mod domain;
pub mod protocol;
pub mod transport;

// Re-export the most-used types at the crate root so callers can write
// `appliance_core::EntityId` instead of `appliance_core::domain::ids::EntityId`.
pub use domain::capability::CapabilityViolation;
pub use domain::ids::{ConnectionId, EntityId};
pub use domain::visual::{validate_visual, VisualOverride, VisualRange, VisualRangeError};
pub use protocol::error::ProtocolError;
pub use transport::{SerialTransport, TransportError};
