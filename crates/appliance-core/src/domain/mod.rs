//! Domain entities: pure business types with no I/O.
//!
//! - [`fan`], [`light`], [`climate`] – entity state, commands ("calls") and
//!   the traits each entity advertises to the host.
//! - [`capability`] – the error raised when a command asks for something an
//!   entity does not support.
//! - [`visual`] – the climate temperature range shown to users, bounded by
//!   what the MEL-AC protocol can express.
//! - [`serial`] – UART settings and the requirements each protocol has on
//!   them.
//! - [`ids`] – typed identifiers for entities and connections.

pub mod capability;
pub mod climate;
pub mod fan;
pub mod ids;
pub mod light;
pub mod serial;
pub mod visual;
