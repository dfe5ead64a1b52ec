//! Infrastructure layer for the appliance node.
//!
//! Contains OS-facing adapters: serial transports, TOML configuration,
//! the build-time assembly of drivers and the stdin command parser.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `appliance_core`, but MUST NOT be imported by the `application` layer
//! (unit tests may borrow the in-memory [`serial::mock`] port).

pub mod assembly;
pub mod console;
pub mod serial;
pub mod storage;
