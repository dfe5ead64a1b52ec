//! Application layer: the drivers and the runtime that ticks them.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure types and wire codecs in `appliance_core`) and the infrastructure
//! (serial ports, config files, stdin).
//!
//! Code in this layer:
//!
//! - **Orchestrates** protocol pieces into working drivers (e.g., "run the
//!   KDK handshake, then poll the fan every 15 seconds").
//! - **Depends on abstractions** such as [`appliance_core::SerialTransport`]
//!   rather than real ports, so every driver runs against an in-memory
//!   port in tests.
//! - **Never blocks**: every operation takes the current `Instant` and
//!   returns immediately.
//!
//! # Sub-modules
//!
//! - **`capabilities`**   – The `Pollable`, `SerialClient` and `EntityHost`
//!   interfaces each runtime component is composed from.
//! - **`entity`**         – Entity states, commands and the state event
//!   channel.
//! - **`manage_clients`** – The ordered client registry of a KDK link.
//! - **`kdk`**            – KDK connection manager, link FSM, fan and light.
//! - **`mel`**            – MEL-AC link and air-conditioner driver.
//! - **`scheduler`**      – Per-component `update_interval` bookkeeping.
//! - **`node`**           – The cooperative runtime that owns everything.

pub mod capabilities;
pub mod entity;
pub mod kdk;
pub mod manage_clients;
pub mod mel;
pub mod node;
pub mod scheduler;
