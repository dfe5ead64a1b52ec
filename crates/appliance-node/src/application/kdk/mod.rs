//! KDK ceiling fan/light support.
//!
//! One KDK appliance exposes a fan and up to two lights over a single UART.
//! The [`connection::KdkConnectionManager`] owns that UART, runs the
//! handshake and polling state machine in [`fsm`], and mirrors the device's
//! parameter table.  Fan and light drivers are [`KdkClient`]s registered
//! with the manager: they read raw parameter bytes from the table and hand
//! back batches of bytes to write.

pub mod connection;
pub mod fan;
pub mod fsm;
pub mod light;

use std::time::Instant;

use appliance_core::protocol::kdk::{ParameterId, ParameterTable, ParameterValue};
use appliance_core::EntityId;

use super::entity::{CommandError, EntityCommand, EntityKind, EntityState};

/// An entity driver multiplexed over a KDK connection.
pub trait KdkClient: Send {
    fn id(&self) -> &EntityId;

    fn name(&self) -> &str;

    fn kind(&self) -> EntityKind;

    /// Parameters whose change should wake this client.
    fn watched_parameters(&self) -> &[ParameterId];

    /// Re-reads the client's parameters after a poll.  Returns the new state
    /// when it changed.
    fn on_parameter_update(&mut self, table: &ParameterTable, now: Instant) -> Option<EntityState>;

    /// Works out the parameter values a command writes.  The client itself
    /// is left untouched until [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if the command is of the wrong kind or
    /// outside the client's capabilities.
    fn plan(
        &self,
        command: &EntityCommand,
        now: Instant,
    ) -> Result<Vec<ParameterValue>, CommandError>;

    /// Adopts a command whose values have been queued for writing.  Only
    /// called after [`plan`](Self::plan) accepted the same command.
    fn commit(&mut self, command: &EntityCommand, now: Instant);

    /// Values for the next step of a running transition, if one is due.
    fn transition_step(&mut self, _now: Instant) -> Option<Vec<ParameterValue>> {
        None
    }

    /// Last published state.
    fn state(&self) -> EntityState;

    fn dump_config(&self) {}
}
