//! Entities as seen by whoever drives the node: their states, the commands
//! they accept and the channel their state changes are published on.
//!
//! # Entities vs. components (for beginners)
//!
//! A *component* owns a serial link and is ticked by the scheduler (a KDK
//! connection manager, a MEL-AC air conditioner).  An *entity* is one thing
//! a user can see and control (a fan, a light, a climate unit).  One KDK
//! component hosts several entities; a MEL-AC component hosts exactly one.
//!
//! Commands address entities by [`EntityId`]; the node routes them to the
//! component hosting that entity.

use std::fmt;

use appliance_core::domain::climate::{ClimateCall, ClimateState};
use appliance_core::domain::fan::{FanCall, FanState};
use appliance_core::domain::light::{LightCall, LightState};
use appliance_core::protocol::kdk::ParameterError;
use appliance_core::{CapabilityViolation, EntityId};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

/// The kind of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Fan,
    Light,
    Climate,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fan => "fan",
            Self::Light => "light",
            Self::Climate => "climate",
        })
    }
}

/// Identity of one hosted entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
}

/// The published state of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityState {
    Fan(FanState),
    Light(LightState),
    Climate(ClimateState),
}

impl EntityState {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Fan(_) => EntityKind::Fan,
            Self::Light(_) => EntityKind::Light,
            Self::Climate(_) => EntityKind::Climate,
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fan(s) => write!(f, "fan {s}"),
            Self::Light(s) => write!(f, "light {s}"),
            Self::Climate(s) => write!(f, "climate {s}"),
        }
    }
}

/// A command for one entity.  Fields left `None` keep their current value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityCommand {
    Fan(FanCall),
    Light(LightCall),
    Climate(ClimateCall),
}

impl EntityCommand {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Fan(_) => EntityKind::Fan,
            Self::Light(_) => EntityKind::Light,
            Self::Climate(_) => EntityKind::Climate,
        }
    }
}

/// One published state change.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEvent {
    pub entity: EntityId,
    pub state: EntityState,
}

impl fmt::Display for StateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.state)
    }
}

/// Why a command was not accepted.  The device is untouched in every case.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("no entity with id {0}")]
    UnknownEntity(EntityId),

    #[error("connection for {0} is not ready")]
    NotReady(EntityId),

    #[error("{entity} is a {kind}, it does not accept {command} commands")]
    Unsupported {
        entity: EntityId,
        kind: EntityKind,
        command: EntityKind,
    },

    #[error(transparent)]
    Capability(#[from] CapabilityViolation),

    #[error("device rejected the write batch: {0}")]
    Parameter(#[from] ParameterError),
}

// ── Publisher ─────────────────────────────────────────────────────────────────

/// Sending half of the state event channel.
///
/// A publisher created with [`StatePublisher::disconnected`] drops every
/// event, which is what tests and `--check` runs want.
#[derive(Debug, Clone, Default)]
pub struct StatePublisher {
    tx: Option<mpsc::UnboundedSender<StateEvent>>,
}

impl StatePublisher {
    /// Creates a publisher and the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StateEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    pub fn publish(&self, event: StateEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(event).is_err() {
            trace!("state event receiver dropped");
        }
    }
}
