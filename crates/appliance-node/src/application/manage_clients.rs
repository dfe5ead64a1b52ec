//! ClientRegistry: the ordered set of entities sharing one KDK connection.
//!
//! # Registration lifecycle (for beginners)
//!
//! ```text
//!   build time                         run time
//!   ──────────                         ────────
//!   register(fan)    ─┐
//!   register(light)  ─┼─►  seal()  ──►  iterate in registration order
//!   register(night)  ─┘                 (no more registrations)
//! ```
//!
//! Clients are registered while the node is being assembled.  Once the
//! connection starts ticking the registry is sealed: it is only ever read
//! after that, so dispatch order is fixed and no locking is needed.
//!
//! A `Vec` rather than a map keeps registration order, which is the order
//! clients are notified in when one poll response touches several of them.

use appliance_core::{ConnectionId, EntityId};
use thiserror::Error;

use super::entity::EntityInfo;
use super::kdk::KdkClient;

/// Why a client could not be registered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("cannot register {client}: connection {connection} has already started")]
    AlreadyStarted {
        connection: ConnectionId,
        client: EntityId,
    },

    #[error("{client} is already registered with connection {connection}")]
    DuplicateIdentity {
        connection: ConnectionId,
        client: EntityId,
    },
}

/// Ordered registry of the clients of one connection.
pub struct ClientRegistry {
    connection: ConnectionId,
    clients: Vec<Box<dyn KdkClient>>,
    sealed: bool,
}

impl ClientRegistry {
    pub fn new(connection: ConnectionId) -> Self {
        Self {
            connection,
            clients: Vec::new(),
            sealed: false,
        }
    }

    /// Appends a client.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::AlreadyStarted`] once the registry is sealed.
    /// - [`RegistrationError::DuplicateIdentity`] if a client with the same
    ///   id is already registered.
    pub fn register(&mut self, client: Box<dyn KdkClient>) -> Result<(), RegistrationError> {
        if self.sealed {
            return Err(RegistrationError::AlreadyStarted {
                connection: self.connection.clone(),
                client: client.id().clone(),
            });
        }
        if self.contains(client.id()) {
            return Err(RegistrationError::DuplicateIdentity {
                connection: self.connection.clone(),
                client: client.id().clone(),
            });
        }
        self.clients.push(client);
        Ok(())
    }

    /// Ends the registration phase.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.clients.iter().any(|c| c.id() == id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Clients in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn KdkClient> {
        self.clients.iter().map(|c| c.as_ref())
    }

    /// Mutable clients in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn KdkClient>> {
        self.clients.iter_mut()
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Box<dyn KdkClient>> {
        self.clients.iter_mut().find(|c| c.id() == id)
    }

    pub fn infos(&self) -> Vec<EntityInfo> {
        self.iter()
            .map(|c| EntityInfo {
                id: c.id().clone(),
                name: c.name().to_string(),
                kind: c.kind(),
            })
            .collect()
    }
}
