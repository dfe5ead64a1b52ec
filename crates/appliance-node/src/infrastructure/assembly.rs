//! Turns a validated [`NodeConfig`] into a running [`ApplianceNode`].
//!
//! # Build-time registry (for beginners)
//!
//! Fans and lights name their KDK connection by id.  While the node is
//! being built, a [`BuildRegistry`] maps those ids to the connection
//! managers that have been created so far and registers each client with
//! its manager.  Once every client is in place the registry hands the
//! managers over to the node and is dropped; nothing looks connections up
//! by name at run time.
//!
//! ```text
//!   [[kdk]] ceiling ──► KdkConnectionManager("ceiling") ◄── register fan
//!                                                      ◄── register light
//!   [[climate]] ac  ──► MelAirConditioner("ac")
//!                              │
//!                              ▼
//!                       ApplianceNode (KDK managers first, then climates)
//! ```
//!
//! Fans are registered before lights, each in file order.  That is also
//! the order their state is published in after a poll.

use appliance_core::domain::serial::UartSettings;
use appliance_core::{ConnectionId, SerialTransport};
use thiserror::Error;
use tracing::info;

use super::serial::{open_transport, OpenError};
use super::storage::config::NodeConfig;
use crate::application::entity::StatePublisher;
use crate::application::kdk::connection::KdkConnectionManager;
use crate::application::kdk::fan::KdkFan;
use crate::application::kdk::light::KdkLight;
use crate::application::kdk::KdkClient;
use crate::application::manage_clients::RegistrationError;
use crate::application::mel::MelAirConditioner;
use crate::application::node::ApplianceNode;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{owner}: {source}")]
    Transport {
        owner: String,
        #[source]
        source: OpenError,
    },

    #[error("unknown KDK connection '{0}'")]
    UnknownConnection(ConnectionId),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// Opens the serial link for a port string from the configuration, with
/// the line settings of the component that owns it.
pub trait TransportFactory {
    /// # Errors
    ///
    /// Returns [`OpenError`] if the link cannot be opened.
    fn open(
        &mut self,
        port: &str,
        uart: &UartSettings,
    ) -> Result<Box<dyn SerialTransport>, OpenError>;
}

/// Opens real devices and TCP bridges.
#[derive(Debug, Default)]
pub struct SerialPorts;

impl TransportFactory for SerialPorts {
    fn open(
        &mut self,
        port: &str,
        uart: &UartSettings,
    ) -> Result<Box<dyn SerialTransport>, OpenError> {
        open_transport(port, uart)
    }
}

impl<F> TransportFactory for F
where
    F: FnMut(&str, &UartSettings) -> Result<Box<dyn SerialTransport>, OpenError>,
{
    fn open(
        &mut self,
        port: &str,
        uart: &UartSettings,
    ) -> Result<Box<dyn SerialTransport>, OpenError> {
        self(port, uart)
    }
}

/// Connection managers under construction, looked up by id.
#[derive(Default)]
pub struct BuildRegistry {
    managers: Vec<KdkConnectionManager>,
}

impl BuildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(&mut self, manager: KdkConnectionManager) {
        self.managers.push(manager);
    }

    /// Registers `client` with the manager of `connection`.
    ///
    /// # Errors
    ///
    /// - [`BuildError::UnknownConnection`] if no manager has that id.
    /// - [`BuildError::Registration`] if the manager refuses the client.
    pub fn register_client(
        &mut self,
        connection: &ConnectionId,
        client: Box<dyn KdkClient>,
    ) -> Result<(), BuildError> {
        let manager = self
            .managers
            .iter_mut()
            .find(|m| m.id() == connection)
            .ok_or_else(|| BuildError::UnknownConnection(connection.clone()))?;
        manager.register_client(client)?;
        Ok(())
    }

    /// Ends the build phase.
    pub fn into_managers(self) -> Vec<KdkConnectionManager> {
        self.managers
    }
}

/// Builds every driver in `config` and adds it to a new node.
///
/// # Errors
///
/// Returns [`BuildError`] if a serial link cannot be opened or a client
/// cannot be registered.
pub fn assemble(
    config: &NodeConfig,
    factory: &mut dyn TransportFactory,
    publisher: StatePublisher,
) -> Result<ApplianceNode, BuildError> {
    let mut registry = BuildRegistry::new();
    for kdk in &config.connections {
        let transport = factory
            .open(&kdk.port, &kdk.settings.uart)
            .map_err(|source| BuildError::Transport {
            owner: kdk.id.to_string(),
            source,
        })?;
        registry.add_connection(KdkConnectionManager::new(
            kdk.id.clone(),
            kdk.settings.clone(),
            transport,
        ));
    }

    for fan in &config.fans {
        registry.register_client(&fan.connection, Box::new(KdkFan::new(fan.settings.clone())))?;
    }
    for light in &config.lights {
        registry.register_client(
            &light.connection,
            Box::new(KdkLight::new(light.settings.clone())),
        )?;
    }

    let mut node = ApplianceNode::new(publisher);
    for manager in registry.into_managers() {
        node.add(Box::new(manager));
    }

    for climate in &config.climates {
        let transport = factory
            .open(&climate.port, &climate.settings.uart)
            .map_err(|source| BuildError::Transport {
                owner: climate.settings.id.to_string(),
                source,
            })?;
        node.add(Box::new(MelAirConditioner::new(
            climate.settings.clone(),
            transport,
        )));
    }

    info!(
        "assembled {} component(s) hosting {} entities",
        node.len(),
        node.entities().len()
    );
    Ok(node)
}
