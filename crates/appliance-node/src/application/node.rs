//! ApplianceNode: the cooperative runtime that owns every component.
//!
//! # One pass of the main loop (for beginners)
//!
//! ```text
//!   binary                              ApplianceNode
//!   ──────                              ─────────────
//!   sleep until next_deadline() ──────►
//!   poll(now) ────────────────────────► for each slot in order:
//!                                          due? → component.update(now)
//!                                          events → StatePublisher
//!   stdin line → dispatch(entity, cmd) ─► find the host of `entity`
//!                                          → component.control(..)
//! ```
//!
//! Everything runs on one task.  Components never block, so a slow device
//! only ever costs its own slot a timeout; it never delays the others.

use std::time::Instant;

use appliance_core::EntityId;
use tracing::{debug, info, warn};

use super::capabilities::Component;
use super::entity::{CommandError, EntityCommand, EntityInfo, StatePublisher};
use super::scheduler::Scheduled;

pub struct ApplianceNode {
    slots: Vec<Scheduled<Box<dyn Component>>>,
    publisher: StatePublisher,
    started: bool,
}

impl ApplianceNode {
    pub fn new(publisher: StatePublisher) -> Self {
        Self {
            slots: Vec::new(),
            publisher,
            started: false,
        }
    }

    /// Adds a component.  Components are updated in the order they were
    /// added.
    pub fn add(&mut self, component: Box<dyn Component>) {
        self.slots.push(Scheduled::new(component));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Logs every component's configuration, checks its UART settings and
    /// makes it due immediately.
    ///
    /// Returns the number of components whose UART settings do not match
    /// what their protocol needs.
    pub fn start(&mut self, now: Instant) -> usize {
        let mut mismatched = 0;
        for slot in &mut self.slots {
            let component = slot.component();
            component.dump_config();
            if !component.check_uart_settings(component.name()) {
                mismatched += 1;
            }
            slot.start(now);
        }
        self.started = true;
        info!("node started with {} component(s)", self.slots.len());
        mismatched
    }

    /// Runs every slot that is due at `now` and publishes the resulting
    /// state changes.  Returns how many events were published.
    pub fn poll(&mut self, now: Instant) -> usize {
        let mut published = 0;
        for slot in &mut self.slots {
            let Some(events) = slot.poll(now) else {
                continue;
            };
            for event in events {
                debug!("publish {event}");
                self.publisher.publish(event);
                published += 1;
            }
        }
        published
    }

    /// The earliest time any slot is due, or `None` before [`start`].
    ///
    /// [`start`]: ApplianceNode::start
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().filter_map(Scheduled::next_due).min()
    }

    /// Routes `command` to the component hosting `entity`.
    ///
    /// # Errors
    ///
    /// [`CommandError::UnknownEntity`] if no component hosts `entity`,
    /// otherwise whatever the component rejects the command with.
    pub fn dispatch(
        &mut self,
        entity: &EntityId,
        command: &EntityCommand,
        now: Instant,
    ) -> Result<(), CommandError> {
        let host = self.slots.iter_mut().find(|slot| {
            slot.component()
                .entities()
                .iter()
                .any(|info| &info.id == entity)
        });
        let Some(host) = host else {
            warn!("command for unknown entity {entity}");
            return Err(CommandError::UnknownEntity(entity.clone()));
        };
        host.component_mut().control(entity, command, now)
    }

    /// Every entity on the node, in component order.
    pub fn entities(&self) -> Vec<EntityInfo> {
        self.slots
            .iter()
            .flat_map(|slot| slot.component().entities())
            .collect()
    }
}
