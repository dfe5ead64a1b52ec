//! Capability interfaces every runtime component is composed from.
//!
//! # Why several small traits? (for beginners)
//!
//! A KDK connection manager and a MEL-AC air conditioner have little in
//! common internally, but the node needs three things from both:
//!
//! - **`Pollable`**    – "tick me every `update_interval`".
//! - **`SerialClient`** – "this is the UART I expect, check it at start-up".
//! - **`EntityHost`**  – "these are my entities, route their commands to me".
//!
//! Keeping the three apart lets each be tested on its own: the scheduler
//! tests only need a `Pollable`, the settings check only a `SerialClient`.
//! [`Component`] is simply "all three at once" and is what the node stores.

use std::time::{Duration, Instant};

use appliance_core::domain::serial::{SerialRequirements, UartSettings};
use appliance_core::EntityId;
use tracing::{error, info};

use super::entity::{CommandError, EntityCommand, EntityInfo, StateEvent};

/// A component driven by the periodic scheduler.
pub trait Pollable {
    /// Name used in log lines.
    fn name(&self) -> &str;

    /// How often [`Pollable::update`] should run.
    fn update_interval(&self) -> Duration;

    /// Runs once before the first update.
    fn setup(&mut self, _now: Instant) {}

    /// One tick.  Never blocks; returns the state changes it produced.
    fn update(&mut self, now: Instant) -> Vec<StateEvent>;

    /// Logs the effective configuration.
    fn dump_config(&self);
}

impl<T: Pollable + ?Sized> Pollable for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn update_interval(&self) -> Duration {
        (**self).update_interval()
    }

    fn setup(&mut self, now: Instant) {
        (**self).setup(now)
    }

    fn update(&mut self, now: Instant) -> Vec<StateEvent> {
        (**self).update(now)
    }

    fn dump_config(&self) {
        (**self).dump_config()
    }
}

/// A component that owns a serial link with fixed framing requirements.
pub trait SerialClient {
    fn serial_requirements(&self) -> SerialRequirements;

    fn uart_settings(&self) -> &UartSettings;

    /// Logs every way the configured UART differs from what the protocol
    /// needs.  Returns `true` when the settings match.
    ///
    /// Some appliances tolerate other settings, so a mismatch is reported
    /// rather than treated as fatal.
    fn check_uart_settings(&self, name: &str) -> bool {
        let settings = self.uart_settings();
        let mismatches = self.serial_requirements().check(settings);
        if mismatches.is_empty() {
            info!("{name}: UART {settings}");
            return true;
        }
        for mismatch in &mismatches {
            error!("{name}: {mismatch}");
        }
        false
    }
}

/// A component hosting user-visible entities.
pub trait EntityHost {
    fn entities(&self) -> Vec<EntityInfo>;

    /// Applies `command` to `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the entity is unknown here, the link is
    /// not ready, or the command is outside the entity's capabilities.
    fn control(
        &mut self,
        entity: &EntityId,
        command: &EntityCommand,
        now: Instant,
    ) -> Result<(), CommandError>;
}

/// Everything the node needs from a component.
pub trait Component: Pollable + SerialClient + EntityHost + Send {}

impl<T: Pollable + SerialClient + EntityHost + Send> Component for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use appliance_core::domain::serial::Parity;

    struct FixedUart(UartSettings);

    impl SerialClient for FixedUart {
        fn serial_requirements(&self) -> SerialRequirements {
            SerialRequirements::MEL_AC
        }

        fn uart_settings(&self) -> &UartSettings {
            &self.0
        }
    }

    #[test]
    fn test_matching_settings_pass_check() {
        let client = FixedUart(UartSettings {
            baud_rate: 2400,
            ..UartSettings::default()
        });
        assert!(client.check_uart_settings("ac"));
    }

    #[test]
    fn test_wrong_parity_fails_check() {
        let client = FixedUart(UartSettings {
            parity: Parity::None,
            ..UartSettings::default()
        });
        assert!(!client.check_uart_settings("ac"));
    }
}
