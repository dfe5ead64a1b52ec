//! Per-component update cadence for the cooperative scheduler.
//!
//! Every component is wrapped in a [`Scheduled`] slot that remembers when it
//! is next due.  The node asks each slot "are you due at `now`?" and, when
//! idle, sleeps until the earliest [`Scheduled::next_due`].
//!
//! A slot that falls behind (the process was suspended, a tick ran long)
//! does not try to catch up with a burst of back-to-back ticks; it simply
//! runs once and is next due one interval later.

use std::time::{Duration, Instant};

use tracing::trace;

use super::capabilities::Pollable;
use super::entity::StateEvent;

/// A component plus the time its next update is due.
#[derive(Debug)]
pub struct Scheduled<P> {
    component: P,
    interval: Duration,
    next_due: Option<Instant>,
}

impl<P: Pollable> Scheduled<P> {
    pub fn new(component: P) -> Self {
        let interval = component.update_interval();
        Self {
            component,
            interval,
            next_due: None,
        }
    }

    /// Runs the component's setup and makes it due immediately.
    pub fn start(&mut self, now: Instant) {
        self.component.setup(now);
        self.next_due = Some(now);
    }

    pub fn is_started(&self) -> bool {
        self.next_due.is_some()
    }

    /// Runs one update if the slot is due.  Returns `None` when it was not.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<StateEvent>> {
        let due = self.next_due?;
        if now < due {
            return None;
        }

        let behind = due + self.interval <= now;
        self.next_due = Some(if behind { now + self.interval } else { due + self.interval });
        if behind {
            trace!(
                "{}: running {:?} behind schedule",
                self.component.name(),
                now - due
            );
        }

        Some(self.component.update(now))
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn component(&self) -> &P {
        &self.component
    }

    pub fn component_mut(&mut self) -> &mut P {
        &mut self.component
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        updates: Vec<Instant>,
    }

    impl Pollable for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn update_interval(&self) -> Duration {
            Duration::from_millis(100)
        }

        fn update(&mut self, now: Instant) -> Vec<StateEvent> {
            self.updates.push(now);
            Vec::new()
        }

        fn dump_config(&self) {}
    }

    fn slot() -> Scheduled<Counter> {
        Scheduled::new(Counter {
            updates: Vec::new(),
        })
    }

    #[test]
    fn test_unstarted_slot_never_runs() {
        let mut slot = slot();
        assert!(slot.poll(Instant::now()).is_none());
        assert!(slot.next_due().is_none());
    }

    #[test]
    fn test_started_slot_runs_immediately_then_waits_one_interval() {
        // Arrange
        let t0 = Instant::now();
        let mut slot = slot();
        slot.start(t0);

        // Act
        let first = slot.poll(t0);
        let early = slot.poll(t0 + Duration::from_millis(50));
        let second = slot.poll(t0 + Duration::from_millis(100));

        // Assert
        assert!(first.is_some());
        assert!(early.is_none());
        assert!(second.is_some());
        assert_eq!(slot.component().updates.len(), 2);
    }

    #[test]
    fn test_slot_keeps_cadence_when_polled_slightly_late() {
        let t0 = Instant::now();
        let mut slot = slot();
        slot.start(t0);
        slot.poll(t0);

        slot.poll(t0 + Duration::from_millis(130));

        assert_eq!(slot.next_due(), Some(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn test_slot_far_behind_runs_once_and_reschedules_from_now() {
        // Arrange
        let t0 = Instant::now();
        let mut slot = slot();
        slot.start(t0);
        slot.poll(t0);
        let late = t0 + Duration::from_secs(5);

        // Act
        let ran = slot.poll(late);
        let again = slot.poll(late);

        // Assert
        assert!(ran.is_some());
        assert!(again.is_none());
        assert_eq!(slot.next_due(), Some(late + Duration::from_millis(100)));
    }
}
