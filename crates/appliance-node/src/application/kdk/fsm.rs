//! The KDK link state machine.
//!
//! # States (for beginners)
//!
//! ```text
//!  UNINITIALIZED ──SYNC_TIMEOUT / SYNC_RECEIVED──► INIT_SYNC ──SYNC_OK──► INIT_0C00
//!                                                                            │
//!     ┌──────────────────── RESPONSE_RECEIVED, one handshake step each ─────┘
//!     ▼
//!  INIT_1000 → INIT_1100 → INIT_1200 → INIT_4100 → INIT_4C01 → INIT_0010
//!  → INIT_0110 → INIT_0210 → INIT_1800 → INIT_0001_10 → INIT_0001_11
//!  → INIT_0910 → INIT_DONE ──INIT_DONE──► PULL_STATES ──RESPONSE──► IDLE
//!                                              ▲                    │
//!                                              │   PULL_STATES      │
//!                                              └────────────────────┤
//!                                                                   │ PUSH_STATES
//!                                         PUSH_STATES ◄─────────────┘
//!                                   (RESPONSE / PUSH_ABORTED → IDLE, then pull)
//! ```
//!
//! `SYNC_RECEIVED` (the device rebooted) and `SYNC_RECOVERY` (a request
//! went unanswered five times) restart the handshake from any state.
//!
//! This module only decides *where* an event leads.  What each state does
//! on entry, on every tick and on exit lives in the connection manager.

use std::fmt;

/// Position of the link in the handshake and polling cycle.
///
/// The order of the variants matters: every state from
/// [`LinkState::InitDone`] on counts as ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkState {
    Uninitialized,
    InitSync,
    Init0C00,
    Init1000,
    Init1100,
    Init1200,
    Init4100,
    Init4C01,
    Init0010,
    Init0110,
    Init0210,
    Init1800,
    Init0001Status10,
    Init0001Status11,
    Init0910,
    InitDone,
    Idle,
    PullStates,
    PushStates,
}

impl LinkState {
    /// `true` once the handshake has completed.
    pub fn is_ready(self) -> bool {
        self >= Self::InitDone
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::InitSync => "INIT_SYNC",
            Self::Init0C00 => "INIT_0C00",
            Self::Init1000 => "INIT_1000",
            Self::Init1100 => "INIT_1100",
            Self::Init1200 => "INIT_1200",
            Self::Init4100 => "INIT_4100",
            Self::Init4C01 => "INIT_4C01",
            Self::Init0010 => "INIT_0010",
            Self::Init0110 => "INIT_0110",
            Self::Init0210 => "INIT_0210",
            Self::Init1800 => "INIT_1800",
            Self::Init0001Status10 => "INIT_0001_10",
            Self::Init0001Status11 => "INIT_0001_11",
            Self::Init0910 => "INIT_0910",
            Self::InitDone => "INIT_DONE",
            Self::Idle => "IDLE",
            Self::PullStates => "PULL_STATES_0910",
            Self::PushStates => "PUSH_STATES_0810",
        })
    }
}

/// Something that happened on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The device sent its power-up SYNC marker.
    SyncReceived,
    /// The posted SYNC request went out.
    SyncOk,
    /// No SYNC arrived within the start-up wait.
    SyncTimeout,
    /// Retransmissions were exhausted.
    SyncRecovery,
    /// The response to the outstanding request arrived.
    ResponseReceived,
    InitDone,
    PullStates,
    PushStates,
    /// The pending write batch no longer matches the table.
    PushAborted,
}

impl fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SyncReceived => "SYNC_RECEIVED",
            Self::SyncOk => "SYNC_OK",
            Self::SyncTimeout => "SYNC_TIMEOUT",
            Self::SyncRecovery => "SYNC_RECOVERY",
            Self::ResponseReceived => "RESPONSE_RECEIVED",
            Self::InitDone => "INIT_DONE",
            Self::PullStates => "PULL_STATES",
            Self::PushStates => "PUSH_STATES",
            Self::PushAborted => "PUSH_ABORTED",
        })
    }
}

/// The state `event` leads to from `state`, or `None` if the event means
/// nothing there.
pub fn next_state(state: LinkState, event: LinkEvent) -> Option<LinkState> {
    use LinkEvent as E;
    use LinkState as S;

    if matches!(event, E::SyncReceived | E::SyncRecovery) {
        return Some(S::InitSync);
    }

    let next = match (state, event) {
        (S::Uninitialized, E::SyncTimeout) => S::InitSync,
        (S::InitSync, E::SyncOk) => S::Init0C00,
        (S::Init0C00, E::ResponseReceived) => S::Init1000,
        (S::Init1000, E::ResponseReceived) => S::Init1100,
        (S::Init1100, E::ResponseReceived) => S::Init1200,
        (S::Init1200, E::ResponseReceived) => S::Init4100,
        (S::Init4100, E::ResponseReceived) => S::Init4C01,
        (S::Init4C01, E::ResponseReceived) => S::Init0010,
        (S::Init0010, E::ResponseReceived) => S::Init0110,
        (S::Init0110, E::ResponseReceived) => S::Init0210,
        (S::Init0210, E::ResponseReceived) => S::Init1800,
        (S::Init1800, E::ResponseReceived) => S::Init0001Status10,
        (S::Init0001Status10, E::ResponseReceived) => S::Init0001Status11,
        (S::Init0001Status11, E::ResponseReceived) => S::Init0910,
        (S::Init0910, E::ResponseReceived) => S::InitDone,
        (S::InitDone, E::InitDone) => S::PullStates,
        (S::Idle, E::PullStates) => S::PullStates,
        (S::Idle, E::PushStates) => S::PushStates,
        (S::PullStates, E::ResponseReceived) => S::Idle,
        (S::PushStates, E::ResponseReceived | E::PushAborted) => S::Idle,
        _ => return None,
    };
    Some(next)
}
