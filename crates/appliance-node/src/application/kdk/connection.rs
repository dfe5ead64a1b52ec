//! KdkConnectionManager: owns one KDK UART and multiplexes it for the fan
//! and light entities registered with it.
//!
//! # One tick (for beginners)
//!
//! ```text
//!   ┌────────────┐   ┌──────────────────┐   ┌──────────┐   ┌───────────────────┐
//!   │ read bytes │ → │ response timeout │ → │ FSM run  │ → │ device requests   │
//!   │ ≤ 1 frame  │   │ retransmit/resync│   │ (fsm.rs) │   │ 0x0101 / 0x0A10   │
//!   └────────────┘   └──────────────────┘   └──────────┘   └───────────────────┘
//! ```
//!
//! The manager never blocks.  "Wait up to `receive_timeout` for a response"
//! is implemented by remembering when the outstanding request was sent and
//! comparing against `now` on every tick.
//!
//! A response is only accepted when it answers the outstanding request:
//! same command and same counter byte.  Anything else is a late answer to a
//! request that was already retransmitted and is dropped.
//!
//! Parameter values reported by the device are stored in the
//! [`ParameterTable`].  When a poll completes, every client watching one of
//! the stored ids is notified, in registration order, and the states they
//! return become [`StateEvent`]s.

use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use appliance_core::domain::serial::{SerialRequirements, UartSettings};
use appliance_core::protocol::kdk::command;
use appliance_core::protocol::kdk::parameter::{
    self, ATTRIBUTE_METADATA, INITIAL_READ_IDS, MAX_REQUEST_IDS, POLL_IDS,
};
use appliance_core::protocol::kdk::{
    DeviceInfo, FrameReceiver, KdkFrame, ParameterId, ParameterTable, ParameterValue, Received,
};
use appliance_core::protocol::{FrameCounter, HexBytes};
use appliance_core::{ConnectionId, EntityId, ProtocolError, SerialTransport};
use tracing::{debug, error, info, trace, warn};

use super::fsm::{next_state, LinkEvent, LinkState};
use super::KdkClient;
use crate::application::capabilities::{EntityHost, Pollable, SerialClient};
use crate::application::entity::{CommandError, EntityCommand, EntityInfo, StateEvent};
use crate::application::manage_clients::{ClientRegistry, RegistrationError};

/// Retransmissions of an unanswered request before the link resynchronises.
pub const MAX_RETRIES: u8 = 5;

/// How long to wait for the device's power-up SYNC before sending our own.
pub const SYNC_WAIT: Duration = Duration::from_secs(10);

// ── Settings ──────────────────────────────────────────────────────────────────

/// Timing policy of one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// How long to wait for a response before retransmitting.
    pub receive_timeout: Duration,
    /// How often parameters are re-read when nothing else is going on.
    pub poll_interval: Duration,
    /// Base tick cadence.
    pub update_interval: Duration,
    /// A gap longer than this between two bytes discards a partial frame.
    pub byte_timeout: Duration,
    pub uart: UartSettings,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_secs(15),
            update_interval: Duration::from_millis(100),
            byte_timeout: Duration::from_millis(100),
            uart: UartSettings::default(),
        }
    }
}

/// What one tick produced.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Entity states that changed during this tick.
    pub events: Vec<StateEvent>,
    /// The fault that cut this tick short, if any.  Never fatal.
    pub error: Option<ProtocolError>,
}

/// The request currently waiting for a response.
#[derive(Debug)]
struct Outstanding {
    command: u16,
    counter: u8,
    encoded: Vec<u8>,
    sent_at: Instant,
    retries: u8,
}

/// `values` added to `pending`; a later value for an id replaces the earlier.
fn merge_values(pending: &[ParameterValue], values: Vec<ParameterValue>) -> Vec<ParameterValue> {
    let mut batch: Vec<ParameterValue> = pending
        .iter()
        .filter(|p| values.iter().all(|v| v.id != p.id))
        .cloned()
        .collect();
    batch.extend(values);
    batch
}

// ── Manager ───────────────────────────────────────────────────────────────────

pub struct KdkConnectionManager {
    id: ConnectionId,
    settings: ConnectionSettings,
    transport: Box<dyn SerialTransport>,

    receiver: FrameReceiver,
    counter: FrameCounter,
    outstanding: Option<Outstanding>,
    /// Last received frame not yet consumed by the FSM or the request handlers.
    pending: Option<KdkFrame>,

    state: LinkState,
    events: VecDeque<LinkEvent>,

    table: ParameterTable,
    device: DeviceInfo,
    pending_update: Vec<ParameterValue>,
    changed: BTreeSet<ParameterId>,

    started_at: Option<Instant>,
    last_pull: Option<Instant>,
    last_ping: Option<Instant>,

    clients: ClientRegistry,
    notifications: Vec<StateEvent>,
    fault: Option<ProtocolError>,
}

impl KdkConnectionManager {
    pub fn new(
        id: ConnectionId,
        settings: ConnectionSettings,
        transport: Box<dyn SerialTransport>,
    ) -> Self {
        let receiver = FrameReceiver::with_byte_timeout(settings.byte_timeout);
        Self {
            clients: ClientRegistry::new(id.clone()),
            id,
            settings,
            transport,
            receiver,
            counter: FrameCounter::new(),
            outstanding: None,
            pending: None,
            state: LinkState::Uninitialized,
            events: VecDeque::new(),
            table: ParameterTable::new(),
            device: DeviceInfo::default(),
            pending_update: Vec::new(),
            changed: BTreeSet::new(),
            started_at: None,
            last_pull: None,
            last_ping: None,
            notifications: Vec::new(),
            fault: None,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Attaches a client.  Only allowed before the first tick.
    ///
    /// # Errors
    ///
    /// See [`ClientRegistry::register`].
    pub fn register_client(&mut self, client: Box<dyn KdkClient>) -> Result<(), RegistrationError> {
        self.clients.register(client)?;
        debug!("{}: registered client {}", self.id, self.clients.len());
        Ok(())
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// `true` once the handshake has completed.
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn table(&self) -> &ParameterTable {
        &self.table
    }

    /// Current bytes of `id`; empty if the device did not declare it.
    pub fn get_parameter_data(&self, id: ParameterId) -> &[u8] {
        self.table.get(id)
    }

    /// Replaces the batch waiting to be written.  It goes out on the next
    /// idle tick.
    pub fn update_parameter_data(&mut self, batch: Vec<ParameterValue>) {
        self.pending_update = batch;
    }

    pub fn has_pending_update(&self) -> bool {
        !self.pending_update.is_empty()
    }

    /// Turns an entity command into a parameter write.
    ///
    /// The client's values are merged into whatever is still waiting to be
    /// written, so two commands in the same tick both reach the device.
    ///
    /// # Errors
    ///
    /// - [`CommandError::UnknownEntity`] if no registered client has that id.
    /// - [`CommandError::NotReady`] before the handshake has completed.
    /// - The client's own [`CommandError`] for a wrong kind or capability.
    /// - [`CommandError::Parameter`] if the device's table cannot take the
    ///   values.  Nothing is queued in that case.
    pub fn control(
        &mut self,
        entity: &EntityId,
        command: &EntityCommand,
        now: Instant,
    ) -> Result<(), CommandError> {
        if !self.clients.contains(entity) {
            return Err(CommandError::UnknownEntity(entity.clone()));
        }
        if !self.is_ready() {
            return Err(CommandError::NotReady(entity.clone()));
        }
        let Some(client) = self.clients.get_mut(entity) else {
            return Err(CommandError::UnknownEntity(entity.clone()));
        };

        // The client only adopts the command once the table accepts its values.
        let batch = merge_values(&self.pending_update, client.plan(command, now)?);
        self.table.prepare_write(&batch)?;
        client.commit(command, now);
        self.update_parameter_data(batch);
        Ok(())
    }

    /// Queues the next step of every running light transition.
    fn advance_transitions(&mut self, now: Instant) {
        if !self.is_ready() {
            return;
        }
        let mut steps = Vec::new();
        for client in self.clients.iter_mut() {
            if let Some(values) = client.transition_step(now) {
                steps.extend(values);
            }
        }
        if steps.is_empty() {
            return;
        }
        let batch = merge_values(&self.pending_update, steps);
        match self.table.prepare_write(&batch) {
            Ok(_) => self.update_parameter_data(batch),
            Err(e) => warn!("{}: dropping transition step: {e}", self.id),
        }
    }

    /// Runs one cycle of the link.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.started_at.get_or_insert(now);

        self.receive(now);
        self.check_response_timeout(now);
        self.advance_transitions(now);
        self.fsm_run(now);
        self.process_message(now);

        TickReport {
            events: std::mem::take(&mut self.notifications),
            error: self.fault.take(),
        }
    }

    // ── Receive ───────────────────────────────────────────────────────────────

    /// Reads bytes until one frame is complete.  Nothing is read while a
    /// previous frame is still unconsumed.
    fn receive(&mut self, now: Instant) {
        while self.pending.is_none() && self.transport.available() > 0 {
            let Some(byte) = self.transport.read_byte() else {
                break;
            };
            match self.receiver.push(byte, now) {
                Ok(Received::Incomplete) => {}
                Ok(Received::Sync) => {
                    info!("{}: SYNC from device", self.id);
                    // The device restarted; nothing outstanding will be answered.
                    self.outstanding = None;
                    self.events.push_back(LinkEvent::SyncReceived);
                    return;
                }
                Ok(Received::Frame(frame)) => {
                    self.accept(frame);
                    return;
                }
                Err(ProtocolError::InvalidStart(b)) => {
                    trace!("{}: RX> noise 0x{b:02X}", self.id);
                }
                Err(e) => {
                    warn!("{}: dropping frame: {e}", self.id);
                    self.fault = Some(e);
                    return;
                }
            }
        }
    }

    fn accept(&mut self, frame: KdkFrame) {
        if !frame.is_response() {
            self.pending = Some(frame);
            return;
        }

        match &self.outstanding {
            Some(out) if out.command == frame.base_command() && out.counter == frame.counter => {
                trace!(
                    "{}: response to {:04X} after {} retries",
                    self.id,
                    out.command,
                    out.retries
                );
                self.outstanding = None;
                self.pending = Some(frame);
            }
            Some(out) => {
                debug!(
                    "{}: stale response {:04X}#{:02X}, waiting for {:04X}#{:02X}",
                    self.id,
                    frame.base_command(),
                    frame.counter,
                    out.command,
                    out.counter
                );
            }
            None => {
                warn!(
                    "{}: unhandled response {:04X} {}",
                    self.id,
                    frame.command,
                    HexBytes(&frame.payload)
                );
            }
        }
    }

    fn check_response_timeout(&mut self, now: Instant) {
        let receive_timeout = self.settings.receive_timeout;
        let Some(out) = self.outstanding.as_mut() else {
            return;
        };
        let waited = now.saturating_duration_since(out.sent_at);
        if waited < receive_timeout {
            return;
        }

        let command = out.command;
        if out.retries < MAX_RETRIES {
            out.retries += 1;
            out.sent_at = now;
            let retries = out.retries;
            let encoded = out.encoded.clone();
            warn!(
                "{}: no response to {command:04X}, retransmitting ({retries}/{MAX_RETRIES})",
                self.id
            );
            self.write(&encoded);
        } else {
            error!(
                "{}: {command:04X} unanswered after {MAX_RETRIES} retries, resynchronising",
                self.id
            );
            self.outstanding = None;
            self.events.push_back(LinkEvent::SyncRecovery);
        }
        self.fault = Some(ProtocolError::Timeout { waited });
    }

    // ── Transmit ──────────────────────────────────────────────────────────────

    fn write(&mut self, bytes: &[u8]) {
        trace!("{}: TX> {}", self.id, HexBytes(bytes));
        if let Err(e) = self.transport.write_all(bytes) {
            warn!("{}: {e}", self.id);
        }
    }

    fn encode(&self, frame: &KdkFrame) -> Option<Vec<u8>> {
        match frame.encode() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!("{}: cannot encode {:04X}: {e}", self.id, frame.command);
                None
            }
        }
    }

    /// Sends a request and waits for its response.
    fn send_request(&mut self, command: u16, payload: Vec<u8>, now: Instant) {
        let counter = self.counter.next();
        let Some(encoded) = self.encode(&KdkFrame::new(counter, command, payload)) else {
            return;
        };
        self.write(&encoded);
        self.outstanding = Some(Outstanding {
            command,
            counter,
            encoded,
            sent_at: now,
            retries: 0,
        });
    }

    /// Sends a request no response is expected for.
    fn post_request(&mut self, command: u16) {
        let counter = self.counter.next();
        if let Some(encoded) = self.encode(&KdkFrame::new(counter, command, Vec::new())) {
            self.write(&encoded);
        }
    }

    /// Answers a device-initiated request.  The outstanding request, if any,
    /// is left alone.
    fn send_reply(&mut self, request: &KdkFrame, payload: Vec<u8>) {
        if let Some(encoded) = self.encode(&request.response_to(payload)) {
            self.write(&encoded);
        }
    }

    // ── State machine ─────────────────────────────────────────────────────────

    fn fsm_run(&mut self, now: Instant) {
        if self.outstanding.is_some() {
            return;
        }

        while let Some(event) = self.events.pop_front() {
            let Some(next) = next_state(self.state, event) else {
                trace!("{}: {event} ignored in {}", self.id, self.state);
                continue;
            };
            debug!("{}: {} --{event}--> {next}", self.id, self.state);
            if next != self.state {
                self.on_exit(self.state, now);
                self.state = next;
            }
            self.on_entry(next, now);
        }

        self.on_loop(self.state, now);
    }

    fn on_entry(&mut self, state: LinkState, now: Instant) {
        use LinkState as S;

        match state {
            S::Uninitialized | S::Idle => {}
            S::InitSync => {
                self.counter.reset();
                self.receiver.reset();
                self.outstanding = None;
                self.pending = None;
                self.post_request(command::SYNC);
            }
            S::Init0C00 => self.send_request(command::HANDSHAKE_0C00, Vec::new(), now),
            S::Init1000 => self.send_request(
                command::HANDSHAKE_1000,
                command::HANDSHAKE_1000_PAYLOAD.to_vec(),
                now,
            ),
            S::Init1100 => self.send_request(
                command::DEVICE_INFO,
                command::DEVICE_INFO_PAYLOAD.to_vec(),
                now,
            ),
            S::Init1200 => self.send_request(
                command::HANDSHAKE_1200,
                command::HANDSHAKE_1200_PAYLOAD.to_vec(),
                now,
            ),
            S::Init4100 => self.send_request(command::HANDSHAKE_4100, Vec::new(), now),
            S::Init4C01 => self.send_request(command::HANDSHAKE_4C01, Vec::new(), now),
            S::Init0010 => self.send_request(command::TABLE_ID, Vec::new(), now),
            S::Init0110 => {
                let payload = parameter::encode_list_request(self.table.id());
                self.send_request(command::PARAMETER_LIST, payload, now);
            }
            S::Init0210 => {
                let mut ids = self.table.ids_with_metadata(ATTRIBUTE_METADATA);
                ids.truncate(MAX_REQUEST_IDS);
                match parameter::encode_attribute_request(self.table.id(), &ids) {
                    Ok(payload) => self.send_request(command::READ_ATTRIBUTES, payload, now),
                    Err(e) => self.abort_handshake(&e.to_string()),
                }
            }
            S::Init1800 => self.send_request(command::HANDSHAKE_1800, Vec::new(), now),
            S::Init0001Status10 => self.send_request(
                command::MODULE_STATUS,
                command::MODULE_STATUS_10_PAYLOAD.to_vec(),
                now,
            ),
            S::Init0001Status11 => self.send_request(
                command::MODULE_STATUS,
                command::MODULE_STATUS_11_PAYLOAD.to_vec(),
                now,
            ),
            S::Init0910 => self.send_read(&INITIAL_READ_IDS, now),
            S::InitDone => {
                info!("{}: module initialized", self.id);
                self.events.push_back(LinkEvent::InitDone);
            }
            S::PullStates => self.send_read(&POLL_IDS, now),
            S::PushStates => {
                let batch = std::mem::take(&mut self.pending_update);
                match self.table.prepare_write(&batch) {
                    Ok(payload) => {
                        // Written ids are handed to their clients after the
                        // read-back even if the device already held the values.
                        self.changed.extend(batch.iter().map(|v| v.id));
                        self.send_request(command::WRITE_PARAMETERS, payload, now);
                    }
                    Err(e) => {
                        warn!("{}: discarding write batch: {e}", self.id);
                        self.events.push_back(LinkEvent::PushAborted);
                    }
                }
            }
        }
    }

    fn on_loop(&mut self, state: LinkState, now: Instant) {
        use LinkState as S;

        match state {
            S::Uninitialized => {
                let waited = self
                    .started_at
                    .map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
                if waited > SYNC_WAIT {
                    info!("{}: no SYNC from device after {waited:?}", self.id);
                    self.events.push_back(LinkEvent::SyncTimeout);
                }
            }
            S::InitSync => self.events.push_back(LinkEvent::SyncOk),
            S::Init0C00 => self.expect_ack(command::HANDSHAKE_0C00),
            S::Init1000 => self.expect_ack(command::HANDSHAKE_1000),
            S::Init1100 => {
                if let Some(frame) = self.take_response(command::DEVICE_INFO) {
                    match parameter::parse_device_info(&frame.payload) {
                        Ok(info) => {
                            debug!("{}: device {}+{}", self.id, info.model, info.serial);
                            self.device = info;
                            self.events.push_back(LinkEvent::ResponseReceived);
                        }
                        Err(e) => self.reject_response(e),
                    }
                }
            }
            S::Init1200 => self.expect_ack(command::HANDSHAKE_1200),
            S::Init4100 => self.expect_ack(command::HANDSHAKE_4100),
            S::Init4C01 => self.expect_ack(command::HANDSHAKE_4C01),
            S::Init0010 => {
                if let Some(frame) = self.take_response(command::TABLE_ID) {
                    match parameter::parse_table_id(&frame.payload) {
                        Ok(id) => {
                            debug!("{}: parameter table {id}", self.id);
                            self.table.set_id(id);
                            self.events.push_back(LinkEvent::ResponseReceived);
                        }
                        Err(e) => self.reject_response(e),
                    }
                }
            }
            S::Init0110 => {
                if let Some(frame) = self.take_response(command::PARAMETER_LIST) {
                    match parameter::parse_descriptors(&frame.payload) {
                        Ok(descriptors) => {
                            debug!("{}: {} parameters declared", self.id, descriptors.len());
                            self.table.load_descriptors(descriptors);
                            self.events.push_back(LinkEvent::ResponseReceived);
                        }
                        Err(e) => self.reject_response(e),
                    }
                }
            }
            S::Init0210 => self.expect_report(command::READ_ATTRIBUTES, true),
            S::Init1800 => self.expect_ack(command::HANDSHAKE_1800),
            S::Init0001Status10 | S::Init0001Status11 => self.expect_ack(command::MODULE_STATUS),
            S::Init0910 => self.expect_report(command::READ_PARAMETERS, true),
            S::InitDone => {}
            S::Idle => {
                if self.has_pending_update() {
                    self.events.push_back(LinkEvent::PushStates);
                    return;
                }
                let due = self
                    .last_pull
                    .map_or(true, |t| now.saturating_duration_since(t) > self.settings.poll_interval);
                if due {
                    self.events.push_back(LinkEvent::PullStates);
                }
            }
            S::PullStates => self.expect_report(command::READ_PARAMETERS, false),
            S::PushStates => self.expect_ack(command::WRITE_PARAMETERS),
        }
    }

    fn on_exit(&mut self, state: LinkState, now: Instant) {
        match state {
            LinkState::PullStates => {
                self.last_pull = Some(now);
                self.notify_clients(now);
            }
            LinkState::PushStates => self.events.push_back(LinkEvent::PullStates),
            _ => {}
        }
    }

    // ── Response handling ─────────────────────────────────────────────────────

    /// Takes the pending frame if it is the response to `command`.
    fn take_response(&mut self, command: u16) -> Option<KdkFrame> {
        match &self.pending {
            Some(frame) if frame.is_response() && frame.base_command() == command => {
                self.pending.take()
            }
            _ => None,
        }
    }

    fn expect_ack(&mut self, command: u16) {
        if self.take_response(command).is_some() {
            self.events.push_back(LinkEvent::ResponseReceived);
        }
    }

    /// Handles a value report.  During the handshake a malformed report
    /// restarts the link; during polling the report is dropped and the next
    /// poll tries again.
    fn expect_report(&mut self, command: u16, handshake: bool) {
        let Some(frame) = self.take_response(command) else {
            return;
        };
        match parameter::parse_value_report(&frame.payload) {
            Ok(values) => {
                self.apply_values(&values);
                self.events.push_back(LinkEvent::ResponseReceived);
            }
            Err(e) if handshake => self.reject_response(e),
            Err(e) => {
                warn!("{}: dropping report {:04X}: {e}", self.id, frame.command);
                self.fault = Some(e);
                self.events.push_back(LinkEvent::ResponseReceived);
            }
        }
    }

    fn reject_response(&mut self, e: ProtocolError) {
        self.abort_handshake(&e.to_string());
        self.fault = Some(e);
    }

    fn abort_handshake(&mut self, reason: &str) {
        error!("{}: handshake failed in {}: {reason}", self.id, self.state);
        self.events.push_back(LinkEvent::SyncRecovery);
    }

    fn apply_values(&mut self, values: &[ParameterValue]) {
        self.changed.extend(self.table.apply(values));
    }

    /// Hands the stored values to every client watching one of them.
    fn notify_clients(&mut self, now: Instant) {
        if self.changed.is_empty() {
            return;
        }
        let changed = std::mem::take(&mut self.changed);
        for client in self.clients.iter_mut() {
            let watching = client
                .watched_parameters()
                .iter()
                .any(|id| changed.contains(id));
            if !watching {
                continue;
            }
            if let Some(state) = client.on_parameter_update(&self.table, now) {
                self.notifications.push(StateEvent {
                    entity: client.id().clone(),
                    state,
                });
            }
        }
    }

    // ── Device-initiated requests ─────────────────────────────────────────────

    fn process_message(&mut self, now: Instant) {
        let Some(frame) = self.pending.take() else {
            return;
        };

        if frame.is_response() {
            warn!(
                "{}: unhandled response {:04X} in {}",
                self.id, frame.command, self.state
            );
            return;
        }

        match frame.command {
            command::STATUS_PING => {
                self.send_reply(&frame, command::STATUS_PING_REPLY.to_vec());
                self.last_ping = Some(now);
            }
            command::CHANGE_NOTIFICATION => {
                match parameter::parse_value_report(&frame.payload) {
                    Ok(values) => self.apply_values(&values),
                    Err(e) => {
                        warn!("{}: dropping change notification: {e}", self.id);
                        self.fault = Some(e);
                    }
                }
                let ack: Vec<u8> = frame.payload.iter().take(4).copied().collect();
                self.send_reply(&frame, ack);
                self.events.push_back(LinkEvent::PullStates);
            }
            other => {
                warn!(
                    "{}: unhandled request {other:04X} {}",
                    self.id,
                    HexBytes(&frame.payload)
                );
            }
        }
    }
}

impl std::fmt::Debug for KdkConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdkConnectionManager")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("clients", &self.clients.len())
            .finish_non_exhaustive()
    }
}

// ── Capabilities ──────────────────────────────────────────────────────────────

impl Pollable for KdkConnectionManager {
    fn name(&self) -> &str {
        self.id.as_str()
    }

    fn update_interval(&self) -> Duration {
        self.settings.update_interval
    }

    fn setup(&mut self, now: Instant) {
        self.clients.seal();
        self.started_at = Some(now);
    }

    fn update(&mut self, now: Instant) -> Vec<StateEvent> {
        self.tick(now).events
    }

    fn dump_config(&self) {
        info!("KdkConnectionManager '{}':", self.id);
        info!(
            "  Update Interval: {}",
            humantime::format_duration(self.settings.update_interval)
        );
        info!(
            "  Receive Timeout: {}",
            humantime::format_duration(self.settings.receive_timeout)
        );
        info!(
            "  Poll Interval: {}",
            humantime::format_duration(self.settings.poll_interval)
        );
        match self.last_ping {
            Some(t) => info!("  Last Ping: {}s ago", t.elapsed().as_secs()),
            None => info!("  Last Ping: never"),
        }
        info!("  FSM State: {}", self.state);
        info!("  Clients ({}):", self.clients.len());
        for client in self.clients.iter() {
            info!("  - {} ({})", client.name(), client.kind());
        }
        info!("  Product Model: {}", self.device.model);
        info!("  Product Serial: {}", self.device.serial);
        info!("  Parameter Table ID: {}", self.table.id());
        info!("  Parameter Count: {}", self.table.len());
        for (i, (descriptor, data)) in self.table.descriptors().enumerate() {
            info!(
                "  [{i:2}] ID={}, SIZE={:<2}, META={:02X}, DATA={}",
                descriptor.id,
                descriptor.size,
                descriptor.metadata,
                HexBytes(data)
            );
        }
    }
}

impl SerialClient for KdkConnectionManager {
    fn serial_requirements(&self) -> SerialRequirements {
        SerialRequirements::KDK
    }

    fn uart_settings(&self) -> &UartSettings {
        &self.settings.uart
    }
}

impl EntityHost for KdkConnectionManager {
    fn entities(&self) -> Vec<EntityInfo> {
        self.clients.infos()
    }

    fn control(
        &mut self,
        entity: &EntityId,
        command: &EntityCommand,
        now: Instant,
    ) -> Result<(), CommandError> {
        KdkConnectionManager::control(self, entity, command, now)
    }
}
