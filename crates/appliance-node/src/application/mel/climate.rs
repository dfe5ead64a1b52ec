//! MelAirConditioner: the climate entity of one MEL-AC unit.
//!
//! # One update (for beginners)
//!
//! ```text
//!   startup delay over? ──no──► return
//!        │ yes
//!   drain the UART
//!        │
//!   request in flight? ──yes──► return (try again next tick)
//!        │ no
//!   fold in the response (CONNECT / GET / SET)
//!        │
//!   not connected?  ─────────► send CONNECT
//!   pending SET?    ─────────► send SET_PARAMS
//!   poll flags left? ────────► send GET_PARAMS, then GET_TEMP, then GET_STATUS
//!   all answered    ─────────► publish if changed, re-arm the poll once
//!                              `max_refresh_rate` has passed
//! ```
//!
//! Each call sends at most one request.  Commands from the user only touch
//! the pending [`SetParams`]; they reach the unit on the next idle tick.

use std::time::{Duration, Instant};

use appliance_core::domain::climate::{
    ClimateAction, ClimateCall, ClimateFanMode, ClimateMode, ClimateState, ClimateSwingMode,
    ClimateTraits,
};
use appliance_core::domain::serial::{SerialRequirements, UartSettings};
use appliance_core::protocol::mel::frame::flags;
use appliance_core::protocol::mel::message::{self, kind, TEMPERATURE_DEFAULT};
use appliance_core::protocol::mel::{FanSpeed, Mode, Power, SetParams, VaneHorizontal, VaneVertical};
use appliance_core::{EntityId, SerialTransport};
use bitflags::bitflags;
use tracing::{debug, info, trace, warn};

use super::link::MelLink;
use super::params::AcParams;
use crate::application::capabilities::{EntityHost, Pollable, SerialClient};
use crate::application::entity::{
    CommandError, EntityCommand, EntityInfo, EntityKind, EntityState, StateEvent,
};

/// A warning is logged after this many unanswered CONNECT requests.
const CONNECT_WARN_EVERY: u32 = 25;

bitflags! {
    /// GET requests still owed in the current poll cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PollFlags: u8 {
        const PARAMS = 0x01;
        const TEMP = 0x02;
        const STATUS = 0x04;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClimateSettings {
    pub id: EntityId,
    pub name: String,
    /// Minimum time between the starts of two poll cycles.
    pub max_refresh_rate: Duration,
    /// Nothing is sent until this long after start-up.
    pub startup_delay: Duration,
    pub update_interval: Duration,
    /// Effective traits, always-available modes included.
    pub traits: ClimateTraits,
    pub uart: UartSettings,
}

impl ClimateSettings {
    pub const DEFAULT_MAX_REFRESH_RATE: Duration = Duration::from_secs(1);
    pub const DEFAULT_STARTUP_DELAY: Duration = Duration::ZERO;
    pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(100);
}

pub struct MelAirConditioner {
    settings: ClimateSettings,
    link: MelLink,
    params: AcParams,
    pending: SetParams,
    poll: PollFlags,
    connected: bool,
    connect_attempts: u32,
    started_at: Option<Instant>,
    last_poll: Option<Instant>,
    state: ClimateState,
}

impl MelAirConditioner {
    pub fn new(settings: ClimateSettings, transport: Box<dyn SerialTransport>) -> Self {
        let link = MelLink::new(settings.id.to_string(), transport);
        Self {
            settings,
            link,
            params: AcParams::new(),
            pending: SetParams::default(),
            poll: PollFlags::all(),
            connected: false,
            connect_attempts: 0,
            started_at: None,
            last_poll: None,
            state: ClimateState {
                mode: ClimateMode::Off,
                action: ClimateAction::Off,
                current_temperature: TEMPERATURE_DEFAULT,
                target_temperature: TEMPERATURE_DEFAULT,
                fan_mode: ClimateFanMode::Auto,
                swing_mode: ClimateSwingMode::Off,
            },
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.settings.id
    }

    pub fn traits(&self) -> &ClimateTraits {
        &self.settings.traits
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The last published state.
    pub fn state(&self) -> ClimateState {
        self.state
    }

    /// Changes waiting to be sent with the next SET_PARAMS.
    pub fn pending(&self) -> &SetParams {
        &self.pending
    }

    // ── Command ───────────────────────────────────────────────────────────────

    /// Validates `call` against the traits and merges it into the pending
    /// SET_PARAMS.
    pub fn control(&mut self, call: &ClimateCall) -> Result<(), CommandError> {
        self.settings.traits.validate(call)?;

        if let Some(mode) = call.mode {
            let (power, mode) = match mode {
                ClimateMode::Off => (Power::Off, None),
                ClimateMode::Cool => (Power::On, Some(Mode::Cool)),
                ClimateMode::Heat => (Power::On, Some(Mode::Heat)),
                ClimateMode::Dry => (Power::On, Some(Mode::Dry)),
                ClimateMode::FanOnly => (Power::On, Some(Mode::Fan)),
                ClimateMode::HeatCool | ClimateMode::Auto => (Power::On, Some(Mode::Auto)),
            };
            self.pending.power = Some(power);
            if mode.is_some() {
                self.pending.mode = mode;
            }
        }

        if let Some(temperature) = call.target_temperature {
            self.pending.temperature = Some(temperature);
        }

        if let Some(fan_mode) = call.fan_mode {
            self.pending.fan = Some(match fan_mode {
                ClimateFanMode::Auto => FanSpeed::Auto,
                ClimateFanMode::Quiet => FanSpeed::Quiet,
                ClimateFanMode::Low => FanSpeed::Speed1,
                ClimateFanMode::Medium => FanSpeed::Speed2,
                ClimateFanMode::High => FanSpeed::Speed3,
                ClimateFanMode::Focus => FanSpeed::Speed4,
            });
        }

        if let Some(swing_mode) = call.swing_mode {
            let (vertical, horizontal) = match swing_mode {
                ClimateSwingMode::Off => (VaneVertical::Auto, VaneHorizontal::Auto),
                ClimateSwingMode::Horizontal => (VaneVertical::Auto, VaneHorizontal::Swing),
                ClimateSwingMode::Vertical => (VaneVertical::Swing, VaneHorizontal::Auto),
                ClimateSwingMode::Both => (VaneVertical::Swing, VaneHorizontal::Swing),
            };
            self.pending.vane_vertical = Some(vertical);
            self.pending.vane_horizontal = Some(horizontal);
        }

        debug!("{}: pending {:?}", self.settings.id, self.pending);
        Ok(())
    }

    // ── Update steps ──────────────────────────────────────────────────────────

    fn process_response(&mut self) {
        if self.link.is_timed_out() {
            trace!("{}: no response, request will be repeated", self.settings.id);
            return;
        }
        let Some(frame) = self.link.take_response() else {
            return;
        };

        if frame.has_flags(flags::CONNECT) {
            info!(
                "{}: connected after {} attempt(s)",
                self.settings.id, self.connect_attempts
            );
            self.connected = true;
            self.connect_attempts = 0;
            return;
        }

        if frame.has_flags(flags::GET) {
            let result = match frame.kind() {
                Some(kind::GET_PARAMS) => message::parse_params(&frame.payload).map(|report| {
                    self.params.apply_params(&report);
                    self.poll.remove(PollFlags::PARAMS);
                }),
                Some(kind::GET_TEMP) => {
                    message::parse_room_temperature(&frame.payload).map(|temperature| {
                        self.params.apply_room_temperature(temperature);
                        self.poll.remove(PollFlags::TEMP);
                    })
                }
                Some(kind::GET_STATUS) => message::parse_status(&frame.payload).map(|status| {
                    self.params.apply_status(status);
                    self.poll.remove(PollFlags::STATUS);
                }),
                other => {
                    debug!("{}: unhandled GET response {other:02X?}", self.settings.id);
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!("{}: {e}", self.settings.id);
            }
            return;
        }

        if frame.has_flags(flags::SET) {
            match message::parse_set_result(&frame.payload) {
                Ok(0) => debug!("{}: SET accepted", self.settings.id),
                Ok(code) => warn!("{}: SET failed with error 0x{code:04X}", self.settings.id),
                Err(e) => warn!("{}: {e}", self.settings.id),
            }
        }
    }

    fn do_connect(&mut self, now: Instant) {
        if self.connected {
            return;
        }
        self.connect_attempts += 1;
        if self.connect_attempts % CONNECT_WARN_EVERY == 0 {
            warn!(
                "{}: no answer to {} CONNECT requests, check the wiring",
                self.settings.id, self.connect_attempts
            );
        }
        self.link.send(flags::CONNECT, &message::connect_request(), now);
    }

    fn do_poll(&mut self, now: Instant) -> Option<StateEvent> {
        if !self.connected {
            self.poll = PollFlags::all();
            return None;
        }

        if !self.pending.is_empty() {
            let payload = self.pending.encode(self.params.encoding());
            self.pending.clear();
            if let Some(payload) = payload {
                self.link.send(flags::SET, &payload, now);
                return None;
            }
        }

        for (flag, request) in [
            (PollFlags::PARAMS, kind::GET_PARAMS),
            (PollFlags::TEMP, kind::GET_TEMP),
            (PollFlags::STATUS, kind::GET_STATUS),
        ] {
            if self.poll.contains(flag) {
                self.link.send(flags::GET, &message::get_request(request), now);
                return None;
            }
        }

        self.restart_poll(now);
        self.publish()
    }

    fn restart_poll(&mut self, now: Instant) {
        let refresh = self.settings.max_refresh_rate;
        let due = self
            .last_poll
            .map_or(true, |last| now.saturating_duration_since(last) >= refresh);
        if due {
            self.poll = PollFlags::all();
            self.last_poll = Some(now);
        }
    }

    fn publish(&mut self) -> Option<StateEvent> {
        if !self.params.is_updated() {
            return None;
        }
        self.params.clear_updated();
        self.state = climate_state(&self.params);
        info!("{}: {}", self.settings.id, self.state);
        Some(StateEvent {
            entity: self.settings.id.clone(),
            state: EntityState::Climate(self.state),
        })
    }
}

/// Translates the unit's settings into the published climate state.
fn climate_state(params: &AcParams) -> ClimateState {
    let current = params.current_temperature();
    let target = params.target_temperature();
    let running = params.compressor_operating();
    let idle_unless = |active: bool, action: ClimateAction| {
        if active {
            action
        } else {
            ClimateAction::Idle
        }
    };

    let (mode, action) = if params.power() == Power::Off {
        (ClimateMode::Off, ClimateAction::Off)
    } else {
        match params.mode() {
            Mode::Heat => (ClimateMode::Heat, idle_unless(running, ClimateAction::Heating)),
            Mode::Dry => (ClimateMode::Dry, ClimateAction::Drying),
            Mode::Cool => (ClimateMode::Cool, idle_unless(running, ClimateAction::Cooling)),
            Mode::Fan => (ClimateMode::FanOnly, ClimateAction::Fan),
            Mode::Auto => {
                let action = if running && current > target {
                    ClimateAction::Cooling
                } else if current < target {
                    ClimateAction::Heating
                } else {
                    ClimateAction::Idle
                };
                (ClimateMode::HeatCool, action)
            }
        }
    };

    let fan_mode = match params.fan() {
        FanSpeed::Quiet => ClimateFanMode::Quiet,
        FanSpeed::Speed1 => ClimateFanMode::Low,
        FanSpeed::Speed2 => ClimateFanMode::Medium,
        FanSpeed::Speed3 => ClimateFanMode::High,
        FanSpeed::Speed4 => ClimateFanMode::Focus,
        FanSpeed::Auto => ClimateFanMode::Auto,
    };

    let swing_mode = if params.vane_vertical() == VaneVertical::Swing {
        ClimateSwingMode::Vertical
    } else {
        ClimateSwingMode::Off
    };

    ClimateState {
        mode,
        action,
        current_temperature: current,
        target_temperature: target,
        fan_mode,
        swing_mode,
    }
}

// ── Capabilities ──────────────────────────────────────────────────────────────

impl Pollable for MelAirConditioner {
    fn name(&self) -> &str {
        self.settings.id.as_str()
    }

    fn update_interval(&self) -> Duration {
        self.settings.update_interval
    }

    fn setup(&mut self, now: Instant) {
        self.started_at = Some(now);
    }

    fn update(&mut self, now: Instant) -> Vec<StateEvent> {
        let started_at = *self.started_at.get_or_insert(now);
        if now.saturating_duration_since(started_at) < self.settings.startup_delay {
            return Vec::new();
        }

        if let Some(e) = self.link.tick(now) {
            debug!("{}: {e}", self.settings.id);
        }
        if self.link.is_busy() {
            return Vec::new();
        }

        self.process_response();
        self.do_connect(now);
        self.do_poll(now).into_iter().collect()
    }

    fn dump_config(&self) {
        let traits = &self.settings.traits;
        let join = |items: Vec<String>| items.join(", ");
        info!("MEL-AC climate '{}' ({})", self.settings.name, self.settings.id);
        info!(
            "  Max Refresh Rate: {}",
            humantime::format_duration(self.settings.max_refresh_rate)
        );
        info!(
            "  Startup Delay: {}",
            humantime::format_duration(self.settings.startup_delay)
        );
        info!(
            "  Update Interval: {}",
            humantime::format_duration(self.settings.update_interval)
        );
        info!(
            "  Modes: {}",
            join(traits.modes.iter().map(ToString::to_string).collect())
        );
        info!(
            "  Fan Modes: {}",
            join(traits.fan_modes.iter().map(ToString::to_string).collect())
        );
        info!(
            "  Swing Modes: {}",
            join(traits.swing_modes.iter().map(ToString::to_string).collect())
        );
        info!(
            "  Visual: {:.1}..{:.1} °C, target step {}, current step {}",
            traits.visual.min_temperature,
            traits.visual.max_temperature,
            traits.visual.target_temperature_step,
            traits.visual.current_temperature_step
        );
    }
}

impl SerialClient for MelAirConditioner {
    fn serial_requirements(&self) -> SerialRequirements {
        SerialRequirements::MEL_AC
    }

    fn uart_settings(&self) -> &UartSettings {
        &self.settings.uart
    }
}

impl EntityHost for MelAirConditioner {
    fn entities(&self) -> Vec<EntityInfo> {
        vec![EntityInfo {
            id: self.settings.id.clone(),
            name: self.settings.name.clone(),
            kind: EntityKind::Climate,
        }]
    }

    fn control(
        &mut self,
        entity: &EntityId,
        command: &EntityCommand,
        _now: Instant,
    ) -> Result<(), CommandError> {
        if entity != &self.settings.id {
            return Err(CommandError::UnknownEntity(entity.clone()));
        }
        let EntityCommand::Climate(call) = command else {
            return Err(CommandError::Unsupported {
                entity: entity.clone(),
                kind: EntityKind::Climate,
                command: command.kind(),
            });
        };
        MelAirConditioner::control(self, call)
    }
}
