//! KDK light driver: the main tunable-white light or the night light.
//!
//! # Two lights, one mode register (for beginners)
//!
//! The fixture has a single power register (`0xF300`) shared by both
//! lights.  Which light that power bit drives is selected by the mode
//! register (`0xF400`): `0x42` for the main light, `0x43` for the night
//! light.  So the main light is "on" only when the power bit is set *and*
//! the mode is `0x42`; switching the night light on turns the main light
//! off as a side effect.
//!
//! ```text
//!   0xF300 power   0xF400 mode   main light   night light
//!   ─────────────  ───────────   ──────────   ───────────
//!   0x30 (on)      0x42          ON           off
//!   0x30 (on)      0x43          off          ON
//!   0x31 (off)     any           off          off
//! ```
//!
//! Brightness and colour are bytes in `1..=100`.  Colour byte 1 is the warm
//! end of the configured range, 100 the cold end.
//!
//! # Transitions
//!
//! The fixture has no fade of its own.  A command with a transition (or the
//! configured `default_transition_length`) becomes a series of writes, one
//! per connection tick, interpolating brightness and colour from where the
//! light is to where it should end up.  Switching on fades up from 1 %;
//! switching off fades down to 1 % and then cuts the power.  The night
//! light only knows three levels and always switches at once.

use std::time::{Duration, Instant};

use appliance_core::domain::light::{
    ColorTemperatureRange, LightCall, LightState, LightTraits, LightType,
};
use appliance_core::protocol::kdk::parameter::ids;
use appliance_core::protocol::kdk::{ParameterId, ParameterTable, ParameterValue};
use appliance_core::EntityId;
use tracing::{debug, info, trace};

use super::KdkClient;
use crate::application::entity::{CommandError, EntityCommand, EntityKind, EntityState};

/// Reported brightness and colour are ignored this long after a local
/// command, so a slider being dragged does not jump back.
pub const UPDATE_BLANKING: Duration = Duration::from_millis(1500);

/// Brightness a fade starts from when switching on, or ends at when
/// switching off.
const FADE_FLOOR: f32 = 0.01;

const STATE_ON: u8 = 0x30;
const STATE_OFF: u8 = 0x31;
const MODE_MAIN: u8 = 0x42;
const MODE_NIGHT: u8 = 0x43;

const MAIN_WATCHED: [ParameterId; 4] = [
    ids::LIGHT_STATE,
    ids::LIGHT_MODE,
    ids::LIGHT_BRIGHTNESS,
    ids::LIGHT_COLOR,
];
const NIGHT_WATCHED: [ParameterId; 4] = [
    ids::LIGHT_STATE,
    ids::LIGHT_MODE,
    ids::NIGHT_LIGHT_BRIGHTNESS,
    ids::LIGHT_COLOR,
];

#[derive(Debug, Clone, PartialEq)]
pub struct LightSettings {
    pub id: EntityId,
    pub name: String,
    pub light_type: LightType,
    pub range: ColorTemperatureRange,
    pub default_transition_length: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Registers {
    state: u8,
    mode: u8,
    brightness: u8,
    color: u8,
}

/// A fade between two lit states, written a step at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Transition {
    from: LightState,
    to: LightState,
    /// Written once the fade has run its course.
    end: LightState,
    started: Instant,
    length: Duration,
}

impl Transition {
    fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.length
    }

    /// The lit state `now` falls on.
    fn frame(&self, now: Instant) -> LightState {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f32();
        let progress = (elapsed / self.length.as_secs_f32()).min(1.0);
        let lerp = |a: f32, b: f32| a + (b - a) * progress;
        LightState {
            on: true,
            brightness: lerp(self.from.brightness, self.to.brightness),
            color_temperature: match (self.from.color_temperature, self.to.color_temperature) {
                (Some(a), Some(b)) => Some(lerp(a, b)),
                (_, to) => to,
            },
        }
    }
}

fn mode_type(mode: u8) -> LightType {
    if mode == MODE_NIGHT {
        LightType::NightLight
    } else {
        LightType::MainLight
    }
}

fn mode_byte(light_type: LightType) -> u8 {
    match light_type {
        LightType::MainLight => MODE_MAIN,
        LightType::NightLight => MODE_NIGHT,
    }
}

/// The night light only responds to three levels.
fn snap_night_light_brightness(value: u8) -> u8 {
    match value {
        0..=33 => 1,
        34..=66 => 50,
        _ => 100,
    }
}

#[derive(Debug)]
pub struct KdkLight {
    settings: LightSettings,
    traits: LightTraits,
    state: LightState,
    cached: Option<Registers>,
    last_command: Option<Instant>,
    transition: Option<Transition>,
    /// Brightness and colour bytes of the last fade step written.
    last_step: Option<(u8, u8)>,
}

impl KdkLight {
    pub fn new(settings: LightSettings) -> Self {
        let traits = match settings.light_type {
            LightType::MainLight => LightTraits::color_temperature(&settings.range),
            LightType::NightLight => LightTraits::brightness_only(),
        };
        let color_temperature = match settings.light_type {
            LightType::MainLight => Some(settings.range.cold_mireds()),
            LightType::NightLight => None,
        };
        Self {
            settings,
            traits,
            state: LightState {
                color_temperature,
                ..LightState::default()
            },
            cached: None,
            last_command: None,
            transition: None,
            last_step: None,
        }
    }

    pub fn traits(&self) -> &LightTraits {
        &self.traits
    }

    pub fn light_type(&self) -> LightType {
        self.settings.light_type
    }

    fn is_night_light(&self) -> bool {
        self.settings.light_type == LightType::NightLight
    }

    fn brightness_id(&self) -> ParameterId {
        if self.is_night_light() {
            ids::NIGHT_LIGHT_BRIGHTNESS
        } else {
            ids::LIGHT_BRIGHTNESS
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    fn call<'a>(&self, command: &'a EntityCommand) -> Result<&'a LightCall, CommandError> {
        match command {
            EntityCommand::Light(call) => Ok(call),
            other => Err(CommandError::Unsupported {
                entity: self.settings.id.clone(),
                kind: EntityKind::Light,
                command: other.kind(),
            }),
        }
    }

    /// Where the light is right now: part-way through a fade, or the last
    /// commanded state.
    fn current(&self, now: Instant) -> LightState {
        match &self.transition {
            Some(t) if !t.is_finished(now) => t.frame(now),
            _ => self.state,
        }
    }

    /// The state `call` leads to, and the fade that gets there if any.
    fn prepare(
        &self,
        call: &LightCall,
        now: Instant,
    ) -> Result<(LightState, Option<Transition>), CommandError> {
        self.traits.validate(call)?;

        let mut target = self.state;
        if let Some(on) = call.on {
            target.on = on;
        }
        if let Some(brightness) = call.brightness {
            target.brightness = brightness.clamp(0.0, 1.0);
        }
        if call.color_temperature.is_some() {
            target.color_temperature = call.color_temperature;
        }

        let current = self.current(now);
        let length = call
            .transition
            .unwrap_or(self.settings.default_transition_length);
        if length.is_zero() || self.is_night_light() || !(current.on || target.on) {
            return Ok((target, None));
        }

        let from = if current.on {
            current
        } else {
            LightState {
                on: true,
                brightness: FADE_FLOOR,
                ..target
            }
        };
        let to = if target.on {
            target
        } else {
            LightState {
                on: true,
                brightness: FADE_FLOOR,
                ..current
            }
        };
        let transition = Transition {
            from,
            to,
            end: target,
            started: now,
            length,
        };
        Ok((target, Some(transition)))
    }

    /// Register values that put the fixture in `state`.
    fn encode(&self, state: &LightState) -> Vec<ParameterValue> {
        let power = if state.on { STATE_ON } else { STATE_OFF };
        let (level, color) = self.step_bytes(state);
        let mut values = vec![
            ParameterValue::byte(ids::LIGHT_MODE, mode_byte(self.settings.light_type)),
            ParameterValue::byte(ids::LIGHT_STATE, power),
        ];
        match self.settings.light_type {
            LightType::NightLight => {
                values.push(ParameterValue::byte(ids::NIGHT_LIGHT_BRIGHTNESS, level));
            }
            LightType::MainLight => {
                values.push(ParameterValue::byte(ids::LIGHT_BRIGHTNESS, level));
                values.push(ParameterValue::byte(ids::LIGHT_COLOR, color));
            }
        }
        values
    }

    fn step_bytes(&self, state: &LightState) -> (u8, u8) {
        let mireds = state
            .color_temperature
            .unwrap_or_else(|| self.settings.range.cold_mireds());
        (
            self.brightness_to_byte(state.brightness),
            self.mireds_to_byte(mireds),
        )
    }

    // ── Conversions ───────────────────────────────────────────────────────────

    pub fn brightness_to_byte(&self, brightness: f32) -> u8 {
        let value = (brightness * 100.0).round().clamp(1.0, 100.0) as u8;
        if self.is_night_light() {
            snap_night_light_brightness(value)
        } else {
            value
        }
    }

    pub fn byte_to_brightness(byte: u8) -> f32 {
        f32::from(byte) / 100.0
    }

    pub fn mireds_to_byte(&self, mireds: f32) -> u8 {
        let cold = self.settings.range.cold_mireds();
        let warm = self.settings.range.warm_mireds();
        let normalized = ((mireds - cold) / (warm - cold)).clamp(0.0, 1.0);
        ((1.0 - normalized) * 99.0 + 1.0).round().clamp(1.0, 100.0) as u8
    }

    pub fn byte_to_mireds(&self, byte: u8) -> f32 {
        let cold = self.settings.range.cold_mireds();
        let warm = self.settings.range.warm_mireds();
        let step = f32::from(99 - (byte.clamp(1, 100) - 1));
        cold + (warm - cold) * (step / 99.0)
    }

    // ── Change detection ──────────────────────────────────────────────────────

    fn is_state_changed(&self, old: &Registers, new: &Registers) -> bool {
        if old.mode != new.mode {
            return true;
        }
        // The power bit belongs to the other light.
        if mode_type(old.mode) != self.settings.light_type {
            return false;
        }
        if old.state != new.state {
            return true;
        }
        if new.state != STATE_ON {
            return false;
        }
        if old.brightness != new.brightness {
            return true;
        }
        if self.is_night_light() {
            return false;
        }
        old.color != new.color
    }

    fn is_blanked(&self, now: Instant) -> bool {
        if self.is_night_light() {
            return false;
        }
        self.last_command
            .is_some_and(|t| now.saturating_duration_since(t) <= UPDATE_BLANKING)
    }
}

impl KdkClient for KdkLight {
    fn id(&self) -> &EntityId {
        &self.settings.id
    }

    fn name(&self) -> &str {
        &self.settings.name
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Light
    }

    fn watched_parameters(&self) -> &[ParameterId] {
        if self.is_night_light() {
            &NIGHT_WATCHED
        } else {
            &MAIN_WATCHED
        }
    }

    fn on_parameter_update(&mut self, table: &ParameterTable, now: Instant) -> Option<EntityState> {
        // Mid-fade readings are our own steps coming back.
        if self.transition.is_some() {
            return None;
        }
        let registers = Registers {
            state: table.byte(ids::LIGHT_STATE)?,
            mode: table.byte(ids::LIGHT_MODE)?,
            brightness: table.byte(self.brightness_id())?,
            color: table.byte(ids::LIGHT_COLOR)?,
        };
        if let Some(old) = &self.cached {
            if !self.is_state_changed(old, &registers) {
                return None;
            }
        }
        self.cached = Some(registers);

        self.state.on =
            mode_type(registers.mode) == self.settings.light_type && registers.state == STATE_ON;
        if !self.is_blanked(now) {
            self.state.brightness = Self::byte_to_brightness(registers.brightness);
            if !self.is_night_light() {
                self.state.color_temperature = Some(self.byte_to_mireds(registers.color));
            }
        }
        Some(EntityState::Light(self.state))
    }

    fn plan(
        &self,
        command: &EntityCommand,
        now: Instant,
    ) -> Result<Vec<ParameterValue>, CommandError> {
        let (target, transition) = self.prepare(self.call(command)?, now)?;
        Ok(match transition {
            Some(transition) => self.encode(&transition.from),
            None => self.encode(&target),
        })
    }

    fn commit(&mut self, command: &EntityCommand, now: Instant) {
        let Ok(call) = self.call(command) else {
            return;
        };
        let Ok((target, transition)) = self.prepare(call, now) else {
            return;
        };
        self.state = target;
        self.last_step = transition.map(|t| self.step_bytes(&t.from));
        self.transition = transition;
        self.last_command = Some(now);
        match &transition {
            Some(t) => debug!(
                "{}: {} over {}",
                self.settings.id,
                self.state,
                humantime::format_duration(t.length)
            ),
            None => debug!("{}: {}", self.settings.id, self.state),
        }
    }

    fn transition_step(&mut self, now: Instant) -> Option<Vec<ParameterValue>> {
        let transition = self.transition?;
        self.last_command = Some(now);
        if transition.is_finished(now) {
            self.transition = None;
            self.last_step = None;
            trace!("{}: transition done", self.settings.id);
            return Some(self.encode(&transition.end));
        }

        let frame = transition.frame(now);
        let bytes = self.step_bytes(&frame);
        if self.last_step == Some(bytes) {
            return None;
        }
        self.last_step = Some(bytes);
        Some(self.encode(&frame))
    }

    fn state(&self) -> EntityState {
        EntityState::Light(self.state)
    }

    fn dump_config(&self) {
        info!("KDK Light '{}' ({})", self.settings.name, self.settings.id);
        info!("  Type: {}", self.settings.light_type);
        if !self.is_night_light() {
            info!(
                "  Cold White: {} / Warm White: {}",
                self.settings.range.cold, self.settings.range.warm
            );
        }
        info!(
            "  Default Transition Length: {}",
            humantime::format_duration(self.settings.default_transition_length)
        );
    }
}
