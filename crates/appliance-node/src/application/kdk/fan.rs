//! KDK ceiling fan driver.
//!
//! | Parameter | Meaning   | Encoding                         |
//! |-----------|-----------|----------------------------------|
//! | `0x8000`  | power     | `0x30` on, `0x31` off            |
//! | `0xF000`  | speed     | `0x30 + level`, levels 1..=10    |
//! | `0xF100`  | direction | `0x41` forward, `0x42` reverse   |
//! | `0xF200`  | yuragi    | always written off (`0x31`)      |

use std::time::Instant;

use appliance_core::domain::fan::{FanCall, FanDirection, FanState, FanTraits};
use appliance_core::protocol::kdk::parameter::ids;
use appliance_core::protocol::kdk::{ParameterId, ParameterTable, ParameterValue};
use appliance_core::{CapabilityViolation, EntityId};
use tracing::{debug, info};

use super::KdkClient;
use crate::application::entity::{CommandError, EntityCommand, EntityKind, EntityState};

pub const SPEED_COUNT: u8 = 10;

const STATE_ON: u8 = 0x30;
const STATE_OFF: u8 = 0x31;
const SPEED_BASE: u8 = 0x30;
const DIRECTION_FORWARD: u8 = 0x41;
const DIRECTION_REVERSE: u8 = 0x42;
const YURAGI_OFF: u8 = 0x31;

const WATCHED: [ParameterId; 3] = [ids::FAN_STATE, ids::FAN_SPEED, ids::FAN_DIRECTION];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanSettings {
    pub id: EntityId,
    pub name: String,
}

/// Raw register bytes last seen from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Registers {
    state: u8,
    speed: u8,
    direction: u8,
}

impl Registers {
    fn read(table: &ParameterTable) -> Option<Self> {
        Some(Self {
            state: table.byte(ids::FAN_STATE)?,
            speed: table.byte(ids::FAN_SPEED)?,
            direction: table.byte(ids::FAN_DIRECTION)?,
        })
    }

    fn decode(self) -> FanState {
        FanState {
            on: self.state == STATE_ON,
            speed: self.speed.saturating_sub(SPEED_BASE).min(SPEED_COUNT),
            direction: if self.direction == DIRECTION_REVERSE {
                FanDirection::Reverse
            } else {
                FanDirection::Forward
            },
        }
    }
}

/// Register values for `state`.  Yuragi is always switched off.
fn encode(state: &FanState) -> Vec<ParameterValue> {
    let power = if state.on { STATE_ON } else { STATE_OFF };
    let direction = match state.direction {
        FanDirection::Forward => DIRECTION_FORWARD,
        FanDirection::Reverse => DIRECTION_REVERSE,
    };
    vec![
        ParameterValue::byte(ids::FAN_STATE, power),
        ParameterValue::byte(ids::FAN_SPEED, SPEED_BASE + state.speed),
        ParameterValue::byte(ids::FAN_DIRECTION, direction),
        ParameterValue::byte(ids::FAN_YURAGI, YURAGI_OFF),
    ]
}

#[derive(Debug)]
pub struct KdkFan {
    settings: FanSettings,
    state: FanState,
    cached: Option<Registers>,
}

impl KdkFan {
    pub fn new(settings: FanSettings) -> Self {
        Self {
            settings,
            state: FanState::default(),
            cached: None,
        }
    }

    pub fn traits(&self) -> FanTraits {
        FanTraits {
            oscillation: false,
            speed: true,
            direction: true,
            speed_count: SPEED_COUNT,
        }
    }

    fn call<'a>(&self, command: &'a EntityCommand) -> Result<&'a FanCall, CommandError> {
        match command {
            EntityCommand::Fan(call) => Ok(call),
            other => Err(CommandError::Unsupported {
                entity: self.settings.id.clone(),
                kind: EntityKind::Fan,
                command: other.kind(),
            }),
        }
    }

    /// The command merged into the current state.
    fn merge(&self, call: &FanCall) -> Result<FanState, CapabilityViolation> {
        let mut next = self.state;
        if let Some(speed) = call.speed {
            if speed > SPEED_COUNT {
                return Err(CapabilityViolation::FanSpeed {
                    requested: speed,
                    max: SPEED_COUNT,
                });
            }
            next.speed = speed;
        }
        if let Some(on) = call.on {
            next.on = on;
        }
        if let Some(direction) = call.direction {
            next.direction = direction;
        }
        Ok(next)
    }
}

impl KdkClient for KdkFan {
    fn id(&self) -> &EntityId {
        &self.settings.id
    }

    fn name(&self) -> &str {
        &self.settings.name
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Fan
    }

    fn watched_parameters(&self) -> &[ParameterId] {
        &WATCHED
    }

    fn on_parameter_update(&mut self, table: &ParameterTable, _now: Instant) -> Option<EntityState> {
        let registers = Registers::read(table)?;
        if self.cached == Some(registers) {
            return None;
        }
        self.cached = Some(registers);
        self.state = registers.decode();
        Some(EntityState::Fan(self.state))
    }

    fn plan(
        &self,
        command: &EntityCommand,
        _now: Instant,
    ) -> Result<Vec<ParameterValue>, CommandError> {
        let next = self.merge(self.call(command)?)?;
        Ok(encode(&next))
    }

    fn commit(&mut self, command: &EntityCommand, _now: Instant) {
        let Ok(call) = self.call(command) else {
            return;
        };
        let Ok(next) = self.merge(call) else {
            return;
        };
        self.state = next;
        debug!("{}: {}", self.settings.id, self.state);
    }

    fn state(&self) -> EntityState {
        EntityState::Fan(self.state)
    }

    fn dump_config(&self) {
        info!("KDK Fan '{}' ({})", self.settings.name, self.settings.id);
        info!("  Speed Count: {SPEED_COUNT}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appliance_core::protocol::kdk::parameter::ParameterDescriptor;
    use appliance_core::protocol::kdk::TableId;

    fn fan() -> KdkFan {
        KdkFan::new(FanSettings {
            id: EntityId::new("fan"),
            name: "Ceiling Fan".into(),
        })
    }

    fn table(state: u8, speed: u8, direction: u8) -> ParameterTable {
        let mut table = ParameterTable::new();
        table.set_id(TableId::from_le_bytes([0x01, 0x3A, 0x01]));
        table.load_descriptors(
            [ids::FAN_STATE, ids::FAN_SPEED, ids::FAN_DIRECTION, ids::FAN_YURAGI]
                .into_iter()
                .map(|id| ParameterDescriptor {
                    id,
                    metadata: 0xE2,
                    size: 1,
                })
                .collect(),
        );
        table.apply(&[
            ParameterValue::byte(ids::FAN_STATE, state),
            ParameterValue::byte(ids::FAN_SPEED, speed),
            ParameterValue::byte(ids::FAN_DIRECTION, direction),
        ]);
        table
    }

    #[test]
    fn test_first_report_is_published() {
        // Arrange
        let mut fan = fan();

        // Act
        let published = fan.on_parameter_update(&table(0x30, 0x33, 0x42), Instant::now());

        // Assert
        assert_eq!(
            published,
            Some(EntityState::Fan(FanState {
                on: true,
                speed: 3,
                direction: FanDirection::Reverse,
            }))
        );
    }

    #[test]
    fn test_unchanged_report_is_not_published_again() {
        let mut fan = fan();
        let table = table(0x31, 0x31, 0x41);
        fan.on_parameter_update(&table, Instant::now());

        assert_eq!(fan.on_parameter_update(&table, Instant::now()), None);
    }

    #[test]
    fn test_missing_parameter_publishes_nothing() {
        let mut fan = fan();
        assert_eq!(fan.on_parameter_update(&ParameterTable::new(), Instant::now()), None);
    }

    #[test]
    fn test_plan_writes_all_registers_and_turns_yuragi_off() {
        // Arrange
        let mut fan = fan();
        fan.on_parameter_update(&table(0x31, 0x32, 0x41), Instant::now());
        let call = FanCall {
            on: Some(true),
            ..FanCall::default()
        };

        // Act
        let values = fan
            .plan(&EntityCommand::Fan(call), Instant::now())
            .expect("accepted");

        // Assert
        assert_eq!(
            values,
            vec![
                ParameterValue::byte(ids::FAN_STATE, 0x30),
                ParameterValue::byte(ids::FAN_SPEED, 0x32),
                ParameterValue::byte(ids::FAN_DIRECTION, 0x41),
                ParameterValue::byte(ids::FAN_YURAGI, 0x31),
            ]
        );
    }

    #[test]
    fn test_plan_leaves_state_alone_until_commit() {
        // Arrange
        let mut fan = fan();
        let command = EntityCommand::Fan(FanCall {
            on: Some(true),
            speed: Some(5),
            ..FanCall::default()
        });

        // Act
        fan.plan(&command, Instant::now()).expect("accepted");
        let planned = fan.state();
        fan.commit(&command, Instant::now());

        // Assert
        assert_eq!(planned, EntityState::Fan(FanState::default()));
        assert_eq!(
            fan.state(),
            EntityState::Fan(FanState {
                on: true,
                speed: 5,
                direction: FanDirection::Forward,
            })
        );
    }

    #[test]
    fn test_speed_above_count_is_a_capability_violation() {
        let mut fan = fan();
        let call = FanCall {
            speed: Some(11),
            ..FanCall::default()
        };

        let result = fan.plan(&EntityCommand::Fan(call), Instant::now());

        assert_eq!(
            result,
            Err(CommandError::Capability(CapabilityViolation::FanSpeed {
                requested: 11,
                max: 10
            }))
        );
        assert_eq!(fan.state(), EntityState::Fan(FanState::default()));
    }

    #[test]
    fn test_light_command_is_unsupported() {
        let mut fan = fan();
        let result = fan.plan(&EntityCommand::Light(Default::default()), Instant::now());
        assert!(matches!(result, Err(CommandError::Unsupported { .. })));
    }

    #[test]
    fn test_traits_advertise_ten_speeds_and_direction() {
        let traits = fan().traits();
        assert_eq!(traits.speed_count, 10);
        assert!(traits.direction);
        assert!(!traits.oscillation);
    }
}
