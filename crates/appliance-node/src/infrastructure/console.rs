//! Line-oriented entity commands read from stdin.
//!
//! ```text
//!   ceiling_fan state=on speed=4 direction=reverse
//!   main_light brightness=60 color_temperature=4000K transition=2s
//!   living_room_ac mode=cool target=23.5 fan_mode=high swing=vertical
//! ```
//!
//! The first word names the entity; its kind decides which keys are
//! accepted.  Values are case-insensitive.

use std::str::FromStr;

use appliance_core::domain::climate::ClimateCall;
use appliance_core::domain::fan::FanCall;
use appliance_core::domain::light::{ColorTemperature, LightCall};
use appliance_core::EntityId;
use thiserror::Error;

use crate::application::entity::{EntityCommand, EntityInfo, EntityKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("empty command")]
    Empty,

    #[error("no entity with id '{0}'")]
    UnknownEntity(String),

    #[error("expected key=value, got '{0}'")]
    MalformedPair(String),

    #[error("a {kind} does not accept '{key}'")]
    UnknownKey { kind: EntityKind, key: String },

    #[error("invalid {key} '{value}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

fn invalid(key: &str, value: &str, reason: impl ToString) -> ConsoleError {
    ConsoleError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConsoleError>
where
    T: FromStr,
    T::Err: ToString,
{
    value.parse().map_err(|e: T::Err| invalid(key, value, e))
}

fn parse_on_off(key: &str, value: &str) -> Result<bool, ConsoleError> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(invalid(key, value, "expected on or off")),
    }
}

/// Parses one command line against the entities the node hosts.
///
/// # Errors
///
/// Returns [`ConsoleError`] describing the first problem in the line.
pub fn parse_command(
    line: &str,
    entities: &[EntityInfo],
) -> Result<(EntityId, EntityCommand), ConsoleError> {
    let mut words = line.split_whitespace();
    let id = words.next().ok_or(ConsoleError::Empty)?;
    let info = entities
        .iter()
        .find(|e| e.id.as_str() == id)
        .ok_or_else(|| ConsoleError::UnknownEntity(id.to_string()))?;

    let mut fan = FanCall::default();
    let mut light = LightCall::default();
    let mut climate = ClimateCall::default();

    for word in words {
        let (key, value) = word
            .split_once('=')
            .ok_or_else(|| ConsoleError::MalformedPair(word.to_string()))?;
        let key = key.to_ascii_lowercase();
        let key = key.as_str();

        match (info.kind, key) {
            (EntityKind::Fan, "state") => fan.on = Some(parse_on_off(key, value)?),
            (EntityKind::Fan, "speed") => fan.speed = Some(parse(key, value)?),
            (EntityKind::Fan, "direction") => fan.direction = Some(parse(key, value)?),

            (EntityKind::Light, "state") => light.on = Some(parse_on_off(key, value)?),
            (EntityKind::Light, "brightness") => {
                let percent: f32 = parse(key, value)?;
                if !(0.0..=100.0).contains(&percent) {
                    return Err(invalid(key, value, "expected 0..=100"));
                }
                light.brightness = Some(percent / 100.0);
            }
            (EntityKind::Light, "color_temperature") => {
                let temperature: ColorTemperature = parse(key, value)?;
                light.color_temperature = Some(temperature.mireds());
            }
            (EntityKind::Light, "transition") => {
                light.transition =
                    Some(humantime::parse_duration(value).map_err(|e| invalid(key, value, e))?);
            }

            (EntityKind::Climate, "mode") => climate.mode = Some(parse(key, value)?),
            (EntityKind::Climate, "target" | "target_temperature") => {
                climate.target_temperature = Some(parse(key, value)?);
            }
            (EntityKind::Climate, "fan_mode") => climate.fan_mode = Some(parse(key, value)?),
            (EntityKind::Climate, "swing" | "swing_mode") => {
                climate.swing_mode = Some(parse(key, value)?);
            }

            (kind, _) => {
                return Err(ConsoleError::UnknownKey {
                    kind,
                    key: key.to_string(),
                })
            }
        }
    }

    let command = match info.kind {
        EntityKind::Fan => EntityCommand::Fan(fan),
        EntityKind::Light => EntityCommand::Light(light),
        EntityKind::Climate => EntityCommand::Climate(climate),
    };
    Ok((info.id.clone(), command))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use appliance_core::domain::climate::{ClimateMode, ClimateSwingMode};
    use appliance_core::domain::fan::FanDirection;

    fn entities() -> Vec<EntityInfo> {
        [
            ("fan", EntityKind::Fan),
            ("light", EntityKind::Light),
            ("ac", EntityKind::Climate),
        ]
        .into_iter()
        .map(|(id, kind)| EntityInfo {
            id: EntityId::new(id),
            name: id.to_string(),
            kind,
        })
        .collect()
    }

    #[test]
    fn test_fan_command_is_parsed() {
        // Arrange / Act
        let (id, command) =
            parse_command("fan state=on speed=4 direction=REVERSE", &entities()).expect("valid");

        // Assert
        assert_eq!(id, EntityId::new("fan"));
        assert_eq!(
            command,
            EntityCommand::Fan(FanCall {
                on: Some(true),
                speed: Some(4),
                direction: Some(FanDirection::Reverse),
            })
        );
    }

    #[test]
    fn test_light_brightness_is_a_percentage() {
        let (_, command) = parse_command(
            "light brightness=50 color_temperature=4000K transition=2s",
            &entities(),
        )
        .expect("valid");

        assert_eq!(
            command,
            EntityCommand::Light(LightCall {
                on: None,
                brightness: Some(0.5),
                color_temperature: Some(250.0),
                transition: Some(Duration::from_secs(2)),
            })
        );
    }

    #[test]
    fn test_climate_command_is_parsed() {
        let (_, command) =
            parse_command("ac mode=heat_cool target=23.5 swing=vertical", &entities())
                .expect("valid");

        assert_eq!(
            command,
            EntityCommand::Climate(ClimateCall {
                mode: Some(ClimateMode::HeatCool),
                target_temperature: Some(23.5),
                fan_mode: None,
                swing_mode: Some(ClimateSwingMode::Vertical),
            })
        );
    }

    #[test]
    fn test_key_of_other_kind_is_rejected() {
        let result = parse_command("fan mode=cool", &entities());
        assert_eq!(
            result,
            Err(ConsoleError::UnknownKey {
                kind: EntityKind::Fan,
                key: "mode".into()
            })
        );
    }

    #[test]
    fn test_unknown_entity_and_empty_line_are_rejected() {
        assert_eq!(
            parse_command("lamp state=on", &entities()),
            Err(ConsoleError::UnknownEntity("lamp".into()))
        );
        assert_eq!(parse_command("   ", &entities()), Err(ConsoleError::Empty));
    }

    #[test]
    fn test_bad_values_are_reported() {
        assert!(matches!(
            parse_command("fan speed=fast", &entities()),
            Err(ConsoleError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_command("light brightness=150", &entities()),
            Err(ConsoleError::InvalidValue { .. })
        ));
        assert_eq!(
            parse_command("fan on", &entities()),
            Err(ConsoleError::MalformedPair("on".into()))
        );
    }
}
