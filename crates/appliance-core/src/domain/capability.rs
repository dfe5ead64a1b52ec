//! Rejection of commands outside an entity's configured capabilities.

use thiserror::Error;

use super::climate::{ClimateFanMode, ClimateMode, ClimateSwingMode};

/// A command asked for something the entity does not offer.
///
/// The device is never touched when this is returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CapabilityViolation {
    #[error("mode {0} is not supported")]
    Mode(ClimateMode),

    #[error("fan mode {0} is not supported")]
    FanMode(ClimateFanMode),

    #[error("swing mode {0} is not supported")]
    SwingMode(ClimateSwingMode),

    #[error("target temperature {value:?} is outside {min:?}..={max:?}")]
    TargetTemperature { value: f32, min: f32, max: f32 },

    #[error("fan speed {requested} exceeds the {max} supported speeds")]
    FanSpeed { requested: u8, max: u8 },

    #[error("this light does not support color temperature")]
    ColorTemperature,
}
