//! The climate "visual" temperature range.
//!
//! The host shows a slider for the target temperature.  Its bounds and step
//! are user-configurable, but the MEL-AC protocol can only express
//! 16.0 °C ..= 31.0 °C in half or whole degrees, so overrides are checked
//! against that envelope before any driver is built.
//!
//! # Checks, in order
//!
//! 1. Neither bound may be NaN.
//! 2. `min_temperature` must not be below 16.0.
//! 3. `max_temperature` must not be above 31.0.
//! 4. `min_temperature` must not be above `max_temperature`.
//! 5. Every step (uniform, or the target and current steps) must be exactly
//!    0.5 or 1.0.
//!
//! Missing values take the protocol defaults.

use serde::Deserialize;
use thiserror::Error;

pub const PROTOCOL_MIN_TEMPERATURE: f32 = 16.0;
pub const PROTOCOL_MAX_TEMPERATURE: f32 = 31.0;
pub const PROTOCOL_TEMPERATURE_STEP_MIN: f32 = 0.5;
pub const PROTOCOL_TEMPERATURE_STEP_MAX: f32 = 1.0;

/// A step override: one value for both axes, or one per axis.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StepOverride {
    Uniform(f32),
    PerAxis {
        target_temperature: f32,
        current_temperature: f32,
    },
}

/// User-supplied visual settings.  Every field is optional.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisualOverride {
    pub min_temperature: Option<f32>,
    pub max_temperature: Option<f32>,
    pub temperature_step: Option<StepOverride>,
}

/// The validated, fully-populated visual range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualRange {
    pub min_temperature: f32,
    pub max_temperature: f32,
    pub target_temperature_step: f32,
    pub current_temperature_step: f32,
}

impl VisualRange {
    pub fn contains(&self, temperature: f32) -> bool {
        (self.min_temperature..=self.max_temperature).contains(&temperature)
    }
}

impl Default for VisualRange {
    fn default() -> Self {
        Self {
            min_temperature: PROTOCOL_MIN_TEMPERATURE,
            max_temperature: PROTOCOL_MAX_TEMPERATURE,
            target_temperature_step: PROTOCOL_TEMPERATURE_STEP_MIN,
            current_temperature_step: PROTOCOL_TEMPERATURE_STEP_MIN,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VisualRangeError {
    #[error("visual {field} must be a number")]
    NotANumber { field: &'static str },

    #[error(
        "visual min_temperature {value:?} must be greater than {:?}",
        PROTOCOL_MIN_TEMPERATURE
    )]
    MinTooLow { value: f32 },

    #[error(
        "visual max_temperature {value:?} must be less than {:?}",
        PROTOCOL_MAX_TEMPERATURE
    )]
    MaxTooHigh { value: f32 },

    #[error("visual min_temperature {min:?} is above max_temperature {max:?}")]
    Inverted { min: f32, max: f32 },

    #[error(
        "visual temperature_step must be {:?} or {:?}",
        PROTOCOL_TEMPERATURE_STEP_MIN,
        PROTOCOL_TEMPERATURE_STEP_MAX
    )]
    InvalidStep { value: f32 },
}

fn validate_step(value: f32) -> Result<f32, VisualRangeError> {
    if value == PROTOCOL_TEMPERATURE_STEP_MIN || value == PROTOCOL_TEMPERATURE_STEP_MAX {
        Ok(value)
    } else {
        Err(VisualRangeError::InvalidStep { value })
    }
}

/// Merges an optional override with the protocol defaults.
///
/// # Errors
///
/// Returns the first violated bound, checked in the order listed in the
/// module docs.
///
/// # Examples
///
/// ```rust
/// use appliance_core::validate_visual;
///
/// let range = validate_visual(None).unwrap();
/// assert_eq!(range.min_temperature, 16.0);
/// assert_eq!(range.target_temperature_step, 0.5);
/// ```
pub fn validate_visual(
    visual: Option<VisualOverride>,
) -> Result<VisualRange, VisualRangeError> {
    let Some(visual) = visual else {
        return Ok(VisualRange::default());
    };

    let bounds = [
        ("min_temperature", visual.min_temperature),
        ("max_temperature", visual.max_temperature),
    ];
    if let Some(&(field, _)) = bounds.iter().find(|(_, v)| v.is_some_and(f32::is_nan)) {
        return Err(VisualRangeError::NotANumber { field });
    }

    let min_temperature = match visual.min_temperature {
        Some(value) if value < PROTOCOL_MIN_TEMPERATURE => {
            return Err(VisualRangeError::MinTooLow { value })
        }
        Some(value) => value,
        None => PROTOCOL_MIN_TEMPERATURE,
    };

    let max_temperature = match visual.max_temperature {
        Some(value) if value > PROTOCOL_MAX_TEMPERATURE => {
            return Err(VisualRangeError::MaxTooHigh { value })
        }
        Some(value) => value,
        None => PROTOCOL_MAX_TEMPERATURE,
    };

    if min_temperature > max_temperature {
        return Err(VisualRangeError::Inverted {
            min: min_temperature,
            max: max_temperature,
        });
    }

    let (target_temperature_step, current_temperature_step) = match visual.temperature_step {
        None => (PROTOCOL_TEMPERATURE_STEP_MIN, PROTOCOL_TEMPERATURE_STEP_MIN),
        Some(StepOverride::Uniform(step)) => {
            let step = validate_step(step)?;
            (step, step)
        }
        Some(StepOverride::PerAxis {
            target_temperature,
            current_temperature,
        }) => (
            validate_step(target_temperature)?,
            validate_step(current_temperature)?,
        ),
    };

    Ok(VisualRange {
        min_temperature,
        max_temperature,
        target_temperature_step,
        current_temperature_step,
    })
}
