//! Light entity: classification, colour temperature, state and commands.
//!
//! # Kelvin and mireds (for beginners)
//!
//! White light is described by a *colour temperature*.  People usually talk
//! in Kelvin (2700 K is warm, 6000 K is cold), but home-automation hosts work
//! in *mireds*: one million divided by Kelvin.  Mireds grow as the light gets
//! warmer, and equal steps in mireds look like equal steps to the eye, which
//! makes them the natural unit for a slider.
//!
//! ```text
//!   6000 K  ->  166.7 mireds   (cold)
//!   2700 K  ->  370.4 mireds   (warm)
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::capability::CapabilityViolation;

/// Which physical channel of a KDK fixture a light entity drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum LightType {
    MainLight,
    NightLight,
}

impl fmt::Display for LightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MainLight => "MAIN_LIGHT",
            Self::NightLight => "NIGHT_LIGHT",
        })
    }
}

impl FromStr for LightType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MAIN_LIGHT" => Ok(Self::MainLight),
            "NIGHT_LIGHT" => Ok(Self::NightLight),
            other => Err(format!(
                "unknown light type '{other}', expected MAIN_LIGHT or NIGHT_LIGHT"
            )),
        }
    }
}

impl TryFrom<String> for LightType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Brightness,
    ColorTemperature,
}

// ── Colour temperature ────────────────────────────────────────────────────────

/// A colour temperature, stored in mireds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ColorTemperature {
    mireds: f32,
}

impl ColorTemperature {
    pub fn from_kelvin(kelvin: f32) -> Self {
        Self {
            mireds: 1_000_000.0 / kelvin,
        }
    }

    pub fn from_mireds(mireds: f32) -> Self {
        Self { mireds }
    }

    pub fn mireds(&self) -> f32 {
        self.mireds
    }

    pub fn kelvin(&self) -> f32 {
        1_000_000.0 / self.mireds
    }
}

impl fmt::Display for ColorTemperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}K", self.kelvin())
    }
}

/// Accepts `"6000K"`, `"6000 K"`, `"153 mireds"`, `"153mired"` or a bare
/// number of Kelvin.
impl FromStr for ColorTemperature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let lower = text.to_ascii_lowercase();
        let (number, is_mireds) = if let Some(n) = lower.strip_suffix("mireds") {
            (n, true)
        } else if let Some(n) = lower.strip_suffix("mired") {
            (n, true)
        } else if let Some(n) = lower.strip_suffix('k') {
            (n, false)
        } else {
            (lower.as_str(), false)
        };

        let value: f32 = number
            .trim()
            .parse()
            .map_err(|_| format!("invalid color temperature '{text}'"))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(format!("color temperature '{text}' must be positive"));
        }
        Ok(if is_mireds {
            Self::from_mireds(value)
        } else {
            Self::from_kelvin(value)
        })
    }
}

impl TryFrom<String> for ColorTemperature {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The cold and warm ends of a tunable-white light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTemperatureRange {
    pub cold: ColorTemperature,
    pub warm: ColorTemperature,
}

impl ColorTemperatureRange {
    pub const DEFAULT_COLD_KELVIN: f32 = 6000.0;
    pub const DEFAULT_WARM_KELVIN: f32 = 2700.0;

    pub fn cold_mireds(&self) -> f32 {
        self.cold.mireds()
    }

    pub fn warm_mireds(&self) -> f32 {
        self.warm.mireds()
    }
}

impl Default for ColorTemperatureRange {
    fn default() -> Self {
        Self {
            cold: ColorTemperature::from_kelvin(Self::DEFAULT_COLD_KELVIN),
            warm: ColorTemperature::from_kelvin(Self::DEFAULT_WARM_KELVIN),
        }
    }
}

/// Invalid light configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LightConfigError {
    #[error(
        "cold_white_color_temperature and warm_white_color_temperature must be given together \
         (missing {missing})"
    )]
    IncompletePair { missing: &'static str },

    #[error("cold white {cold} must be colder than warm white {warm}")]
    ColdNotColder {
        cold: ColorTemperature,
        warm: ColorTemperature,
    },
}

/// Resolves the configured colour temperature pair.
///
/// Both or neither must be given; neither installs the 6000 K / 2700 K
/// defaults.
///
/// # Errors
///
/// - [`LightConfigError::IncompletePair`] if only one end is given.
/// - [`LightConfigError::ColdNotColder`] if the cold end is not colder.
pub fn resolve_color_temperature(
    cold: Option<ColorTemperature>,
    warm: Option<ColorTemperature>,
) -> Result<ColorTemperatureRange, LightConfigError> {
    match (cold, warm) {
        (None, None) => Ok(ColorTemperatureRange::default()),
        (Some(_), None) => Err(LightConfigError::IncompletePair {
            missing: "warm_white_color_temperature",
        }),
        (None, Some(_)) => Err(LightConfigError::IncompletePair {
            missing: "cold_white_color_temperature",
        }),
        (Some(cold), Some(warm)) => {
            if cold.mireds() >= warm.mireds() {
                return Err(LightConfigError::ColdNotColder { cold, warm });
            }
            Ok(ColorTemperatureRange { cold, warm })
        }
    }
}

// ── State, commands, traits ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightState {
    pub on: bool,
    /// 0.0 ..= 1.0
    pub brightness: f32,
    /// In mireds; `None` for brightness-only lights.
    pub color_temperature: Option<f32>,
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} brightness={:.0}%",
            if self.on { "ON" } else { "OFF" },
            self.brightness * 100.0
        )?;
        if let Some(ct) = self.color_temperature {
            write!(f, " color_temperature={ct:.0} mireds")?;
        }
        Ok(())
    }
}

/// A partial light command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightCall {
    pub on: Option<bool>,
    pub brightness: Option<f32>,
    /// In mireds.
    pub color_temperature: Option<f32>,
    pub transition: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightTraits {
    pub color_mode: ColorMode,
    /// Coldest and warmest supported mireds for colour-temperature lights.
    pub mireds_range: Option<(f32, f32)>,
}

impl LightTraits {
    pub fn brightness_only() -> Self {
        Self {
            color_mode: ColorMode::Brightness,
            mireds_range: None,
        }
    }

    pub fn color_temperature(range: &ColorTemperatureRange) -> Self {
        Self {
            color_mode: ColorMode::ColorTemperature,
            mireds_range: Some((range.cold_mireds(), range.warm_mireds())),
        }
    }

    /// Rejects a colour-temperature command against a brightness-only light.
    pub fn validate(&self, call: &LightCall) -> Result<(), CapabilityViolation> {
        if call.color_temperature.is_some() && self.color_mode == ColorMode::Brightness {
            return Err(CapabilityViolation::ColorTemperature);
        }
        Ok(())
    }
}
