//! Climate entity: modes, capability sets, traits, state and commands.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::capability::CapabilityViolation;
use super::visual::VisualRange;

/// Declares a climate enum that parses case-insensitively from its
/// upper-case configuration name.
macro_rules! climate_enum {
    ($(#[$meta:meta])* $name:ident, $what:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
        #[serde(try_from = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $label),+
                })
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($label => Ok(Self::$variant),)+
                    other => Err(format!(concat!("unknown ", $what, " '{}'"), other)),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

climate_enum! {
    ClimateMode, "climate mode" {
        Off => "OFF",
        HeatCool => "HEAT_COOL",
        Cool => "COOL",
        Heat => "HEAT",
        Dry => "DRY",
        FanOnly => "FAN_ONLY",
        Auto => "AUTO",
    }
}

climate_enum! {
    ClimateFanMode, "fan mode" {
        Auto => "AUTO",
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Focus => "FOCUS",
        Quiet => "QUIET",
    }
}

climate_enum! {
    ClimateSwingMode, "swing mode" {
        Off => "OFF",
        Both => "BOTH",
        Vertical => "VERTICAL",
        Horizontal => "HORIZONTAL",
    }
}

/// What the unit is doing right now, as opposed to what it was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimateAction {
    Off,
    Cooling,
    Heating,
    Idle,
    Drying,
    Fan,
}

impl fmt::Display for ClimateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "OFF",
            Self::Cooling => "COOLING",
            Self::Heating => "HEATING",
            Self::Idle => "IDLE",
            Self::Drying => "DRYING",
            Self::Fan => "FAN",
        })
    }
}

/// An unordered, duplicate-free set of supported modes.
pub type CapabilitySet<T> = BTreeSet<T>;

/// Swing modes offered when the configuration names none.
pub fn default_swing_modes() -> CapabilitySet<ClimateSwingMode> {
    BTreeSet::from([ClimateSwingMode::Vertical])
}

/// Modes the MEL-AC driver always offers on top of the configured ones.
pub const ALWAYS_MODES: [ClimateMode; 2] = [ClimateMode::Off, ClimateMode::Auto];
pub const ALWAYS_FAN_MODES: [ClimateFanMode; 4] = [
    ClimateFanMode::Auto,
    ClimateFanMode::Low,
    ClimateFanMode::Medium,
    ClimateFanMode::High,
];
pub const ALWAYS_SWING_MODES: [ClimateSwingMode; 1] = [ClimateSwingMode::Off];

/// What a climate entity advertises and accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateTraits {
    pub modes: CapabilitySet<ClimateMode>,
    pub fan_modes: CapabilitySet<ClimateFanMode>,
    pub swing_modes: CapabilitySet<ClimateSwingMode>,
    pub visual: VisualRange,
    pub supports_action: bool,
    pub supports_current_temperature: bool,
}

impl ClimateTraits {
    /// Builds the effective traits: the configured sets plus the modes that
    /// are always available.
    pub fn new(
        modes: &CapabilitySet<ClimateMode>,
        fan_modes: &CapabilitySet<ClimateFanMode>,
        swing_modes: &CapabilitySet<ClimateSwingMode>,
        visual: VisualRange,
    ) -> Self {
        Self {
            modes: modes.iter().copied().chain(ALWAYS_MODES).collect(),
            fan_modes: fan_modes.iter().copied().chain(ALWAYS_FAN_MODES).collect(),
            swing_modes: swing_modes
                .iter()
                .copied()
                .chain(ALWAYS_SWING_MODES)
                .collect(),
            visual,
            supports_action: true,
            supports_current_temperature: true,
        }
    }

    /// Checks a command against the supported sets and the visual range.
    ///
    /// # Errors
    ///
    /// Returns the first [`CapabilityViolation`] found, checking mode, target
    /// temperature, fan mode and swing mode in that order.
    pub fn validate(&self, call: &ClimateCall) -> Result<(), CapabilityViolation> {
        if let Some(mode) = call.mode {
            if !self.modes.contains(&mode) {
                return Err(CapabilityViolation::Mode(mode));
            }
        }
        if let Some(value) = call.target_temperature {
            if !self.visual.contains(value) {
                return Err(CapabilityViolation::TargetTemperature {
                    value,
                    min: self.visual.min_temperature,
                    max: self.visual.max_temperature,
                });
            }
        }
        if let Some(fan_mode) = call.fan_mode {
            if !self.fan_modes.contains(&fan_mode) {
                return Err(CapabilityViolation::FanMode(fan_mode));
            }
        }
        if let Some(swing_mode) = call.swing_mode {
            if !self.swing_modes.contains(&swing_mode) {
                return Err(CapabilityViolation::SwingMode(swing_mode));
            }
        }
        Ok(())
    }
}

/// A partial climate command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClimateCall {
    pub mode: Option<ClimateMode>,
    pub target_temperature: Option<f32>,
    pub fan_mode: Option<ClimateFanMode>,
    pub swing_mode: Option<ClimateSwingMode>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateState {
    pub mode: ClimateMode,
    pub action: ClimateAction,
    pub current_temperature: f32,
    pub target_temperature: f32,
    pub fan_mode: ClimateFanMode,
    pub swing_mode: ClimateSwingMode,
}

impl fmt::Display for ClimateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={} action={} current={:.1} target={:.1} fan={} swing={}",
            self.mode,
            self.action,
            self.current_temperature,
            self.target_temperature,
            self.fan_mode,
            self.swing_mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traits(swing: CapabilitySet<ClimateSwingMode>) -> ClimateTraits {
        ClimateTraits::new(
            &BTreeSet::from([ClimateMode::Cool]),
            &BTreeSet::new(),
            &swing,
            VisualRange::default(),
        )
    }

    #[test]
    fn test_default_swing_set_is_exactly_vertical() {
        assert_eq!(
            default_swing_modes().into_iter().collect::<Vec<_>>(),
            vec![ClimateSwingMode::Vertical]
        );
    }

    #[test]
    fn test_traits_add_always_available_modes() {
        // Arrange / Act
        let traits = traits(default_swing_modes());

        // Assert
        assert!(traits.modes.contains(&ClimateMode::Off));
        assert!(traits.modes.contains(&ClimateMode::Auto));
        assert!(traits.modes.contains(&ClimateMode::Cool));
        assert!(!traits.modes.contains(&ClimateMode::Heat));
        assert_eq!(traits.fan_modes.len(), 4);
        assert_eq!(
            traits.swing_modes,
            BTreeSet::from([ClimateSwingMode::Off, ClimateSwingMode::Vertical])
        );
    }

    #[test]
    fn test_unsupported_mode_is_rejected() {
        let traits = traits(default_swing_modes());
        let call = ClimateCall {
            mode: Some(ClimateMode::Heat),
            ..ClimateCall::default()
        };
        assert_eq!(
            traits.validate(&call),
            Err(CapabilityViolation::Mode(ClimateMode::Heat))
        );
    }

    #[test]
    fn test_unsupported_swing_and_fan_are_rejected() {
        let traits = traits(default_swing_modes());

        let swing = ClimateCall {
            swing_mode: Some(ClimateSwingMode::Both),
            ..ClimateCall::default()
        };
        assert_eq!(
            traits.validate(&swing),
            Err(CapabilityViolation::SwingMode(ClimateSwingMode::Both))
        );

        let fan = ClimateCall {
            fan_mode: Some(ClimateFanMode::Quiet),
            ..ClimateCall::default()
        };
        assert_eq!(
            traits.validate(&fan),
            Err(CapabilityViolation::FanMode(ClimateFanMode::Quiet))
        );
    }

    #[test]
    fn test_target_outside_visual_range_is_rejected() {
        let traits = traits(default_swing_modes());
        let call = ClimateCall {
            target_temperature: Some(35.0),
            ..ClimateCall::default()
        };
        assert!(matches!(
            traits.validate(&call),
            Err(CapabilityViolation::TargetTemperature { .. })
        ));
    }

    #[test]
    fn test_supported_call_passes() {
        let traits = traits(default_swing_modes());
        let call = ClimateCall {
            mode: Some(ClimateMode::Cool),
            target_temperature: Some(24.5),
            fan_mode: Some(ClimateFanMode::High),
            swing_mode: Some(ClimateSwingMode::Vertical),
        };
        assert_eq!(traits.validate(&call), Ok(()));
    }

    #[test]
    fn test_modes_parse_from_config_names() {
        assert_eq!("heat_cool".parse::<ClimateMode>(), Ok(ClimateMode::HeatCool));
        assert_eq!("FAN_ONLY".parse::<ClimateMode>(), Ok(ClimateMode::FanOnly));
        assert_eq!("focus".parse::<ClimateFanMode>(), Ok(ClimateFanMode::Focus));
        assert!("diagonal".parse::<ClimateSwingMode>().is_err());
    }
}
