//! Fan entity: state, commands and traits.

use std::fmt;
use std::str::FromStr;

/// Rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanDirection {
    #[default]
    Forward,
    Reverse,
}

impl fmt::Display for FanDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forward => "FORWARD",
            Self::Reverse => "REVERSE",
        })
    }
}

impl FromStr for FanDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forward" => Ok(Self::Forward),
            "reverse" => Ok(Self::Reverse),
            other => Err(format!("unknown fan direction '{other}'")),
        }
    }
}

/// What the host sees of a fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanState {
    pub on: bool,
    /// 1-based speed level.
    pub speed: u8,
    pub direction: FanDirection,
}

impl fmt::Display for FanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} speed={} direction={}",
            if self.on { "ON" } else { "OFF" },
            self.speed,
            self.direction
        )
    }
}

/// A partial fan command; `None` fields keep their current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanCall {
    pub on: Option<bool>,
    pub speed: Option<u8>,
    pub direction: Option<FanDirection>,
}

/// What a fan supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanTraits {
    pub oscillation: bool,
    pub speed: bool,
    pub direction: bool,
    pub speed_count: u8,
}
