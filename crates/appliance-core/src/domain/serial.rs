//! UART settings and per-protocol requirements.
//!
//! The node opens each device with the configured settings.  Each driver
//! also knows what its appliance expects and reports a mismatch at
//! start-up, so a wrong baud rate shows up in the log instead of as silent
//! timeouts.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Parity {
    None,
    Even,
    Odd,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::Even => "EVEN",
            Self::Odd => "ODD",
        })
    }
}

impl TryFrom<String> for Parity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "even" => Ok(Self::Even),
            "odd" => Ok(Self::Odd),
            other => Err(format!("unknown parity '{other}'")),
        }
    }
}

/// Settings of the UART a driver is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartSettings {
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: u8,
    pub stop_bits: u8,
}

impl Default for UartSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            parity: Parity::Even,
            data_bits: 8,
            stop_bits: 1,
        }
    }
}

impl fmt::Display for UartSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} baud, {} data bits, parity {}, {} stop bit(s)",
            self.baud_rate, self.data_bits, self.parity, self.stop_bits
        )
    }
}

/// One way in which the UART differs from what the appliance needs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerialMismatch {
    #[error("unsupported baud rate {actual}, supported: {supported:?}")]
    BaudRate { actual: u32, supported: Vec<u32> },

    #[error("parity {actual} does not match required {required}")]
    Parity { actual: Parity, required: Parity },

    #[error("{actual} data bits do not match required {required}")]
    DataBits { actual: u8, required: u8 },

    #[error("{actual} stop bits do not match required {required}")]
    StopBits { actual: u8, required: u8 },
}

/// What an appliance protocol needs from its UART.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialRequirements {
    pub baud_rates: &'static [u32],
    pub parity: Parity,
    pub data_bits: u8,
    pub stop_bits: u8,
}

impl SerialRequirements {
    /// KDK fans: 9600 8E1.
    pub const KDK: Self = Self {
        baud_rates: &[9600],
        parity: Parity::Even,
        data_bits: 8,
        stop_bits: 1,
    };

    /// MEL-AC units: 2400, 4800 or 9600 baud, 8E1.
    pub const MEL_AC: Self = Self {
        baud_rates: &[2400, 4800, 9600],
        parity: Parity::Even,
        data_bits: 8,
        stop_bits: 1,
    };

    /// Lists every way `settings` violates these requirements.
    pub fn check(&self, settings: &UartSettings) -> Vec<SerialMismatch> {
        let mut mismatches = Vec::new();
        if !self.baud_rates.contains(&settings.baud_rate) {
            mismatches.push(SerialMismatch::BaudRate {
                actual: settings.baud_rate,
                supported: self.baud_rates.to_vec(),
            });
        }
        if settings.parity != self.parity {
            mismatches.push(SerialMismatch::Parity {
                actual: settings.parity,
                required: self.parity,
            });
        }
        if settings.data_bits != self.data_bits {
            mismatches.push(SerialMismatch::DataBits {
                actual: settings.data_bits,
                required: self.data_bits,
            });
        }
        if settings.stop_bits != self.stop_bits {
            mismatches.push(SerialMismatch::StopBits {
                actual: settings.stop_bits,
                required: self.stop_bits,
            });
        }
        mismatches
    }
}
