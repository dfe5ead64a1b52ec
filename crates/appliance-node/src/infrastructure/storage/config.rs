//! TOML configuration for the appliance node.
//!
//! # Two stages (for beginners)
//!
//! ```text
//!   file text ──toml + serde──► RawConfig ──validate()──► NodeConfig
//!             (syntax, types)   Option<T>   (semantics)   every default filled
//! ```
//!
//! `serde` only checks that the file has the right *shape*.  Everything that
//! depends on more than one field (ids that must be unique, a light that
//! names a connection that must exist, temperatures that must stay inside
//! what the protocol can express) is checked afterwards by small functions
//! that run in a fixed order:
//!
//! 1. ids are unique and no two components share a serial port,
//! 2. update intervals are not zero,
//! 3. climate visual ranges are inside the protocol bounds,
//! 4. light colour temperatures are given as a pair,
//! 5. every fan and light resolves to a configured KDK connection.
//!
//! A fan or light may leave out `kdk_conn_id` when exactly one `[[kdk]]`
//! section exists; it is then attached to that connection.
//!
//! The first failing check wins, so the same broken file always produces the
//! same message.
//!
//! # Example
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [[kdk]]
//! id = "ceiling"
//! poll_interval = "15s"
//! uart = { port = "/dev/ttyUSB0" }
//!
//! [[fan]]
//! id = "ceiling_fan"
//! kdk_conn_id = "ceiling"
//!
//! [[climate]]
//! id = "living_room_ac"
//! supported_modes = ["COOL", "HEAT"]
//! visual = { min_temperature = 18.0, temperature_step = 1.0 }
//! uart = { port = "tcp://192.168.1.40:8888", baud_rate = 2400 }
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use appliance_core::domain::climate::{
    default_swing_modes, ClimateFanMode, ClimateMode, ClimateSwingMode, ClimateTraits,
};
use appliance_core::domain::light::{
    resolve_color_temperature, ColorTemperature, LightConfigError, LightType,
};
use appliance_core::domain::serial::{Parity, UartSettings};
use appliance_core::{validate_visual, ConnectionId, EntityId, VisualOverride, VisualRangeError};
use serde::Deserialize;
use thiserror::Error;

use crate::application::kdk::connection::ConnectionSettings;
use crate::application::kdk::fan::FanSettings;
use crate::application::kdk::light::LightSettings;
use crate::application::mel::ClimateSettings;

/// Error type for loading and validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed into the expected shape.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate {section} id '{id}'")]
    DuplicateId { section: &'static str, id: String },

    /// Two components were given the same device or bridge address.
    #[error("{second} uses port '{port}', which is already used by {first}")]
    DuplicatePort {
        port: String,
        first: String,
        second: String,
    },

    #[error("{owner}: {field} must be greater than zero")]
    ZeroInterval { owner: String, field: &'static str },

    #[error("{entity} refers to unknown KDK connection '{connection}'")]
    UnresolvedConnection {
        entity: EntityId,
        connection: ConnectionId,
    },

    /// `kdk_conn_id` was left out but there is not exactly one connection.
    #[error("{entity} does not set kdk_conn_id and {count} KDK connections are configured")]
    AmbiguousConnection { entity: EntityId, count: usize },

    #[error("light {light}: {source}")]
    Light {
        light: EntityId,
        #[source]
        source: LightConfigError,
    },

    #[error("climate {climate}: {source}")]
    Visual {
        climate: EntityId,
        #[source]
        source: VisualRangeError,
    },
}

// ── Raw schema ────────────────────────────────────────────────────────────────

/// A duration written the human way: `"500ms"`, `"15s"`, `"1m 30s"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct HumanDuration(pub Duration);

impl TryFrom<String> for HumanDuration {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        humantime::parse_duration(&value)
            .map(Self)
            .map_err(|e| format!("invalid duration '{value}': {e}"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorTemperatureText {
    Kelvin(f32),
    Text(String),
}

/// A colour temperature as written in the file: `"6000K"`,
/// `"153 mireds"` or a bare number of Kelvin.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "ColorTemperatureText")]
pub struct ConfigColorTemperature(pub ColorTemperature);

impl TryFrom<ColorTemperatureText> for ConfigColorTemperature {
    type Error = String;

    fn try_from(value: ColorTemperatureText) -> Result<Self, Self::Error> {
        match value {
            ColorTemperatureText::Kelvin(kelvin) if kelvin.is_finite() && kelvin > 0.0 => {
                Ok(Self(ColorTemperature::from_kelvin(kelvin)))
            }
            ColorTemperatureText::Kelvin(kelvin) => {
                Err(format!("color temperature {kelvin} must be positive"))
            }
            ColorTemperatureText::Text(text) => text.parse().map(Self),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub logging: RawLogging,
    #[serde(default)]
    pub kdk: Vec<RawKdk>,
    #[serde(default)]
    pub fan: Vec<RawFan>,
    #[serde(default)]
    pub light: Vec<RawLight>,
    #[serde(default)]
    pub climate: Vec<RawClimate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawLogging {
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawUart {
    /// Device path or `tcp://host:port`.
    pub port: String,
    pub baud_rate: Option<u32>,
    pub parity: Option<Parity>,
    pub data_bits: Option<u8>,
    pub stop_bits: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawKdk {
    pub id: ConnectionId,
    pub receive_timeout: Option<HumanDuration>,
    pub poll_interval: Option<HumanDuration>,
    pub update_interval: Option<HumanDuration>,
    pub uart: RawUart,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFan {
    pub id: EntityId,
    pub name: Option<String>,
    pub kdk_conn_id: Option<ConnectionId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawLight {
    pub id: EntityId,
    pub name: Option<String>,
    pub kdk_conn_id: Option<ConnectionId>,
    pub light_type: LightType,
    pub cold_white_color_temperature: Option<ConfigColorTemperature>,
    pub warm_white_color_temperature: Option<ConfigColorTemperature>,
    pub default_transition_length: Option<HumanDuration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawClimate {
    pub id: EntityId,
    pub name: Option<String>,
    pub max_refresh_rate: Option<HumanDuration>,
    pub startup_delay: Option<HumanDuration>,
    pub update_interval: Option<HumanDuration>,
    pub supported_modes: Option<BTreeSet<ClimateMode>>,
    pub supported_fan_modes: Option<BTreeSet<ClimateFanMode>>,
    pub supported_swing_modes: Option<BTreeSet<ClimateSwingMode>>,
    pub visual: Option<VisualOverride>,
    pub uart: RawUart,
}

// ── Validated configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct KdkConnectionConfig {
    pub id: ConnectionId,
    pub port: String,
    pub settings: ConnectionSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FanConfig {
    pub connection: ConnectionId,
    pub settings: FanSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightConfig {
    pub connection: ConnectionId,
    pub settings: LightSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClimateConfig {
    pub port: String,
    pub settings: ClimateSettings,
}

/// The validated configuration; every default is filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub log_level: String,
    pub connections: Vec<KdkConnectionConfig>,
    pub fans: Vec<FanConfig>,
    pub lights: Vec<LightConfig>,
    pub climates: Vec<ClimateConfig>,
}

impl NodeConfig {
    /// Number of entities across all sections.
    pub fn entity_count(&self) -> usize {
        self.fans.len() + self.lights.len() + self.climates.len()
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}

fn default_transition_length() -> Duration {
    Duration::from_secs(1)
}

fn uart_settings(raw: &RawUart) -> UartSettings {
    let defaults = UartSettings::default();
    UartSettings {
        baud_rate: raw.baud_rate.unwrap_or(defaults.baud_rate),
        parity: raw.parity.unwrap_or(defaults.parity),
        data_bits: raw.data_bits.unwrap_or(defaults.data_bits),
        stop_bits: raw.stop_bits.unwrap_or(defaults.stop_bits),
    }
}

fn duration_or(value: Option<HumanDuration>, default: Duration) -> Duration {
    value.map_or(default, |d| d.0)
}

// ── Validation steps ──────────────────────────────────────────────────────────

fn check_unique_ids(raw: &RawConfig) -> Result<(), ConfigError> {
    let mut connections = HashSet::new();
    for kdk in &raw.kdk {
        if !connections.insert(&kdk.id) {
            return Err(ConfigError::DuplicateId {
                section: "kdk",
                id: kdk.id.to_string(),
            });
        }
    }

    let mut entities = HashSet::new();
    let ids = raw
        .fan
        .iter()
        .map(|f| ("fan", &f.id))
        .chain(raw.light.iter().map(|l| ("light", &l.id)))
        .chain(raw.climate.iter().map(|c| ("climate", &c.id)));
    for (section, id) in ids {
        if !entities.insert(id) {
            return Err(ConfigError::DuplicateId {
                section,
                id: id.to_string(),
            });
        }
    }

    let mut ports: HashMap<&str, String> = HashMap::new();
    let owners = raw
        .kdk
        .iter()
        .map(|k| (k.uart.port.as_str(), format!("kdk {}", k.id)))
        .chain(
            raw.climate
                .iter()
                .map(|c| (c.uart.port.as_str(), format!("climate {}", c.id))),
        );
    for (port, owner) in owners {
        if let Some(first) = ports.get(port) {
            return Err(ConfigError::DuplicatePort {
                port: port.to_string(),
                first: first.clone(),
                second: owner,
            });
        }
        ports.insert(port, owner);
    }
    Ok(())
}

fn check_intervals(raw: &RawConfig) -> Result<(), ConfigError> {
    let intervals = raw
        .kdk
        .iter()
        .map(|k| (format!("kdk {}", k.id), k.update_interval))
        .chain(
            raw.climate
                .iter()
                .map(|c| (format!("climate {}", c.id), c.update_interval)),
        );
    for (owner, interval) in intervals {
        if interval.is_some_and(|d| d.0.is_zero()) {
            return Err(ConfigError::ZeroInterval {
                owner,
                field: "update_interval",
            });
        }
    }
    Ok(())
}

fn resolve_climates(raw: &[RawClimate]) -> Result<Vec<ClimateConfig>, ConfigError> {
    raw.iter()
        .map(|c| {
            let visual = validate_visual(c.visual).map_err(|source| ConfigError::Visual {
                climate: c.id.clone(),
                source,
            })?;
            let traits = ClimateTraits::new(
                &c.supported_modes.clone().unwrap_or_default(),
                &c.supported_fan_modes.clone().unwrap_or_default(),
                &c.supported_swing_modes
                    .clone()
                    .unwrap_or_else(default_swing_modes),
                visual,
            );
            Ok(ClimateConfig {
                port: c.uart.port.clone(),
                settings: ClimateSettings {
                    id: c.id.clone(),
                    name: c.name.clone().unwrap_or_else(|| c.id.to_string()),
                    max_refresh_rate: duration_or(
                        c.max_refresh_rate,
                        ClimateSettings::DEFAULT_MAX_REFRESH_RATE,
                    ),
                    startup_delay: duration_or(
                        c.startup_delay,
                        ClimateSettings::DEFAULT_STARTUP_DELAY,
                    ),
                    update_interval: duration_or(
                        c.update_interval,
                        ClimateSettings::DEFAULT_UPDATE_INTERVAL,
                    ),
                    traits,
                    uart: uart_settings(&c.uart),
                },
            })
        })
        .collect()
}

fn resolve_lights(raw: &[RawLight]) -> Result<Vec<LightSettings>, ConfigError> {
    raw.iter()
        .map(|l| {
            let range = resolve_color_temperature(
                l.cold_white_color_temperature.map(|t| t.0),
                l.warm_white_color_temperature.map(|t| t.0),
            )
            .map_err(|source| ConfigError::Light {
                light: l.id.clone(),
                source,
            })?;
            Ok(LightSettings {
                id: l.id.clone(),
                name: l.name.clone().unwrap_or_else(|| l.id.to_string()),
                light_type: l.light_type,
                range,
                default_transition_length: duration_or(
                    l.default_transition_length,
                    default_transition_length(),
                ),
            })
        })
        .collect()
}

fn resolve_connection(
    kdk: &[RawKdk],
    entity: &EntityId,
    named: Option<&ConnectionId>,
) -> Result<ConnectionId, ConfigError> {
    match (named, kdk) {
        (Some(connection), _) if kdk.iter().any(|k| &k.id == connection) => {
            Ok(connection.clone())
        }
        (Some(connection), _) => Err(ConfigError::UnresolvedConnection {
            entity: entity.clone(),
            connection: connection.clone(),
        }),
        (None, [only]) => Ok(only.id.clone()),
        (None, _) => Err(ConfigError::AmbiguousConnection {
            entity: entity.clone(),
            count: kdk.len(),
        }),
    }
}

/// Connection of every fan, then of every light, in file order.
fn check_references(
    raw: &RawConfig,
) -> Result<(Vec<ConnectionId>, Vec<ConnectionId>), ConfigError> {
    let fans: Vec<ConnectionId> = raw
        .fan
        .iter()
        .map(|f| resolve_connection(&raw.kdk, &f.id, f.kdk_conn_id.as_ref()))
        .collect::<Result<_, _>>()?;
    let lights: Vec<ConnectionId> = raw
        .light
        .iter()
        .map(|l| resolve_connection(&raw.kdk, &l.id, l.kdk_conn_id.as_ref()))
        .collect::<Result<_, _>>()?;
    Ok((fans, lights))
}

impl RawConfig {
    /// Runs every check and fills in the defaults.
    ///
    /// # Errors
    ///
    /// Returns the first failing check, in the order listed in the module
    /// docs.
    pub fn validate(self) -> Result<NodeConfig, ConfigError> {
        check_unique_ids(&self)?;
        check_intervals(&self)?;
        let climates = resolve_climates(&self.climate)?;
        let lights = resolve_lights(&self.light)?;
        let (fan_connections, light_connections) = check_references(&self)?;

        let defaults = ConnectionSettings::default();
        let connections = self
            .kdk
            .iter()
            .map(|k| KdkConnectionConfig {
                id: k.id.clone(),
                port: k.uart.port.clone(),
                settings: ConnectionSettings {
                    receive_timeout: duration_or(k.receive_timeout, defaults.receive_timeout),
                    poll_interval: duration_or(k.poll_interval, defaults.poll_interval),
                    update_interval: duration_or(k.update_interval, defaults.update_interval),
                    byte_timeout: defaults.byte_timeout,
                    uart: uart_settings(&k.uart),
                },
            })
            .collect();

        let fans = self
            .fan
            .iter()
            .zip(fan_connections)
            .map(|(f, connection)| FanConfig {
                connection,
                settings: FanSettings {
                    id: f.id.clone(),
                    name: f.name.clone().unwrap_or_else(|| f.id.to_string()),
                },
            })
            .collect();
        let lights = lights
            .into_iter()
            .zip(light_connections)
            .map(|(settings, connection)| LightConfig {
                connection,
                settings,
            })
            .collect();

        Ok(NodeConfig {
            log_level: self.logging.level.unwrap_or_else(default_log_level),
            connections,
            fans,
            lights,
            climates,
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses and validates configuration text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML and the matching
/// validation variant for a semantic problem.
pub fn parse_config(text: &str) -> Result<NodeConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(text)?;
    raw.validate()
}

/// Reads, parses and validates the file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, otherwise see
/// [`parse_config`].
pub fn load_config(path: &Path) -> Result<NodeConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
