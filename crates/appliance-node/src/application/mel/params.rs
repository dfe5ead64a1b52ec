//! The node's copy of the air conditioner's settings.
//!
//! Every poll response is folded in here.  A setter raises the `updated`
//! flag only when it actually changes a value that is visible in the
//! published climate state, so a poll cycle that finds nothing new
//! publishes nothing.  The iSee sensor, the temperature encoding and the
//! compressor frequency are tracked but never trigger a publish.

use appliance_core::protocol::mel::message::TEMPERATURE_DEFAULT;
use appliance_core::protocol::mel::{
    FanSpeed, Mode, ParamsReport, Power, StatusReport, TemperatureEncoding, VaneHorizontal,
    VaneVertical,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AcParams {
    updated: bool,
    power: Power,
    isee: bool,
    mode: Mode,
    fan: FanSpeed,
    vane_vertical: VaneVertical,
    vane_horizontal: VaneHorizontal,
    vane_horizontal_flag: bool,
    target_temperature: f32,
    current_temperature: f32,
    encoding: TemperatureEncoding,
    compressor_operating: bool,
    compressor_frequency: u8,
}

impl Default for AcParams {
    fn default() -> Self {
        Self {
            updated: true,
            power: Power::Off,
            isee: false,
            mode: Mode::Auto,
            fan: FanSpeed::Auto,
            vane_vertical: VaneVertical::Auto,
            vane_horizontal: VaneHorizontal::Auto,
            vane_horizontal_flag: false,
            target_temperature: TEMPERATURE_DEFAULT,
            current_temperature: TEMPERATURE_DEFAULT,
            encoding: TemperatureEncoding::Offset,
            compressor_operating: false,
            compressor_frequency: 0,
        }
    }
}

/// Stores `value` in `slot` and reports whether it changed.
fn sync<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// Like [`sync`] for a decoded wire enum; an unknown raw value is logged
/// and the previous value kept.
fn sync_known<T: PartialEq>(
    slot: &mut T,
    value: Result<T, u8>,
    what: &str,
) -> bool {
    match value {
        Ok(value) => sync(slot, value),
        Err(raw) => {
            warn!("RES>   {what}: 0x{raw:02X} [UNKNOWN]");
            false
        }
    }
}

impl AcParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if something visible changed since the last publish.
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    pub fn clear_updated(&mut self) {
        self.updated = false;
    }

    /// Folds in a GET_PARAMS response.
    pub fn apply_params(&mut self, report: &ParamsReport) {
        let mut changed = false;
        changed |= sync_known(&mut self.power, report.power, "power");
        changed |= sync_known(&mut self.mode, report.mode, "mode");
        changed |= sync_known(&mut self.fan, report.fan, "fan");
        changed |= sync_known(&mut self.vane_vertical, report.vane_vertical, "vane vertical");
        changed |= sync_known(
            &mut self.vane_horizontal,
            report.vane_horizontal,
            "vane horizontal",
        );
        changed |= sync(&mut self.vane_horizontal_flag, report.vane_horizontal_flag);
        changed |= sync(&mut self.target_temperature, report.target_temperature);
        self.isee = report.isee;
        self.encoding = report.encoding;

        debug!(
            "RES>   power={} mode={} fan={} vane={}/{} target={:.1} isee={}",
            self.power,
            self.mode,
            self.fan,
            self.vane_vertical,
            self.vane_horizontal,
            self.target_temperature,
            self.isee
        );
        self.updated |= changed;
    }

    /// Folds in a GET_TEMP response.
    pub fn apply_room_temperature(&mut self, temperature: f32) {
        debug!("RES>   room temperature={temperature:.1}");
        self.updated |= sync(&mut self.current_temperature, temperature);
    }

    /// Folds in a GET_STATUS response.
    pub fn apply_status(&mut self, status: StatusReport) {
        debug!(
            "RES>   compressor operating={} frequency={}",
            status.compressor_operating, status.compressor_frequency
        );
        self.updated |= sync(&mut self.compressor_operating, status.compressor_operating);
        self.compressor_frequency = status.compressor_frequency;
    }

    pub fn power(&self) -> Power {
        self.power
    }

    pub fn isee(&self) -> bool {
        self.isee
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn fan(&self) -> FanSpeed {
        self.fan
    }

    pub fn vane_vertical(&self) -> VaneVertical {
        self.vane_vertical
    }

    pub fn vane_horizontal(&self) -> VaneHorizontal {
        self.vane_horizontal
    }

    pub fn target_temperature(&self) -> f32 {
        self.target_temperature
    }

    pub fn current_temperature(&self) -> f32 {
        self.current_temperature
    }

    /// How the unit last encoded its set-point; SET requests use the same.
    pub fn encoding(&self) -> TemperatureEncoding {
        self.encoding
    }

    pub fn compressor_operating(&self) -> bool {
        self.compressor_operating
    }

    pub fn compressor_frequency(&self) -> u8 {
        self.compressor_frequency
    }
}
