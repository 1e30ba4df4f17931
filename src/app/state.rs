//! The single process-wide record of system state.
//!
//! `SystemState` is owned by the [`AppService`](super::service::AppService)
//! and only mutated through the four entry points below.  Each entry point
//! leaves every invariant holding before it returns:
//!
//! - sensed fields are always inside their clamp range (unavailable or
//!   non-finite readings are replaced by the quantity's safe default);
//! - actuator fields always equal the last applied [`ActuatorCommand`];
//! - configuration fields are always in their valid range.
//!
//! Readers only ever see a [`Snapshot`] copy, so no reader can observe a
//! mix of two cycles.

use log::debug;
use serde::Serialize;

use crate::config::{self, PersistedConfig, MAX_FAN_SPEED_PERCENT};
use crate::error::CommandError;

use super::commands::{ChannelId, ValveId};

// ───────────────────────────────────────────────────────────────
// Sensed quantities
// ───────────────────────────────────────────────────────────────

/// Every physical quantity the controller samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    /// Greenhouse air temperature (°C), DHT22.
    InternalTemperature,
    /// Barometric pressure (bar), BMP280.
    Pressure,
    /// Soil moisture (%).
    SoilMoisture,
    /// Wind speed (km/h).
    WindSpeed,
    /// Light intensity (%).
    LightIntensity,
    /// CO2 saturation (ppm).
    Co2Saturation,
    /// Outside air temperature (°C).
    ExternalTemperature,
}

impl Quantity {
    pub const COUNT: usize = 7;

    pub const ALL: [Quantity; Self::COUNT] = [
        Quantity::InternalTemperature,
        Quantity::Pressure,
        Quantity::SoilMoisture,
        Quantity::WindSpeed,
        Quantity::LightIntensity,
        Quantity::Co2Saturation,
        Quantity::ExternalTemperature,
    ];

    /// Inclusive clamp range `(min, max)`.
    pub const fn bounds(self) -> (f32, f32) {
        match self {
            Self::InternalTemperature => (-40.0, 80.0),
            Self::Pressure => (0.3, 1.2),
            Self::SoilMoisture | Self::LightIntensity => (0.0, 100.0),
            Self::WindSpeed => (0.0, 50.0),
            Self::Co2Saturation => (300.0, 600.0),
            Self::ExternalTemperature => (-20.0, 50.0),
        }
    }

    /// Value used when the reading is unavailable or not finite.
    pub const fn safe_default(self) -> f32 {
        match self {
            Self::InternalTemperature => 22.5,
            Self::Pressure => 1.013,
            Self::SoilMoisture | Self::LightIntensity => 50.0,
            Self::WindSpeed => 0.0,
            Self::Co2Saturation => 400.0,
            Self::ExternalTemperature => 20.0,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::InternalTemperature => "temperature",
            Self::Pressure => "pressure",
            Self::SoilMoisture => "soil_moisture",
            Self::WindSpeed => "wind_speed",
            Self::LightIntensity => "light_intensity",
            Self::Co2Saturation => "co2_saturation",
            Self::ExternalTemperature => "external_temperature",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// How a raw reading was turned into a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conditioning {
    /// Stored as read.
    AsRead,
    /// Finite but outside the range; clamped to the nearest bound.
    Clamped,
    /// Unavailable or not finite; replaced by the safe default.
    Defaulted,
}

/// Apply the clamp/default policy to one reading.
pub fn condition(quantity: Quantity, raw: Option<f32>) -> (f32, Conditioning) {
    let (lo, hi) = quantity.bounds();
    match raw {
        Some(v) if v.is_finite() => {
            if v < lo {
                (lo, Conditioning::Clamped)
            } else if v > hi {
                (hi, Conditioning::Clamped)
            } else {
                (v, Conditioning::AsRead)
            }
        }
        _ => (quantity.safe_default(), Conditioning::Defaulted),
    }
}

/// One pass over the sensor gateway: `None` means "unavailable".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawSample {
    readings: [Option<f32>; Quantity::COUNT],
}

impl RawSample {
    /// A sample where every sensor reported unavailable.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with(mut self, quantity: Quantity, value: f32) -> Self {
        self.set(quantity, Some(value));
        self
    }

    pub fn set(&mut self, quantity: Quantity, value: Option<f32>) {
        self.readings[quantity.index()] = value;
    }

    pub fn get(&self, quantity: Quantity) -> Option<f32> {
        self.readings[quantity.index()]
    }
}

/// Conditioned sensor values, always inside their clamp ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensedValues {
    pub temperature: f32,
    pub pressure: f32,
    pub soil_moisture: f32,
    pub wind_speed: f32,
    pub light_intensity: f32,
    pub co2_saturation: f32,
    pub external_temperature: f32,
}

impl Default for SensedValues {
    fn default() -> Self {
        Self {
            temperature: Quantity::InternalTemperature.safe_default(),
            pressure: Quantity::Pressure.safe_default(),
            soil_moisture: Quantity::SoilMoisture.safe_default(),
            wind_speed: Quantity::WindSpeed.safe_default(),
            light_intensity: Quantity::LightIntensity.safe_default(),
            co2_saturation: Quantity::Co2Saturation.safe_default(),
            external_temperature: Quantity::ExternalTemperature.safe_default(),
        }
    }
}

impl SensedValues {
    pub fn get(&self, quantity: Quantity) -> f32 {
        match quantity {
            Quantity::InternalTemperature => self.temperature,
            Quantity::Pressure => self.pressure,
            Quantity::SoilMoisture => self.soil_moisture,
            Quantity::WindSpeed => self.wind_speed,
            Quantity::LightIntensity => self.light_intensity,
            Quantity::Co2Saturation => self.co2_saturation,
            Quantity::ExternalTemperature => self.external_temperature,
        }
    }

    fn slot(&mut self, quantity: Quantity) -> &mut f32 {
        match quantity {
            Quantity::InternalTemperature => &mut self.temperature,
            Quantity::Pressure => &mut self.pressure,
            Quantity::SoilMoisture => &mut self.soil_moisture,
            Quantity::WindSpeed => &mut self.wind_speed,
            Quantity::LightIntensity => &mut self.light_intensity,
            Quantity::Co2Saturation => &mut self.co2_saturation,
            Quantity::ExternalTemperature => &mut self.external_temperature,
        }
    }
}

/// Which quantities needed substitution in the last applied sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditioningReport {
    pub defaulted: u8,
    pub clamped: u8,
}

impl ConditioningReport {
    pub fn is_clean(&self) -> bool {
        self.defaulted == 0 && self.clamped == 0
    }
}

// ───────────────────────────────────────────────────────────────
// Actuators and connectivity
// ───────────────────────────────────────────────────────────────

/// Desired (and, once applied, actual) actuator outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommand {
    pub valve1_open: bool,
    pub valve2_open: bool,
    /// 0–100.
    pub fan_speed_percent: u8,
}

impl ActuatorCommand {
    pub fn valve(&self, valve: ValveId) -> bool {
        match valve {
            ValveId::One => self.valve1_open,
            ValveId::Two => self.valve2_open,
        }
    }

    pub fn with_valve(mut self, valve: ValveId, open: bool) -> Self {
        match valve {
            ValveId::One => self.valve1_open = open,
            ValveId::Two => self.valve2_open = open,
        }
        self
    }

    pub fn with_fan(mut self, percent: u8) -> Self {
        self.fan_speed_percent = percent;
        self
    }
}

/// Per-channel link flags.  Observational only; never drive control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connectivity {
    pub hub: bool,
    pub broker: bool,
}

/// A mutation of the persisted configuration subset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigChange {
    TargetTemperature(f32),
    FanSpeed(u8),
    AutoMode(bool),
}

// ───────────────────────────────────────────────────────────────
// Snapshot
// ───────────────────────────────────────────────────────────────

/// A consistent, point-in-time copy of the whole state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub sensed: SensedValues,
    pub actuators: ActuatorCommand,
    pub config: PersistedConfig,
    pub connectivity: Connectivity,
    pub system_active: bool,
    /// Milliseconds since boot at the last completed sample.
    pub timestamp_ms: u64,
    /// Number of samples applied since startup.
    pub cycle: u64,
}

impl Snapshot {
    pub fn auto_mode(&self) -> bool {
        self.config.auto_mode
    }
}

// ───────────────────────────────────────────────────────────────
// SystemState
// ───────────────────────────────────────────────────────────────

pub struct SystemState {
    sensed: SensedValues,
    actuators: ActuatorCommand,
    config: PersistedConfig,
    connectivity: Connectivity,
    timestamp_ms: u64,
    cycle: u64,
}

impl SystemState {
    /// Seed the state from a loaded configuration.  Out-of-range fields are
    /// replaced by defaults; valves start closed and the fan starts at the
    /// configured speed.
    pub fn new(config: PersistedConfig) -> Self {
        let config = config.sanitized();
        Self {
            sensed: SensedValues::default(),
            actuators: ActuatorCommand {
                valve1_open: false,
                valve2_open: false,
                fan_speed_percent: config.fan_speed_percent,
            },
            config,
            connectivity: Connectivity::default(),
            timestamp_ms: 0,
            cycle: 0,
        }
    }

    /// Store a fresh sensor sample, conditioning every field, and stamp the
    /// cycle.  The timestamp never moves backwards.
    pub fn apply_sensed(&mut self, raw: &RawSample, now_ms: u64) -> ConditioningReport {
        let mut sensed = self.sensed;
        let mut report = ConditioningReport::default();
        for quantity in Quantity::ALL {
            let (value, how) = condition(quantity, raw.get(quantity));
            match how {
                Conditioning::AsRead => {}
                Conditioning::Clamped => {
                    debug!("sensor {}: {:?} clamped to {}", quantity.name(), raw.get(quantity), value);
                    report.clamped += 1;
                }
                Conditioning::Defaulted => {
                    debug!("sensor {}: unavailable, using default {}", quantity.name(), value);
                    report.defaulted += 1;
                }
            }
            *sensed.slot(quantity) = value;
        }
        self.sensed = sensed;
        self.timestamp_ms = self.timestamp_ms.max(now_ms);
        self.cycle += 1;
        report
    }

    /// Replace all actuator fields in one assignment.  Fan speed is capped
    /// at 100 %.
    pub fn apply_actuators(&mut self, command: ActuatorCommand) -> ActuatorCommand {
        let command = command.with_fan(command.fan_speed_percent.min(MAX_FAN_SPEED_PERCENT));
        self.actuators = command;
        command
    }

    /// Apply a configuration change after range validation.
    ///
    /// Returns `Ok(true)` if a persisted field actually changed, `Ok(false)`
    /// if the value was already in effect.  Invalid values are rejected and
    /// leave the state untouched.
    pub fn apply_config(&mut self, change: ConfigChange) -> Result<bool, CommandError> {
        let mut next = self.config;
        match change {
            ConfigChange::TargetTemperature(celsius) => {
                if !config::target_temperature_valid(celsius) {
                    return Err(CommandError::OutOfRange("target temperature must be 10–40"));
                }
                next.target_temperature_c = celsius;
            }
            ConfigChange::FanSpeed(percent) => {
                if !config::fan_speed_valid(i64::from(percent)) {
                    return Err(CommandError::OutOfRange("fan speed must be 0–100"));
                }
                next.fan_speed_percent = percent;
            }
            ConfigChange::AutoMode(enabled) => next.auto_mode = enabled,
        }
        let changed = next != self.config;
        self.config = next;
        Ok(changed)
    }

    /// Record a channel's link state.  Returns `true` if it changed.
    pub fn set_link(&mut self, channel: ChannelId, connected: bool) -> bool {
        let flag = match channel {
            ChannelId::Hub => &mut self.connectivity.hub,
            ChannelId::Broker => &mut self.connectivity.broker,
        };
        let changed = *flag != connected;
        *flag = connected;
        changed
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sensed: self.sensed,
            actuators: self.actuators,
            config: self.config,
            connectivity: self.connectivity,
            system_active: true,
            timestamp_ms: self.timestamp_ms,
            cycle: self.cycle,
        }
    }

    pub fn actuators(&self) -> ActuatorCommand {
        self.actuators
    }

    pub fn config(&self) -> PersistedConfig {
        self.config
    }

    pub fn auto_mode(&self) -> bool {
        self.config.auto_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_soil_is_clamped() {
        let mut st = SystemState::new(PersistedConfig::default());
        let raw = RawSample::unavailable().with(Quantity::SoilMoisture, 150.0);
        let report = st.apply_sensed(&raw, 10);
        assert_eq!(st.snapshot().sensed.soil_moisture, 100.0);
        assert_eq!(report.clamped, 1);
    }

    #[test]
    fn nan_reading_uses_safe_default() {
        let mut st = SystemState::new(PersistedConfig::default());
        let raw = RawSample::unavailable().with(Quantity::InternalTemperature, f32::NAN);
        st.apply_sensed(&raw, 10);
        assert_eq!(st.snapshot().sensed.temperature, 22.5);
        assert_eq!(st.snapshot().sensed.pressure, 1.013);
    }

    #[test]
    fn all_unavailable_reports_every_default() {
        let mut st = SystemState::new(PersistedConfig::default());
        let report = st.apply_sensed(&RawSample::unavailable(), 1);
        assert_eq!(report.defaulted as usize, Quantity::COUNT);
        assert!(!report.is_clean());
    }

    #[test]
    fn defaults_lie_inside_bounds() {
        for q in Quantity::ALL {
            let (lo, hi) = q.bounds();
            let d = q.safe_default();
            assert!(d >= lo && d <= hi, "{} default outside range", q.name());
        }
    }

    #[test]
    fn timestamp_is_monotonic_and_cycle_counts() {
        let mut st = SystemState::new(PersistedConfig::default());
        st.apply_sensed(&RawSample::unavailable(), 4_000);
        st.apply_sensed(&RawSample::unavailable(), 2_000);
        let snap = st.snapshot();
        assert_eq!(snap.timestamp_ms, 4_000);
        assert_eq!(snap.cycle, 2);
    }

    #[test]
    fn invalid_config_change_leaves_state_untouched() {
        let mut st = SystemState::new(PersistedConfig::default());
        let before = st.snapshot();
        assert!(st.apply_config(ConfigChange::TargetTemperature(45.0)).is_err());
        assert!(st.apply_config(ConfigChange::TargetTemperature(f32::NAN)).is_err());
        assert!(st.apply_config(ConfigChange::FanSpeed(101)).is_err());
        assert_eq!(st.snapshot(), before);
    }

    #[test]
    fn config_change_reports_whether_anything_changed() {
        let mut st = SystemState::new(PersistedConfig::default());
        assert_eq!(st.apply_config(ConfigChange::TargetTemperature(24.0)), Ok(false));
        assert_eq!(st.apply_config(ConfigChange::TargetTemperature(26.5)), Ok(true));
        assert_eq!(st.config().target_temperature_c, 26.5);
    }

    #[test]
    fn seeding_sanitizes_and_starts_with_valves_closed() {
        let st = SystemState::new(PersistedConfig {
            target_temperature_c: 5.0,
            fan_speed_percent: 60,
            auto_mode: true,
        });
        let snap = st.snapshot();
        assert_eq!(snap.config.target_temperature_c, 24.0);
        assert_eq!(snap.actuators.fan_speed_percent, 60);
        assert!(!snap.actuators.valve1_open && !snap.actuators.valve2_open);
        assert!(snap.auto_mode());
    }

    #[test]
    fn link_flags_track_changes() {
        let mut st = SystemState::new(PersistedConfig::default());
        assert!(st.set_link(ChannelId::Broker, true));
        assert!(!st.set_link(ChannelId::Broker, true));
        assert!(st.snapshot().connectivity.broker);
        assert!(!st.snapshot().connectivity.hub);
    }

    #[test]
    fn fan_above_100_is_capped() {
        let mut st = SystemState::new(PersistedConfig::default());
        let applied = st.apply_actuators(ActuatorCommand {
            valve1_open: true,
            valve2_open: false,
            fan_speed_percent: 180,
        });
        assert_eq!(applied.fan_speed_percent, 100);
        assert_eq!(st.actuators(), applied);
    }
}
