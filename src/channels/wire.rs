//! Wire formats shared by both channels.
//!
//! One snapshot encoder serves every delivery target (hub broadcast, hub
//! greeting, broker publish).  The two inbound decoders turn channel text
//! into [`Command`]s; neither touches state.
//!
//! Hub message:    `{"command":"set_fan_speed","value":60}`
//! Broker message: topic `irrigation/control/fan_speed`, payload `60`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::commands::{Command, ValveId};
use crate::app::state::Snapshot;
use crate::config::MAX_FAN_SPEED_PERCENT;
use crate::error::CommandError;

/// Inbound broker fields, one topic each.
pub const CONTROL_FIELDS: [&str; 5] = ["valve1", "valve2", "target_temp", "fan_speed", "auto_mode"];

// ───────────────────────────────────────────────────────────────
// Outbound snapshot
// ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSnapshot {
    temperature: f32,
    pressure: f32,
    soil_moisture: f32,
    wind_speed: f32,
    light_intensity: f32,
    co2_saturation: f32,
    external_temperature: f32,
    valve1: bool,
    valve2: bool,
    wifi_connected: bool,
    mqtt_connected: bool,
    system_active: bool,
    target_temperature: f32,
    fan_speed: u8,
    auto_mode: bool,
    timestamp: u64,
}

impl From<&Snapshot> for WireSnapshot {
    fn from(s: &Snapshot) -> Self {
        Self {
            temperature: s.sensed.temperature,
            pressure: s.sensed.pressure,
            soil_moisture: s.sensed.soil_moisture,
            wind_speed: s.sensed.wind_speed,
            light_intensity: s.sensed.light_intensity,
            co2_saturation: s.sensed.co2_saturation,
            external_temperature: s.sensed.external_temperature,
            valve1: s.actuators.valve1_open,
            valve2: s.actuators.valve2_open,
            wifi_connected: s.connectivity.hub,
            mqtt_connected: s.connectivity.broker,
            system_active: s.system_active,
            target_temperature: s.config.target_temperature_c,
            fan_speed: s.actuators.fan_speed_percent,
            auto_mode: s.config.auto_mode,
            timestamp: s.timestamp_ms,
        }
    }
}

/// Serialize a snapshot into the flat JSON object both channels send.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(&WireSnapshot::from(snapshot))
}

// ───────────────────────────────────────────────────────────────
// Hub (channel A) inbound
// ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct HubMessage {
    command: String,
    #[serde(default)]
    value: Option<Value>,
}

/// Decode one hub text message.
pub fn parse_hub_message(text: &str) -> Result<Command, CommandError> {
    let msg: HubMessage = serde_json::from_str(text).map_err(|_| CommandError::Malformed)?;
    let value = msg.value.as_ref();
    match msg.command.as_str() {
        "toggle_valve1" => Ok(Command::ToggleValve(ValveId::One)),
        "toggle_valve2" => Ok(Command::ToggleValve(ValveId::Two)),
        "set_valve1" => Ok(Command::SetValve {
            valve: ValveId::One,
            open: json_bool(value)?,
        }),
        "set_valve2" => Ok(Command::SetValve {
            valve: ValveId::Two,
            open: json_bool(value)?,
        }),
        "set_target_temp" => Ok(Command::SetTargetTemperature(json_number(value)? as f32)),
        "set_fan_speed" => Ok(Command::SetFanSpeed(fan_percent(json_number(value)?)?)),
        "set_auto_mode" => Ok(Command::SetAutoMode(json_bool(value)?)),
        _ => Err(CommandError::UnknownCommand),
    }
}

fn json_bool(value: Option<&Value>) -> Result<bool, CommandError> {
    match value {
        None | Some(Value::Null) => Err(CommandError::MissingValue),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(CommandError::InvalidValue),
    }
}

fn json_number(value: Option<&Value>) -> Result<f64, CommandError> {
    match value {
        None | Some(Value::Null) => Err(CommandError::MissingValue),
        Some(Value::Number(n)) => n.as_f64().ok_or(CommandError::InvalidValue),
        Some(Value::String(s)) => parse_number(s),
        Some(_) => Err(CommandError::InvalidValue),
    }
}

// ───────────────────────────────────────────────────────────────
// Broker (channel B) inbound
// ───────────────────────────────────────────────────────────────

/// `<prefix>/control/<field>`
pub fn control_topic(prefix: &str, field: &str) -> String {
    format!("{prefix}/control/{field}")
}

/// `<prefix>/sensors/data`
pub fn data_topic(prefix: &str) -> String {
    format!("{prefix}/sensors/data")
}

/// Decode one broker message.  Topics outside `<prefix>/control/` are
/// unknown commands.
pub fn parse_broker_message(prefix: &str, topic: &str, payload: &[u8]) -> Result<Command, CommandError> {
    let field = topic
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix("/control/"))
        .ok_or(CommandError::UnknownCommand)?;
    let text = core::str::from_utf8(payload).map_err(|_| CommandError::Malformed)?;
    match field {
        "valve1" => Ok(Command::SetValve {
            valve: ValveId::One,
            open: text_bool(text)?,
        }),
        "valve2" => Ok(Command::SetValve {
            valve: ValveId::Two,
            open: text_bool(text)?,
        }),
        "target_temp" => Ok(Command::SetTargetTemperature(parse_number(text)? as f32)),
        "fan_speed" => Ok(Command::SetFanSpeed(fan_percent(parse_number(text)?)?)),
        "auto_mode" => Ok(Command::SetAutoMode(text_bool(text)?)),
        _ => Err(CommandError::UnknownCommand),
    }
}

fn text_bool(text: &str) -> Result<bool, CommandError> {
    match text {
        "true" => Ok(true),
        "false" => Ok(false),
        "" => Err(CommandError::MissingValue),
        _ => Err(CommandError::InvalidValue),
    }
}

// ───────────────────────────────────────────────────────────────
// Shared numeric helpers
// ───────────────────────────────────────────────────────────────

/// The whole (trimmed) text must be a finite number.
fn parse_number(text: &str) -> Result<f64, CommandError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CommandError::MissingValue);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CommandError::InvalidValue),
    }
}

/// Round to the nearest whole percent; anything outside 0–100 is rejected.
fn fan_percent(value: f64) -> Result<u8, CommandError> {
    let rounded = value.round();
    if !(0.0..=f64::from(MAX_FAN_SPEED_PERCENT)).contains(&rounded) {
        return Err(CommandError::OutOfRange("fan speed must be 0–100"));
    }
    Ok(rounded as u8)
}
