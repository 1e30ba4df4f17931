//! System configuration parameters
//!
//! Two groups live here:
//!
//! - [`PersistedConfig`]: the small subset that survives power loss
//!   (target temperature, default fan speed, auto-mode flag).
//! - [`ControllerConfig`]: runtime tuning (cadences, channel endpoints,
//!   reconnect backoff).  Compiled-in defaults, never written to flash.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Valid range of the target temperature (°C), inclusive.
pub const TARGET_TEMPERATURE_RANGE: (f32, f32) = (10.0, 40.0);
/// Default target temperature (°C).
pub const DEFAULT_TARGET_TEMPERATURE_C: f32 = 24.0;
/// Default fan speed (%).
pub const DEFAULT_FAN_SPEED_PERCENT: u8 = 45;
/// Upper bound of the fan speed (%).
pub const MAX_FAN_SPEED_PERCENT: u8 = 100;

// ───────────────────────────────────────────────────────────────
// Persisted subset
// ───────────────────────────────────────────────────────────────

/// Configuration fields that are written to the durable block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedConfig {
    /// Control-policy setpoint (°C), 10–40.
    pub target_temperature_c: f32,
    /// Fan speed applied at startup and when set by command (%), 0–100.
    pub fan_speed_percent: u8,
    /// Whether the control policy owns the actuators.
    pub auto_mode: bool,
}

impl Default for PersistedConfig {
    fn default() -> Self {
        Self {
            target_temperature_c: DEFAULT_TARGET_TEMPERATURE_C,
            fan_speed_percent: DEFAULT_FAN_SPEED_PERCENT,
            auto_mode: false,
        }
    }
}

/// True if `celsius` is a usable target temperature (rejects NaN).
pub fn target_temperature_valid(celsius: f32) -> bool {
    let (lo, hi) = TARGET_TEMPERATURE_RANGE;
    (lo..=hi).contains(&celsius)
}

/// True if `percent` is a usable fan speed.
pub fn fan_speed_valid(percent: i64) -> bool {
    (0..=i64::from(MAX_FAN_SPEED_PERCENT)).contains(&percent)
}

impl PersistedConfig {
    /// Replace every out-of-range field with its default, independently.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            target_temperature_c: if target_temperature_valid(self.target_temperature_c) {
                self.target_temperature_c
            } else {
                defaults.target_temperature_c
            },
            fan_speed_percent: if fan_speed_valid(i64::from(self.fan_speed_percent)) {
                self.fan_speed_percent
            } else {
                defaults.fan_speed_percent
            },
            auto_mode: self.auto_mode,
        }
    }

    /// Reject (rather than repair) an out-of-range configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !target_temperature_valid(self.target_temperature_c) {
            return Err("target_temperature_c must be 10.0–40.0");
        }
        if !fan_speed_valid(i64::from(self.fan_speed_percent)) {
            return Err("fan_speed_percent must be 0–100");
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Runtime tuning
// ───────────────────────────────────────────────────────────────

/// Endpoint and credentials for the remote broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub host: heapless::String<64>,
    pub port: u16,
    pub client_id: heapless::String<32>,
    pub username: heapless::String<32>,
    pub password: heapless::String<64>,
    /// Prefix for `<prefix>/control/<field>` and `<prefix>/sensors/data`.
    pub topic_prefix: heapless::String<32>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: fixed_str("192.168.1.100"),
            port: 1883,
            client_id: fixed_str("ESP32_Irrigation"),
            username: fixed_str("esp32_irrigation"),
            password: fixed_str("irrigation123"),
            topic_prefix: fixed_str("irrigation"),
        }
    }
}

/// Core runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    // --- Timing ---
    /// Sample → decide → apply → broadcast cadence (milliseconds).
    pub sample_interval_ms: u32,
    /// Channel servicing cadence (milliseconds).
    pub service_interval_ms: u32,
    /// Maximum inbound messages handled per channel per service pass.
    pub messages_per_pass: usize,

    // --- Channel A (local observer hub) ---
    pub hub_port: u16,
    /// First retry delay after the listener fails (doubles up to the cap).
    pub hub_retry_initial_ms: u32,
    pub hub_retry_max_ms: u32,

    // --- Channel B (remote broker) ---
    pub broker: BrokerSettings,
    /// Fixed delay between broker connect attempts.
    pub broker_retry_ms: u32,
    /// How long a broker session may stay in the handshake before the
    /// attempt counts as failed.
    pub broker_connect_timeout_ms: u32,

    // --- Station (Wi-Fi) uplink ---
    pub wifi_retry_initial_ms: u32,
    pub wifi_retry_max_ms: u32,
    pub wifi_connect_timeout_ms: u32,

    // --- Sensors ---
    /// Apply simulated jitter to the analog quantities.
    pub sensor_noise: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 2_000,
            service_interval_ms: 100,
            messages_per_pass: 8,

            hub_port: 81,
            hub_retry_initial_ms: 2_000,
            hub_retry_max_ms: 60_000,

            broker: BrokerSettings::default(),
            broker_retry_ms: 5_000,
            broker_connect_timeout_ms: 3_000,

            wifi_retry_initial_ms: 2_000,
            wifi_retry_max_ms: 60_000,
            wifi_connect_timeout_ms: 15_000,

            sensor_noise: false,
        }
    }
}

/// Shortest accepted sampling period (ms).
pub const MIN_SAMPLE_INTERVAL_MS: u32 = 100;
/// Shortest accepted retry delay or handshake timeout (ms).
pub const MIN_RETRY_MS: u32 = 100;
/// Upper bound of `messages_per_pass`.
pub const MAX_MESSAGES_PER_PASS: usize = 64;

impl ControllerConfig {
    /// Reject a configuration the loop cannot run on: zero or inverted
    /// timings, or a per-pass budget that would never drain a channel.
    pub fn validate(&self) -> crate::Result<()> {
        if self.sample_interval_ms < MIN_SAMPLE_INTERVAL_MS {
            return Err(Error::Config("sample_interval_ms must be at least 100"));
        }
        if self.service_interval_ms == 0 || self.service_interval_ms > self.sample_interval_ms {
            return Err(Error::Config(
                "service_interval_ms must be 1..=sample_interval_ms",
            ));
        }
        if !(1..=MAX_MESSAGES_PER_PASS).contains(&self.messages_per_pass) {
            return Err(Error::Config("messages_per_pass must be 1..=64"));
        }
        if !retry_window_valid(self.hub_retry_initial_ms, self.hub_retry_max_ms) {
            return Err(Error::Config(
                "hub retry must be at least 100 ms and not exceed its cap",
            ));
        }
        if self.broker_retry_ms < MIN_RETRY_MS || self.broker_connect_timeout_ms < MIN_RETRY_MS {
            return Err(Error::Config(
                "broker retry and connect timeout must be at least 100 ms",
            ));
        }
        if !retry_window_valid(self.wifi_retry_initial_ms, self.wifi_retry_max_ms)
            || self.wifi_connect_timeout_ms < MIN_RETRY_MS
        {
            return Err(Error::Config(
                "wifi retry must be at least 100 ms and not exceed its cap",
            ));
        }
        Ok(())
    }

    /// Replace every unusable timing or budget with its default.  Paired
    /// fields (retry start and cap, sample and service period) are reset
    /// together.
    pub fn sanitized(self) -> Self {
        if let Err(e) = self.validate() {
            warn!("ControllerConfig: {}, resetting offending fields", e);
        } else {
            return self;
        }
        let d = Self::default();
        let mut out = self;

        if out.sample_interval_ms < MIN_SAMPLE_INTERVAL_MS {
            out.sample_interval_ms = d.sample_interval_ms;
        }
        if out.service_interval_ms == 0 || out.service_interval_ms > out.sample_interval_ms {
            out.service_interval_ms = d.service_interval_ms.min(out.sample_interval_ms);
        }
        if !(1..=MAX_MESSAGES_PER_PASS).contains(&out.messages_per_pass) {
            out.messages_per_pass = d.messages_per_pass;
        }
        if !retry_window_valid(out.hub_retry_initial_ms, out.hub_retry_max_ms) {
            out.hub_retry_initial_ms = d.hub_retry_initial_ms;
            out.hub_retry_max_ms = d.hub_retry_max_ms;
        }
        if out.broker_retry_ms < MIN_RETRY_MS {
            out.broker_retry_ms = d.broker_retry_ms;
        }
        if out.broker_connect_timeout_ms < MIN_RETRY_MS {
            out.broker_connect_timeout_ms = d.broker_connect_timeout_ms;
        }
        if !retry_window_valid(out.wifi_retry_initial_ms, out.wifi_retry_max_ms) {
            out.wifi_retry_initial_ms = d.wifi_retry_initial_ms;
            out.wifi_retry_max_ms = d.wifi_retry_max_ms;
        }
        if out.wifi_connect_timeout_ms < MIN_RETRY_MS {
            out.wifi_connect_timeout_ms = d.wifi_connect_timeout_ms;
        }
        out
    }
}

fn retry_window_valid(initial_ms: u32, max_ms: u32) -> bool {
    initial_ms >= MIN_RETRY_MS && max_ms >= initial_ms
}

/// Build a fixed-capacity string from a literal that is known to fit;
/// anything longer is truncated at the capacity.
fn fixed_str<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
