//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per application
//! event to the logger (UART / USB-CDC on the device, stderr on host).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::CycleCompleted {
                snapshot: s,
                conditioning,
            } => {
                info!(
                    "CYCLE | #{} t={}ms | T={:.1}\u{00b0}C P={:.3}bar soil={:.0}% wind={:.1}km/h \
                     light={:.0}% CO2={:.0}ppm ext={:.1}\u{00b0}C | v1={} v2={} fan={}% | \
                     auto={} target={:.1}\u{00b0}C | hub={} broker={}",
                    s.cycle,
                    s.timestamp_ms,
                    s.sensed.temperature,
                    s.sensed.pressure,
                    s.sensed.soil_moisture,
                    s.sensed.wind_speed,
                    s.sensed.light_intensity,
                    s.sensed.co2_saturation,
                    s.sensed.external_temperature,
                    on_off(s.actuators.valve1_open),
                    on_off(s.actuators.valve2_open),
                    s.actuators.fan_speed_percent,
                    s.config.auto_mode,
                    s.config.target_temperature_c,
                    up_down(s.connectivity.hub),
                    up_down(s.connectivity.broker),
                );
                if !conditioning.is_clean() {
                    debug!(
                        "CYCLE | substituted: {} defaulted, {} clamped",
                        conditioning.defaulted, conditioning.clamped
                    );
                }
            }
            AppEvent::CommandApplied { origin, command } => {
                info!("CMD | {} | applied {}", origin, command);
            }
            AppEvent::CommandRejected { origin, reason } => {
                warn!("CMD | {} | rejected: {}", origin, reason);
            }
            AppEvent::ConfigPersisted(c) => {
                info!(
                    "CONFIG | saved target={:.1}\u{00b0}C fan={}% auto={}",
                    c.target_temperature_c, c.fan_speed_percent, c.auto_mode
                );
            }
            AppEvent::ConfigPersistFailed(e) => {
                warn!("CONFIG | save failed: {}", e);
            }
            AppEvent::ActuatorFault(e) => {
                warn!("FAULT | {}", e);
            }
            AppEvent::LinkChanged { channel, connected } => {
                info!("LINK | {} {}", channel, up_down(*connected));
            }
            AppEvent::Started(s) => {
                info!(
                    "START | target={:.1}\u{00b0}C fan={}% auto={}",
                    s.config.target_temperature_c, s.config.fan_speed_percent, s.config.auto_mode
                );
            }
        }
    }
}

fn on_off(open: bool) -> &'static str {
    if open { "OPEN" } else { "CLOSED" }
}

fn up_down(connected: bool) -> &'static str {
    if connected { "up" } else { "down" }
}
