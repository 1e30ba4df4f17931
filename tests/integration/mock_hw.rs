//! Mock hardware and event sink for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching the simulated GPIO/PWM statics.

use greenhouse::app::commands::ValveId;
use greenhouse::app::events::AppEvent;
use greenhouse::app::ports::{ActuatorPort, EventSink, SensorPort};
use greenhouse::app::state::{Quantity, RawSample};
use greenhouse::error::{ActuatorError, SensorError};

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCall {
    SetValve { valve: ValveId, open: bool },
    SetFan { percent: u8 },
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub raw: RawSample,
    pub calls: Vec<ActuatorCall>,
    /// Every fan write fails while set.
    pub fail_fan: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            raw: RawSample::unavailable(),
            calls: Vec::new(),
            fail_fan: false,
        }
    }

    /// Hardware whose sensors all answer with in-range readings.
    pub fn reading(temperature: f32, soil: f32, wind: f32) -> Self {
        let mut hw = Self::new();
        hw.raw = RawSample::unavailable()
            .with(Quantity::InternalTemperature, temperature)
            .with(Quantity::Pressure, 1.0)
            .with(Quantity::SoilMoisture, soil)
            .with(Quantity::WindSpeed, wind)
            .with(Quantity::LightIntensity, 60.0)
            .with(Quantity::Co2Saturation, 420.0)
            .with(Quantity::ExternalTemperature, 18.0);
        hw
    }

    pub fn set(&mut self, quantity: Quantity, value: f32) {
        self.raw.set(quantity, Some(value));
    }

    /// Level last written to a valve, `false` if never written.
    pub fn valve_open(&self, valve: ValveId) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match *c {
                ActuatorCall::SetValve { valve: v, open } if v == valve => Some(open),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn fan(&self) -> Option<u8> {
        self.calls.iter().rev().find_map(|c| match *c {
            ActuatorCall::SetFan { percent } => Some(percent),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn read(&mut self, quantity: Quantity) -> Result<f32, SensorError> {
        self.raw.get(quantity).ok_or(SensorError::NoResponse)
    }
}

impl ActuatorPort for MockHardware {
    fn set_valve(&mut self, valve: ValveId, open: bool) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::SetValve { valve, open });
        Ok(())
    }

    fn set_fan_speed(&mut self, percent: u8) -> Result<(), ActuatorError> {
        if self.fail_fan {
            return Err(ActuatorError::PwmWriteFailed);
        }
        self.calls.push(ActuatorCall::SetFan { percent });
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
