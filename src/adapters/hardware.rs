//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the actuator outputs, exposing them through
//! [`SensorPort`] and [`ActuatorPort`].  The outputs are any
//! `embedded-hal` pins, so the same adapter drives the board's valve
//! relays and fan PWM or a pair of test doubles.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::commands::ValveId;
use crate::app::ports::{ActuatorPort, SensorPort};
use crate::app::state::Quantity;
use crate::error::{ActuatorError, SensorError};
use crate::sensors::climate::ClimateSensor;
use crate::sensors::SensorHub;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<C: ClimateSensor, V: OutputPin, F: SetDutyCycle> {
    sensors: SensorHub<C>,
    valve1: V,
    valve2: V,
    fan: F,
}

impl<C: ClimateSensor, V: OutputPin, F: SetDutyCycle> HardwareAdapter<C, V, F> {
    pub fn new(sensors: SensorHub<C>, valve1: V, valve2: V, fan: F) -> Self {
        Self {
            sensors,
            valve1,
            valve2,
            fan,
        }
    }

    pub fn sensors_mut(&mut self) -> &mut SensorHub<C> {
        &mut self.sensors
    }

    pub fn valve(&self, valve: ValveId) -> &V {
        match valve {
            ValveId::One => &self.valve1,
            ValveId::Two => &self.valve2,
        }
    }

    pub fn fan(&self) -> &F {
        &self.fan
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<C: ClimateSensor, V: OutputPin, F: SetDutyCycle> SensorPort for HardwareAdapter<C, V, F> {
    fn read(&mut self, quantity: Quantity) -> Result<f32, SensorError> {
        self.sensors.read(quantity)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<C: ClimateSensor, V: OutputPin, F: SetDutyCycle> ActuatorPort for HardwareAdapter<C, V, F> {
    fn set_valve(&mut self, valve: ValveId, open: bool) -> Result<(), ActuatorError> {
        let pin = match valve {
            ValveId::One => &mut self.valve1,
            ValveId::Two => &mut self.valve2,
        };
        pin.set_state(open.into()).map_err(|e| {
            warn!("valve{}: write failed: {:?}", valve.number(), e);
            ActuatorError::GpioWriteFailed
        })
    }

    fn set_fan_speed(&mut self, percent: u8) -> Result<(), ActuatorError> {
        self.fan.set_duty_cycle_percent(percent.min(100)).map_err(|e| {
            warn!("fan: duty write failed: {:?}", e);
            ActuatorError::PwmWriteFailed
        })
    }
}
