//! Sensor subsystem: individual inputs and the aggregating [`SensorHub`].
//!
//! The hub answers one quantity at a time in engineering units.  It never
//! substitutes or clamps: an input that fails reports a [`SensorError`],
//! and the state decides what to store.

pub mod analog;
pub mod bmp280;
pub mod climate;
pub mod noise;

use crate::app::state::Quantity;
use crate::error::SensorError;
use analog::{AnalogChannel, BOARD_CHANNELS};
use climate::{pa_to_bar, ClimateSensor};
use noise::NoisePolicy;

/// Aggregates every sensor input.
pub struct SensorHub<C: ClimateSensor> {
    climate: C,
    analog: [AnalogChannel; 5],
    noise: Box<dyn NoisePolicy>,
}

impl<C: ClimateSensor> SensorHub<C> {
    /// Hub over the board's analog inputs.
    pub fn new(climate: C, noise: Box<dyn NoisePolicy>) -> Self {
        Self::with_channels(climate, BOARD_CHANNELS, noise)
    }

    pub fn with_channels(climate: C, analog: [AnalogChannel; 5], noise: Box<dyn NoisePolicy>) -> Self {
        Self {
            climate,
            analog,
            noise,
        }
    }

    pub fn climate_mut(&mut self) -> &mut C {
        &mut self.climate
    }

    /// Read one quantity.  Noise is applied to analog readings only.
    pub fn read(&mut self, quantity: Quantity) -> Result<f32, SensorError> {
        let value = match quantity {
            Quantity::InternalTemperature => self.climate.temperature_c()?,
            Quantity::Pressure => pa_to_bar(self.climate.pressure_pa()?),
            _ => {
                let channel = self
                    .analog
                    .iter()
                    .find(|c| c.quantity == quantity)
                    .ok_or(SensorError::NotWired)?;
                self.noise.perturb(quantity, channel.read()?)
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(SensorError::NotFinite)
        }
    }
}
