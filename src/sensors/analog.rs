//! Analog sensors read through the 12-bit ADC.
//!
//! Each channel maps 0..4095 linearly onto its engineering range.  The
//! result is not clamped here; the state's conditioning does that.

use crate::app::state::Quantity;
use crate::drivers::hw_init::{self, AdcUnit};
use crate::error::SensorError;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogChannel {
    pub quantity: Quantity,
    pub unit: AdcUnit,
    pub channel: u32,
    /// Engineering value at count 0.
    pub low: f32,
    /// Engineering value at full scale.
    pub high: f32,
}

impl AnalogChannel {
    pub const fn new(quantity: Quantity, unit: AdcUnit, channel: u32, low: f32, high: f32) -> Self {
        Self {
            quantity,
            unit,
            channel,
            low,
            high,
        }
    }

    /// Convert a raw count.
    pub fn scale(&self, raw: u16) -> f32 {
        let fraction = f32::from(raw) / f32::from(pins::ADC_MAX);
        self.low + fraction * (self.high - self.low)
    }

    pub fn read(&self) -> Result<f32, SensorError> {
        hw_init::adc_read(self.unit, self.channel)
            .map(|raw| self.scale(raw))
            .ok_or(SensorError::AdcReadFailed)
    }
}

/// The board's analog inputs.
pub const BOARD_CHANNELS: [AnalogChannel; 5] = [
    AnalogChannel::new(Quantity::SoilMoisture, AdcUnit::Adc1, hw_init::ADC1_CH_SOIL, 0.0, 100.0),
    AnalogChannel::new(Quantity::WindSpeed, AdcUnit::Adc1, hw_init::ADC1_CH_WIND, 0.0, 50.0),
    AnalogChannel::new(Quantity::LightIntensity, AdcUnit::Adc1, hw_init::ADC1_CH_LIGHT, 0.0, 100.0),
    AnalogChannel::new(Quantity::Co2Saturation, AdcUnit::Adc1, hw_init::ADC1_CH_CO2, 300.0, 600.0),
    AnalogChannel::new(
        Quantity::ExternalTemperature,
        AdcUnit::Adc2,
        hw_init::ADC2_CH_EXTERNAL_TEMP,
        -20.0,
        50.0,
    ),
];
