//! Digital climate sensor: internal air temperature and barometric
//! pressure.
//!
//! The board carries a BMP280 ([`super::bmp280::Bmp280`]) that answers
//! both.  [`ManualClimate`] is the stand-in used by the host simulation
//! and the tests.

use crate::error::SensorError;

pub trait ClimateSensor {
    /// Air temperature (°C).
    fn temperature_c(&mut self) -> Result<f32, SensorError>;

    /// Absolute pressure (Pa).
    fn pressure_pa(&mut self) -> Result<f32, SensorError>;
}

impl<T: ClimateSensor + ?Sized> ClimateSensor for Box<T> {
    fn temperature_c(&mut self) -> Result<f32, SensorError> {
        (**self).temperature_c()
    }

    fn pressure_pa(&mut self) -> Result<f32, SensorError> {
        (**self).pressure_pa()
    }
}

/// Readings set by hand.  `None` reads as a part that did not answer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualClimate {
    pub temperature_c: Option<f32>,
    pub pressure_pa: Option<f32>,
}

impl ManualClimate {
    pub fn new(temperature_c: f32, pressure_pa: f32) -> Self {
        Self {
            temperature_c: Some(temperature_c),
            pressure_pa: Some(pressure_pa),
        }
    }

    /// A sensor that never answers; the state substitutes defaults.
    pub fn absent() -> Self {
        Self::default()
    }
}

impl ClimateSensor for ManualClimate {
    fn temperature_c(&mut self) -> Result<f32, SensorError> {
        self.temperature_c.ok_or(SensorError::NoResponse)
    }

    fn pressure_pa(&mut self) -> Result<f32, SensorError> {
        self.pressure_pa.ok_or(SensorError::NoResponse)
    }
}

/// Pascal → bar.
pub fn pa_to_bar(pa: f32) -> f32 {
    pa / 100_000.0
}
