//! Bosch BMP280 on I2C: internal air temperature and absolute pressure.
//!
//! Runs in normal mode (x1 oversampling on both channels, 1 s standby) so
//! a read never has to trigger or wait for a conversion.  Compensation
//! uses the floating-point formulas from the datasheet (section 8.1).

use embedded_hal::i2c::{Error as _, I2c};
use log::{debug, info, warn};

use super::climate::ClimateSensor;
use crate::error::SensorError;

const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB: u8 = 0x88;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

const CHIP_ID: u8 = 0x58;
/// osrs_t x1, osrs_p x1, normal mode.
const CTRL_MEAS_NORMAL: u8 = 0x27;
/// t_sb 1000 ms, IIR filter off.
const CONFIG_STANDBY_1S: u8 = 0xA0;
/// Raw value reported for a channel whose measurement was skipped.
const ADC_SKIPPED: i32 = 0x80000;

/// Factory trimming parameters (`dig_T1` … `dig_P9`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    t1: u16,
    t2: i16,
    t3: i16,
    p1: u16,
    p2: i16,
    p3: i16,
    p4: i16,
    p5: i16,
    p6: i16,
    p7: i16,
    p8: i16,
    p9: i16,
}

impl Calibration {
    /// Decode the 24-byte little-endian block at 0x88.
    pub fn from_bytes(b: &[u8; 24]) -> Self {
        let u = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([b[i], b[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
        }
    }

    /// Returns °C and the `t_fine` carry used by the pressure formula.
    fn temperature(&self, adc_t: i32) -> (f64, f64) {
        let adc = f64::from(adc_t);
        let t1 = f64::from(self.t1);
        let var1 = (adc / 16_384.0 - t1 / 1_024.0) * f64::from(self.t2);
        let var2 = (adc / 131_072.0 - t1 / 8_192.0).powi(2) * f64::from(self.t3);
        let t_fine = var1 + var2;
        (t_fine / 5_120.0, t_fine)
    }

    /// Pa, or `None` when the trimming would divide by zero.
    fn pressure(&self, adc_p: i32, t_fine: f64) -> Option<f64> {
        let mut var1 = t_fine / 2.0 - 64_000.0;
        let mut var2 = var1 * var1 * f64::from(self.p6) / 32_768.0;
        var2 += var1 * f64::from(self.p5) * 2.0;
        var2 = var2 / 4.0 + f64::from(self.p4) * 65_536.0;
        var1 = (f64::from(self.p3) * var1 * var1 / 524_288.0 + f64::from(self.p2) * var1) / 524_288.0;
        var1 = (1.0 + var1 / 32_768.0) * f64::from(self.p1);
        if var1 == 0.0 {
            return None;
        }
        let mut p = 1_048_576.0 - f64::from(adc_p);
        p = (p - var2 / 4_096.0) * 6_250.0 / var1;
        var1 = f64::from(self.p9) * p * p / 2_147_483_648.0;
        var2 = p * f64::from(self.p8) / 32_768.0;
        Some(p + (var1 + var2 + f64::from(self.p7)) / 16.0)
    }
}

pub struct Bmp280<I: I2c> {
    i2c: I,
    address: u8,
    calibration: Calibration,
}

impl<I: I2c> Bmp280<I> {
    /// Check the chip id, load the trimming block and start normal mode.
    pub fn new(mut i2c: I, address: u8) -> Result<Self, SensorError> {
        let mut id = [0u8];
        i2c.write_read(address, &[REG_CHIP_ID], &mut id)
            .map_err(bus_error)?;
        if id[0] != CHIP_ID {
            warn!("bmp280: unexpected chip id 0x{:02x} at 0x{:02x}", id[0], address);
            return Err(SensorError::NoResponse);
        }

        let mut raw = [0u8; 24];
        i2c.write_read(address, &[REG_CALIB], &mut raw)
            .map_err(bus_error)?;
        i2c.write(address, &[REG_CONFIG, CONFIG_STANDBY_1S])
            .map_err(bus_error)?;
        i2c.write(address, &[REG_CTRL_MEAS, CTRL_MEAS_NORMAL])
            .map_err(bus_error)?;

        info!("bmp280: ready at 0x{:02x}", address);
        Ok(Self {
            i2c,
            address,
            calibration: Calibration::from_bytes(&raw),
        })
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Burst-read the latest conversion.  Returns (°C, Pa).
    fn measure(&mut self) -> Result<(f64, f64), SensorError> {
        let mut d = [0u8; 6];
        self.i2c
            .write_read(self.address, &[REG_DATA], &mut d)
            .map_err(bus_error)?;
        let adc_p = raw20(d[0], d[1], d[2]);
        let adc_t = raw20(d[3], d[4], d[5]);
        if adc_t == ADC_SKIPPED {
            return Err(SensorError::NoResponse);
        }
        let (celsius, t_fine) = self.calibration.temperature(adc_t);
        let pa = self
            .calibration
            .pressure(adc_p, t_fine)
            .ok_or(SensorError::NotFinite)?;
        Ok((celsius, pa))
    }
}

impl<I: I2c> ClimateSensor for Bmp280<I> {
    fn temperature_c(&mut self) -> Result<f32, SensorError> {
        self.measure().map(|(t, _)| t as f32)
    }

    fn pressure_pa(&mut self) -> Result<f32, SensorError> {
        self.measure().map(|(_, p)| p as f32)
    }
}

fn raw20(msb: u8, lsb: u8, xlsb: u8) -> i32 {
    (i32::from(msb) << 12) | (i32::from(lsb) << 4) | (i32::from(xlsb) >> 4)
}

fn bus_error<E: embedded_hal::i2c::Error>(e: E) -> SensorError {
    debug!("bmp280: bus error {:?}", e.kind());
    SensorError::NoResponse
}
