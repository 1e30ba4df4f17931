//! Cooling fan PWM (LEDC channel 0, 5 kHz, 8-bit).
//!
//! Implements `embedded_hal`'s [`SetDutyCycle`]; the adapter uses the
//! provided `set_duty_cycle_percent`, which maps 0–100 % linearly onto
//! 0–255.

use embedded_hal::pwm::{ErrorType, SetDutyCycle};

use crate::pins;

use super::{hw_init, EspError};

const MAX_DUTY: u16 = (1 << pins::PWM_RESOLUTION_BITS) - 1;

pub struct FanPwm {
    channel: u32,
    duty: u16,
}

impl FanPwm {
    pub fn new(channel: u32) -> Self {
        Self { channel, duty: 0 }
    }

    /// Last duty successfully written.
    pub fn duty(&self) -> u16 {
        self.duty
    }
}

impl ErrorType for FanPwm {
    type Error = EspError;
}

impl SetDutyCycle for FanPwm {
    fn max_duty_cycle(&self) -> u16 {
        MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let duty = duty.min(MAX_DUTY);
        hw_init::ledc_set(self.channel, u32::from(duty)).map_err(EspError)?;
        self.duty = duty;
        Ok(())
    }
}
