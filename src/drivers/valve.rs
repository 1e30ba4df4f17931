//! Irrigation valve relay output.
//!
//! A dumb actuator: high opens the valve, low closes it.  Exposed as an
//! `embedded_hal` [`OutputPin`] so the hardware adapter does not care
//! whether it drives a real GPIO or a test double.

use embedded_hal::digital::{ErrorType, OutputPin};

use super::{hw_init, EspError};

pub struct ValvePin {
    gpio: i32,
    open: bool,
}

impl ValvePin {
    /// The pin must already be configured as an output by
    /// [`hw_init::init_peripherals`].
    pub fn new(gpio: i32) -> Self {
        Self { gpio, open: false }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Last level successfully written.
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn write(&mut self, open: bool) -> Result<(), EspError> {
        hw_init::gpio_write(self.gpio, open).map_err(EspError)?;
        self.open = open;
        Ok(())
    }
}

impl ErrorType for ValvePin {
    type Error = EspError;
}

impl OutputPin for ValvePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn drives_sim_gpio() {
        let mut v = ValvePin::new(41);
        v.set_high().unwrap();
        assert!(v.is_open());
        assert!(hw_init::sim_gpio_level(41));
        v.set_state(false.into()).unwrap();
        assert!(!v.is_open());
        assert!(!hw_init::sim_gpio_level(41));
    }

    #[test]
    fn failed_write_keeps_last_level() {
        let mut v = ValvePin::new(99);
        assert_eq!(v.set_high(), Err(EspError(-1)));
        assert!(!v.is_open());
    }
}
