//! Actuator drivers and hardware initialisation.
//!
//! The drivers expose `embedded-hal` traits so the
//! [`HardwareAdapter`](crate::adapters::hardware::HardwareAdapter) works
//! with any pin that implements them (tests use recording mocks).

pub mod fan;
pub mod hw_init;
pub mod valve;

/// An ESP-IDF call failed with this return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EspError(pub i32);

impl core::fmt::Display for EspError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "esp error {}", self.0)
    }
}

impl embedded_hal::digital::Error for EspError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl embedded_hal::pwm::Error for EspError {
    fn kind(&self) -> embedded_hal::pwm::ErrorKind {
        embedded_hal::pwm::ErrorKind::Other
    }
}
