//! GPIO / peripheral pin assignments for the greenhouse controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Climate sensor (BMP280 on I2C0)
// ---------------------------------------------------------------------------

// SDA on GPIO21 and SCL on GPIO22; the typed pins are taken from
// `Peripherals` in main.

/// BMP280 address with SDO tied low.
pub const BMP280_I2C_ADDR: u8 = 0x76;
/// I2C bus clock (Hz).
pub const I2C_BAUD_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// Irrigation valves (relay board, active HIGH)
// ---------------------------------------------------------------------------

pub const VALVE1_GPIO: i32 = 16;
pub const VALVE2_GPIO: i32 = 17;

// ---------------------------------------------------------------------------
// Sensors: Analog (12-bit)
// ---------------------------------------------------------------------------

// Soil GPIO34, wind GPIO35, light GPIO32, CO2 GPIO33 on ADC1.  The external
// temperature input is GPIO26 on ADC2, so it reads as unavailable while
// the radio holds that unit.  Channel numbers live in `hw_init`.

/// Full-scale ADC count for the 12-bit converter.
pub const ADC_MAX: u16 = 4095;

// ---------------------------------------------------------------------------
// Cooling fan (LEDC PWM)
// ---------------------------------------------------------------------------

pub const FAN_PWM_GPIO: i32 = 25;
/// LEDC channel driving the fan.
pub const FAN_LEDC_CHANNEL: u32 = 0;
/// LEDC base frequency for the fan (5 kHz).
pub const FAN_PWM_FREQ_HZ: u32 = 5_000;
/// LEDC timer resolution (bits).  8-bit gives 0 – 255 duty levels.
pub const PWM_RESOLUTION_BITS: u32 = 8;
