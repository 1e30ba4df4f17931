//! Fuzz target: `wire::parse_hub_message`
//!
//! Feeds arbitrary text to the observer-hub decoder.  It must never panic,
//! a decoded fan speed must be a valid percentage and a decoded
//! setpoint must never be NaN.
//!
//! cargo fuzz run fuzz_hub_message

#![no_main]

use greenhouse::app::commands::Command;
use greenhouse::channels::wire;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    match wire::parse_hub_message(text) {
        Ok(Command::SetFanSpeed(p)) => assert!(p <= 100, "fan speed {p} escaped the decoder"),
        Ok(Command::SetTargetTemperature(t)) => assert!(!t.is_nan(), "NaN setpoint escaped the decoder"),
        _ => {}
    }
});
