//! Fuzz target: `wire::parse_broker_message`
//!
//! The first byte picks a control topic, the rest is the payload.  The
//! decoder must never panic and never produce a NaN setpoint.
//!
//! cargo fuzz run fuzz_broker_message

#![no_main]

use greenhouse::app::commands::Command;
use greenhouse::channels::wire::{self, CONTROL_FIELDS};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let field = CONTROL_FIELDS[usize::from(selector) % CONTROL_FIELDS.len()];
    let topic = wire::control_topic("irrigation", field);

    match wire::parse_broker_message("irrigation", &topic, payload) {
        Ok(Command::SetTargetTemperature(t)) => assert!(!t.is_nan()),
        Ok(Command::SetFanSpeed(p)) => assert!(p <= 100),
        _ => {}
    }
});
