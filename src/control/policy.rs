//! Greenhouse control policy.
//!
//! The decision is an ordered list of [`Rule`]s applied to a draft
//! [`ActuatorCommand`] that starts as the currently applied outputs.  Later
//! rules see (and may override) what earlier rules wrote, never the reverse:
//!
//! 1. temperature band drives both valves (hysteresis inside ±2 °C)
//! 2. dry soil forces valve 1 open
//! 3. temperature bands pick the fan speed
//! 4. strong wind caps the fan
//!
//! All thresholds are constants; only the target temperature comes from
//! configuration.

use crate::app::state::{ActuatorCommand, Snapshot};

/// Valves open above, close below `target ± VALVE_BAND_C`.
pub const VALVE_BAND_C: f32 = 2.0;
/// Soil moisture (%) below which valve 1 is forced open.
pub const DRY_SOIL_PERCENT: f32 = 30.0;
/// Wind speed (km/h) above which the fan is capped.
pub const HIGH_WIND_KMH: f32 = 15.0;
/// Fan cap (%) during high wind.
pub const HIGH_WIND_FAN_CAP: u8 = 20;
/// Fan speed (%) when the temperature is near the target.
pub const IDLE_FAN_PERCENT: u8 = 45;

/// Fan bands, most extreme first; first match wins.
const FAN_BANDS: [(Band, u8); 4] = [
    (Band::Above(3.0), 80),
    (Band::Above(1.0), 60),
    (Band::Below(-3.0), 20),
    (Band::Below(-1.0), 30),
];

#[derive(Clone, Copy)]
enum Band {
    Above(f32),
    Below(f32),
}

impl Band {
    fn contains(self, diff: f32) -> bool {
        match self {
            Band::Above(t) => diff > t,
            Band::Below(t) => diff < t,
        }
    }
}

/// What the rules get to look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyInput {
    /// `internal temperature − target temperature`.
    pub diff: f32,
    pub soil_moisture: f32,
    pub wind_speed: f32,
}

impl PolicyInput {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            diff: snapshot.sensed.temperature - snapshot.config.target_temperature_c,
            soil_moisture: snapshot.sensed.soil_moisture,
            wind_speed: snapshot.sensed.wind_speed,
        }
    }
}

/// One named step of the decision.
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&PolicyInput, ActuatorCommand) -> ActuatorCommand,
}

/// The decision, in evaluation order.
pub const RULES: [Rule; 4] = [
    Rule {
        name: "temperature_valves",
        apply: temperature_valves,
    },
    Rule {
        name: "dry_soil_override",
        apply: dry_soil_override,
    },
    Rule {
        name: "fan_bands",
        apply: fan_bands,
    },
    Rule {
        name: "wind_cap",
        apply: wind_cap,
    },
];

/// Desired outputs for the given snapshot.  Does not mutate anything.
pub fn decide(snapshot: &Snapshot) -> ActuatorCommand {
    let input = PolicyInput::from_snapshot(snapshot);
    RULES
        .iter()
        .fold(snapshot.actuators, |draft, rule| (rule.apply)(&input, draft))
}

fn temperature_valves(input: &PolicyInput, draft: ActuatorCommand) -> ActuatorCommand {
    if input.diff > VALVE_BAND_C {
        ActuatorCommand {
            valve1_open: true,
            valve2_open: true,
            ..draft
        }
    } else if input.diff < -VALVE_BAND_C {
        ActuatorCommand {
            valve1_open: false,
            valve2_open: false,
            ..draft
        }
    } else {
        draft
    }
}

fn dry_soil_override(input: &PolicyInput, draft: ActuatorCommand) -> ActuatorCommand {
    if input.soil_moisture < DRY_SOIL_PERCENT {
        ActuatorCommand {
            valve1_open: true,
            ..draft
        }
    } else {
        draft
    }
}

fn fan_bands(input: &PolicyInput, draft: ActuatorCommand) -> ActuatorCommand {
    let percent = FAN_BANDS
        .iter()
        .find(|(band, _)| band.contains(input.diff))
        .map_or(IDLE_FAN_PERCENT, |&(_, p)| p);
    draft.with_fan(percent)
}

fn wind_cap(input: &PolicyInput, draft: ActuatorCommand) -> ActuatorCommand {
    if input.wind_speed > HIGH_WIND_KMH {
        draft.with_fan(draft.fan_speed_percent.min(HIGH_WIND_FAN_CAP))
    } else {
        draft
    }
}
