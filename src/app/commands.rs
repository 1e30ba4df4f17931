//! Inbound commands to the application service.
//!
//! Both command channels decode their wire messages into [`Command`] and
//! hand it to the [`AppService`](super::service::AppService) together with
//! the [`ChannelId`] it arrived on.

use core::fmt;

/// Which command channel a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId {
    /// Channel A: the local observer hub.
    Hub,
    /// Channel B: the remote broker.
    Broker,
}

impl ChannelId {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hub => "hub",
            Self::Broker => "broker",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the two irrigation valves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveId {
    One,
    Two,
}

impl ValveId {
    pub const fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// Commands that the channels can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Open or close one valve.
    SetValve { valve: ValveId, open: bool },

    /// Invert one valve.  Only the hub offers this.
    ToggleValve(ValveId),

    /// Change the control-policy setpoint (°C).  Persisted.
    SetTargetTemperature(f32),

    /// Drive the fan and make the speed the new default (%).  Persisted.
    SetFanSpeed(u8),

    /// Hand the actuators to the policy (true) or to commands (false).
    /// Persisted.
    SetAutoMode(bool),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetValve { valve, open } => {
                write!(f, "valve{}={}", valve.number(), if *open { "open" } else { "closed" })
            }
            Self::ToggleValve(valve) => write!(f, "toggle valve{}", valve.number()),
            Self::SetTargetTemperature(c) => write!(f, "target={c:.1}C"),
            Self::SetFanSpeed(p) => write!(f, "fan={p}%"),
            Self::SetAutoMode(on) => write!(f, "auto={on}"),
        }
    }
}
