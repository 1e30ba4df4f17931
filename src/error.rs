//! Unified error types for the greenhouse controller.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform. None of these is fatal: the
//! service logs them and falls back to defaults or last-known values.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned out-of-range data.
    Sensor(SensorError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// A command channel transport failed.
    Channel(ChannelError),
    /// An inbound command was malformed or out of range.
    Command(CommandError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Channel(e) => write!(f, "channel: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// A bus-attached sensor did not answer or reported a bad id.
    NoResponse,
    /// No input is wired for the requested quantity.
    NotWired,
    /// Reading is NaN or infinite.
    NotFinite,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::NoResponse => write!(f, "sensor not responding"),
            Self::NotWired => write!(f, "no input for this quantity"),
            Self::NotFinite => write!(f, "reading not finite"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// PWM duty-cycle write failed.
    PwmWriteFailed,
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Channel errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The hub listener could not be started.
    ListenFailed,
    /// The broker refused the connection or the credentials.
    ConnectFailed,
    /// Subscribing to a control topic failed.
    SubscribeFailed,
    /// The session handshake did not complete in time.
    Timeout,
    /// Outbound publish or send failed.
    SendFailed,
    /// The transport dropped while connected.
    Disconnected,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListenFailed => write!(f, "listener start failed"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::Timeout => write!(f, "handshake timed out"),
            Self::SendFailed => write!(f, "send failed"),
            Self::Disconnected => write!(f, "transport disconnected"),
        }
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Why an inbound message was discarded.  The message never mutates state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// The text is not valid JSON / UTF-8 or lacks a `command` field.
    Malformed,
    /// Unknown command name or topic.
    UnknownCommand,
    /// The command needs a value and none was supplied.
    MissingValue,
    /// The value has the wrong type (e.g. non-numeric for a number).
    InvalidValue,
    /// The value parsed but is outside the accepted range.
    OutOfRange(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed message"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::MissingValue => write!(f, "missing value"),
            Self::InvalidValue => write!(f, "invalid value"),
            Self::OutOfRange(what) => write!(f, "out of range: {what}"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
