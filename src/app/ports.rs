//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (sensors, actuators, event sinks, storage) implement these
//! traits.  The [`AppService`](super::service::AppService) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! The command channels sit on the other side: they never touch the state,
//! they call back into a [`CommandDelegate`].

use log::debug;

use crate::config::PersistedConfig;
use crate::error::{ActuatorError, CommandError, SensorError};

use super::commands::{ChannelId, Command, ValveId};
use super::state::{ActuatorCommand, Quantity, RawSample, Snapshot};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Sensor gateway: one raw reading per quantity.
///
/// Values are in engineering units but NOT range-checked; conditioning is
/// the state's job.
pub trait SensorPort {
    fn read(&mut self, quantity: Quantity) -> Result<f32, SensorError>;

    /// Read every quantity once.  A failed read is recorded as unavailable.
    fn sample(&mut self) -> RawSample {
        let mut raw = RawSample::unavailable();
        for quantity in Quantity::ALL {
            let value = match self.read(quantity) {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!("sensors: {}: {}", quantity.name(), e);
                    None
                }
            };
            raw.set(quantity, value);
        }
        raw
    }
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Actuator gateway.
pub trait ActuatorPort {
    fn set_valve(&mut self, valve: ValveId, open: bool) -> Result<(), ActuatorError>;

    /// Fan speed 0–100 %.
    fn set_fan_speed(&mut self, percent: u8) -> Result<(), ActuatorError>;

    /// Drive every output.  All three writes are attempted; the first
    /// failure is reported.
    fn apply(&mut self, command: &ActuatorCommand) -> Result<(), ActuatorError> {
        let v1 = self.set_valve(ValveId::One, command.valve1_open);
        let v2 = self.set_valve(ValveId::Two, command.valve2_open);
        let fan = self.set_fan_speed(command.fan_speed_percent);
        v1.and(v2).and(fan)
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the durable configuration subset.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Load configuration.  Missing or corrupt fields come back as their
    /// defaults; this only fails if nothing at all could be read.
    fn load(&self) -> Result<PersistedConfig, ConfigError>;

    /// Validate and persist configuration as one transaction.
    fn save(&mut self, config: &PersistedConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Single-key writes MUST be atomic.  The ESP-IDF NVS API guarantees this
///   natively; in-memory simulation achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Command delegate (decouples channels from the state owner)
// ───────────────────────────────────────────────────────────────

/// Callback trait the command channels invoke while being serviced.
///
/// Channels own their transports and parsers but never the state.  The
/// runtime implements this by forwarding to the
/// [`AppService`](super::service::AppService), so every mutation still
/// happens on the control task.
pub trait CommandDelegate {
    /// Apply a decoded command.  An `Err` means the state is unchanged.
    fn apply(&mut self, origin: ChannelId, command: Command) -> Result<(), CommandError>;

    /// Record a message that failed to decode.
    fn reject(&mut self, origin: ChannelId, reason: CommandError);

    /// Record a link transition.
    fn link_changed(&mut self, channel: ChannelId, connected: bool);

    /// Current consistent snapshot (used to greet new observers).
    fn snapshot(&self) -> Snapshot;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Self::NotFound,
            StorageError::Full => Self::StorageFull,
            StorageError::IoError => Self::IoError,
        }
    }
}
