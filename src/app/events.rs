//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, test recorder).

use crate::config::PersistedConfig;
use crate::error::{ActuatorError, CommandError};

use super::commands::{ChannelId, Command};
use super::ports::ConfigError;
use super::state::{ConditioningReport, Snapshot};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service has started (carries the seeded state).
    Started(Snapshot),

    /// A sample → decide → apply pass finished.
    CycleCompleted {
        snapshot: Snapshot,
        conditioning: ConditioningReport,
    },

    /// An inbound command mutated the state.
    CommandApplied { origin: ChannelId, command: Command },

    /// An inbound command was discarded without touching the state.
    CommandRejected { origin: ChannelId, reason: CommandError },

    /// Persisted fields were written to the store.
    ConfigPersisted(PersistedConfig),

    /// The store write failed; the in-memory state keeps the new value.
    ConfigPersistFailed(ConfigError),

    /// An output could not be driven.
    ActuatorFault(ActuatorError),

    /// A channel's link came up or went down.
    LinkChanged { channel: ChannelId, connected: bool },
}
