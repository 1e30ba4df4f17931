//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the [`SystemState`] and is the only thing that
//! mutates it.  All I/O flows through port traits injected at call sites,
//! making the entire service testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                 │      AppService        │
//! ActuatorPort ◀──│  State · Policy        │ ──▶ ConfigPort
//!                 └────────────────────────┘
//! ```
//!
//! Every method takes `&mut self`, so a sampling cycle and a command can
//! never interleave their effects.

use log::{info, warn};

use crate::config::PersistedConfig;
use crate::control::policy;
use crate::error::CommandError;

use super::commands::{ChannelId, Command};
use super::events::AppEvent;
use super::ports::{ActuatorPort, ConfigPort, EventSink, SensorPort};
use super::state::{ConfigChange, Snapshot, SystemState};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    state: SystemState,
}

impl AppService {
    /// Construct the service from loaded configuration.
    ///
    /// Does **not** touch the outputs; call [`start`](Self::start) next.
    pub fn new(config: PersistedConfig) -> Self {
        Self {
            state: SystemState::new(config),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive the outputs to their seeded values (valves closed, fan at the
    /// configured speed).
    pub fn start(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        let initial = self.state.actuators();
        if let Err(e) = hw.apply(&initial) {
            warn!("Initial actuator state not applied: {}", e);
            sink.emit(&AppEvent::ActuatorFault(e));
        }
        let snapshot = self.state.snapshot();
        info!(
            "AppService started: target={:.1}C fan={}% auto={}",
            snapshot.config.target_temperature_c,
            snapshot.config.fan_speed_percent,
            snapshot.config.auto_mode
        );
        sink.emit(&AppEvent::Started(snapshot));
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one full cycle: sample → condition → decide (auto-mode) → apply.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`], which avoids a double mutable borrow while keeping
    /// the port boundary explicit.  Returns the snapshot to broadcast; it is
    /// taken after the actuator update, so sensed and actuator fields come
    /// from the same cycle.  Never fails.
    pub fn run_cycle(
        &mut self,
        now_ms: u64,
        hw: &mut (impl SensorPort + ActuatorPort),
        sink: &mut impl EventSink,
    ) -> Snapshot {
        // 1. Sample
        let raw = hw.sample();
        let conditioning = self.state.apply_sensed(&raw, now_ms);

        // 2. Decide and apply
        if self.state.auto_mode() {
            let desired = policy::decide(&self.state.snapshot());
            let applied = self.state.apply_actuators(desired);
            if let Err(e) = hw.apply(&applied) {
                warn!("Cycle actuator write failed: {}", e);
                sink.emit(&AppEvent::ActuatorFault(e));
            }
        }

        // 3. Snapshot for broadcast
        let snapshot = self.state.snapshot();
        sink.emit(&AppEvent::CycleCompleted {
            snapshot,
            conditioning,
        });
        snapshot
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply one inbound command synchronously.
    ///
    /// Actuator effects reach the hardware before this returns.  If a
    /// persisted field changed, the store is written before this returns
    /// too; a failed write is reported but does not undo the change.
    /// An `Err` leaves the state untouched.
    pub fn handle_command(
        &mut self,
        origin: ChannelId,
        command: Command,
        hw: &mut impl ActuatorPort,
        store: &mut impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        let current = self.state.actuators();
        let config_changed = match command {
            Command::SetValve { valve, open } => {
                self.drive(current.with_valve(valve, open), hw, sink);
                false
            }
            Command::ToggleValve(valve) => {
                if origin != ChannelId::Hub {
                    return Err(self.reject(origin, CommandError::UnknownCommand, sink));
                }
                self.drive(current.with_valve(valve, !current.valve(valve)), hw, sink);
                false
            }
            Command::SetTargetTemperature(celsius) => self
                .state
                .apply_config(ConfigChange::TargetTemperature(celsius))
                .map_err(|e| self.reject(origin, e, sink))?,
            Command::SetFanSpeed(percent) => {
                let changed = self
                    .state
                    .apply_config(ConfigChange::FanSpeed(percent))
                    .map_err(|e| self.reject(origin, e, sink))?;
                self.drive(current.with_fan(percent), hw, sink);
                changed
            }
            Command::SetAutoMode(enabled) => self
                .state
                .apply_config(ConfigChange::AutoMode(enabled))
                .map_err(|e| self.reject(origin, e, sink))?,
        };

        info!("Command from {}: {}", origin, command);
        sink.emit(&AppEvent::CommandApplied { origin, command });

        if config_changed {
            self.persist(store, sink);
        }
        Ok(())
    }

    /// Record a message that was discarded before it became a command.
    pub fn note_rejected(&mut self, origin: ChannelId, reason: CommandError, sink: &mut impl EventSink) {
        self.reject(origin, reason, sink);
    }

    /// Record a channel link transition.
    pub fn set_link(&mut self, channel: ChannelId, connected: bool, sink: &mut impl EventSink) {
        if self.state.set_link(channel, connected) {
            sink.emit(&AppEvent::LinkChanged { channel, connected });
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    pub fn config(&self) -> PersistedConfig {
        self.state.config()
    }

    // ── Internal ──────────────────────────────────────────────

    fn drive(
        &mut self,
        desired: super::state::ActuatorCommand,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        let applied = self.state.apply_actuators(desired);
        if let Err(e) = hw.apply(&applied) {
            warn!("Command actuator write failed: {}", e);
            sink.emit(&AppEvent::ActuatorFault(e));
        }
    }

    fn persist(&self, store: &mut impl ConfigPort, sink: &mut impl EventSink) {
        let config = self.state.config();
        match store.save(&config) {
            Ok(()) => {
                info!("Config saved");
                sink.emit(&AppEvent::ConfigPersisted(config));
            }
            Err(e) => {
                warn!("Config save failed: {}", e);
                sink.emit(&AppEvent::ConfigPersistFailed(e));
            }
        }
    }

    fn reject(&self, origin: ChannelId, reason: CommandError, sink: &mut impl EventSink) -> CommandError {
        warn!("Command from {} discarded: {}", origin, reason);
        sink.emit(&AppEvent::CommandRejected { origin, reason });
        reason
    }
}
