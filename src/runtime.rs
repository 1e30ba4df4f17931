//! Controller runtime.
//!
//! Wires the [`AppService`] to its adapters, the two command channels and
//! the [`CycleScheduler`].  Everything runs on the caller's thread: one
//! call to [`Controller::step`] is one loop iteration, so a cycle and a
//! command can never overlap.
//!
//! ```text
//!  step(now) ──▶ scheduler.poll
//!                 ├─ service ─▶ hub.service ─┐
//!                 │             broker.service ─┴─▶ Dispatch ─▶ AppService
//!                 └─ sample ──▶ AppService::run_cycle ─▶ encode ─▶ hub + broker
//! ```

use log::{error, info, warn};

use crate::app::commands::{ChannelId, Command};
use crate::app::ports::{ActuatorPort, CommandDelegate, ConfigPort, EventSink, SensorPort};
use crate::app::service::AppService;
use crate::app::state::Snapshot;
use crate::channels::broker::{BrokerChannel, BrokerTransport};
use crate::channels::hub::{HubTransport, ObserverHub};
use crate::channels::wire;
use crate::channels::CommandChannel;
use crate::config::{ControllerConfig, PersistedConfig};
use crate::error::CommandError;
use crate::scheduler::{CycleScheduler, Due};

/// Bridges channel callbacks to the service for the length of one pass.
struct Dispatch<'a, H, S, E> {
    app: &'a mut AppService,
    hw: &'a mut H,
    store: &'a mut S,
    sink: &'a mut E,
}

impl<H: ActuatorPort, S: ConfigPort, E: EventSink> CommandDelegate for Dispatch<'_, H, S, E> {
    fn apply(&mut self, origin: ChannelId, command: Command) -> Result<(), CommandError> {
        self.app
            .handle_command(origin, command, self.hw, self.store, self.sink)
    }

    fn reject(&mut self, origin: ChannelId, reason: CommandError) {
        self.app.note_rejected(origin, reason, self.sink);
    }

    fn link_changed(&mut self, channel: ChannelId, connected: bool) {
        self.app.set_link(channel, connected, self.sink);
    }

    fn snapshot(&self) -> Snapshot {
        self.app.snapshot()
    }
}

/// The assembled controller.
pub struct Controller<H, S, HT: HubTransport, BT: BrokerTransport, E> {
    app: AppService,
    hw: H,
    store: S,
    hub: ObserverHub<HT>,
    broker: BrokerChannel<BT>,
    scheduler: CycleScheduler,
    sink: E,
}

impl<H, S, HT, BT, E> Controller<H, S, HT, BT, E>
where
    H: SensorPort + ActuatorPort,
    S: ConfigPort,
    HT: HubTransport,
    BT: BrokerTransport,
    E: EventSink,
{
    /// Load the persisted configuration, seed the state and drive the
    /// outputs to their initial values.  Never fails: an unreadable store
    /// means factory defaults, and unusable tuning values are reset.
    pub fn start(
        config: &ControllerConfig,
        mut hw: H,
        store: S,
        hub_transport: HT,
        broker_transport: BT,
        mut sink: E,
    ) -> Self {
        let config = &config.clone().sanitized();
        let persisted = match store.load() {
            Ok(c) => c,
            Err(e) => {
                warn!("Config load failed ({}), using defaults", e);
                PersistedConfig::default()
            }
        };
        let mut app = AppService::new(persisted);
        app.start(&mut hw, &mut sink);
        info!(
            "Controller up: sample every {} ms, channels every {} ms",
            config.sample_interval_ms, config.service_interval_ms
        );

        Self {
            app,
            hw,
            store,
            hub: ObserverHub::new(hub_transport, config),
            broker: BrokerChannel::new(broker_transport, config),
            scheduler: CycleScheduler::from_config(config),
            sink,
        }
    }

    /// One loop iteration.  Channels are serviced before the cycle so a
    /// command that arrived in time is reflected in this cycle's broadcast.
    pub fn step(&mut self, now_ms: u64) -> Due {
        let due = self.scheduler.poll(now_ms);
        if due.service {
            self.service_channels(now_ms);
        }
        if due.sample {
            self.run_cycle(now_ms);
        }
        due
    }

    fn service_channels(&mut self, now_ms: u64) {
        let mut dispatch = Dispatch {
            app: &mut self.app,
            hw: &mut self.hw,
            store: &mut self.store,
            sink: &mut self.sink,
        };
        self.hub.service(now_ms, &mut dispatch);
        self.broker.service(now_ms, &mut dispatch);
    }

    fn run_cycle(&mut self, now_ms: u64) {
        let snapshot = self.app.run_cycle(now_ms, &mut self.hw, &mut self.sink);
        match wire::encode_snapshot(&snapshot) {
            Ok(json) => {
                self.hub.broadcast(&json);
                self.broker.broadcast(&json);
            }
            Err(e) => error!("Snapshot encode failed: {}", e),
        }
    }

    /// Milliseconds the caller may sleep before the next iteration.
    pub fn idle_ms(&self, now_ms: u64) -> u64 {
        self.scheduler.idle_ms(now_ms)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn snapshot(&self) -> Snapshot {
        self.app.snapshot()
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hub(&self) -> &ObserverHub<HT> {
        &self.hub
    }

    pub fn hub_mut(&mut self) -> &mut ObserverHub<HT> {
        &mut self.hub
    }

    pub fn broker(&self) -> &BrokerChannel<BT> {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut BrokerChannel<BT> {
        &mut self.broker
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }
}
