//! Channel tests: ObserverHub / BrokerChannel over loopback transports,
//! with a recording delegate standing in for the service.

use greenhouse::adapters::loopback::{LoopbackBroker, LoopbackHub};
use greenhouse::app::commands::{ChannelId, Command, ValveId};
use greenhouse::app::ports::CommandDelegate;
use greenhouse::app::state::{Snapshot, SystemState};
use greenhouse::channels::broker::BrokerChannel;
use greenhouse::channels::hub::ObserverHub;
use greenhouse::channels::{CommandChannel, LinkState};
use greenhouse::config::{ControllerConfig, PersistedConfig};
use greenhouse::error::CommandError;

struct Recorder {
    state: SystemState,
    applied: Vec<(ChannelId, Command)>,
    rejected: Vec<(ChannelId, CommandError)>,
    links: Vec<(ChannelId, bool)>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            state: SystemState::new(PersistedConfig::default()),
            applied: Vec::new(),
            rejected: Vec::new(),
            links: Vec::new(),
        }
    }
}

impl CommandDelegate for Recorder {
    fn apply(&mut self, origin: ChannelId, command: Command) -> Result<(), CommandError> {
        self.applied.push((origin, command));
        Ok(())
    }

    fn reject(&mut self, origin: ChannelId, reason: CommandError) {
        self.rejected.push((origin, reason));
    }

    fn link_changed(&mut self, channel: ChannelId, connected: bool) {
        self.links.push((channel, connected));
    }

    fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }
}

fn hub() -> ObserverHub<LoopbackHub> {
    ObserverHub::new(LoopbackHub::new(), &ControllerConfig::default())
}

fn broker() -> BrokerChannel<LoopbackBroker> {
    BrokerChannel::new(LoopbackBroker::new(), &ControllerConfig::default())
}

// ── Hub ───────────────────────────────────────────────────────

#[test]
fn new_observer_is_greeted_with_snapshot() {
    let mut hub = hub();
    let mut d = Recorder::new();
    hub.service(0, &mut d);
    hub.transport().connect_observer(4);
    hub.service(100, &mut d);

    assert_eq!(hub.observer_count(), 1);
    let greeting: Vec<&str> = hub.transport().sent_to(4).collect();
    assert_eq!(greeting.len(), 1);
    let json: serde_json::Value = serde_json::from_str(greeting[0]).unwrap();
    assert_eq!(json["targetTemperature"], 24.0);
    assert_eq!(json["valve1"], false);
}

#[test]
fn hub_decodes_every_command() {
    let mut hub = hub();
    let mut d = Recorder::new();
    hub.service(0, &mut d);
    let t = hub.transport();
    t.send_text(1, r#"{"command":"toggle_valve1"}"#);
    t.send_text(1, r#"{"command":"set_target_temp","value":26.5}"#);
    t.send_text(1, r#"{"command":"set_fan_speed","value":"70"}"#);
    t.send_text(1, r#"{"command":"set_auto_mode","value":true}"#);
    hub.service(100, &mut d);

    assert_eq!(
        d.applied,
        vec![
            (ChannelId::Hub, Command::ToggleValve(ValveId::One)),
            (ChannelId::Hub, Command::SetTargetTemperature(26.5)),
            (ChannelId::Hub, Command::SetFanSpeed(70)),
            (ChannelId::Hub, Command::SetAutoMode(true)),
        ]
    );
    assert!(d.rejected.is_empty());
}

#[test]
fn hub_rejects_garbage_and_keeps_going() {
    let mut hub = hub();
    let mut d = Recorder::new();
    hub.service(0, &mut d);
    let t = hub.transport();
    t.send_text(1, "not json");
    t.send_text(1, r#"{"command":"open_the_roof"}"#);
    t.send_text(1, r#"{"command":"set_target_temp","value":"warm"}"#);
    t.send_text(1, r#"{"command":"toggle_valve2"}"#);
    hub.service(100, &mut d);

    assert_eq!(
        d.rejected,
        vec![
            (ChannelId::Hub, CommandError::Malformed),
            (ChannelId::Hub, CommandError::UnknownCommand),
            (ChannelId::Hub, CommandError::InvalidValue),
        ]
    );
    assert_eq!(d.applied.len(), 1);
    assert!(hub.is_connected());
}

#[test]
fn hub_pass_is_bounded_by_message_budget() {
    let mut hub = hub();
    let mut d = Recorder::new();
    hub.service(0, &mut d);
    for _ in 0..12 {
        hub.transport().send_text(1, r#"{"command":"toggle_valve1"}"#);
    }
    hub.service(100, &mut d);
    assert_eq!(d.applied.len(), 8);
    hub.service(200, &mut d);
    assert_eq!(d.applied.len(), 12);
}

#[test]
fn hub_backoff_doubles_between_listen_failures() {
    let mut hub = hub();
    let mut d = Recorder::new();
    hub.transport_mut().fail_next_listens(3);

    hub.service(0, &mut d); // fail, retry at 2000
    hub.service(1_999, &mut d);
    assert_eq!(hub.transport().listen_calls(), 1);
    hub.service(2_000, &mut d); // fail, retry at 6000
    hub.service(5_999, &mut d);
    assert_eq!(hub.transport().listen_calls(), 2);
    hub.service(6_000, &mut d); // fail, retry at 14000
    hub.service(14_000, &mut d);
    assert_eq!(hub.transport().listen_calls(), 4);
    assert_eq!(hub.link_state(), LinkState::Connected);
    assert_eq!(d.links, vec![(ChannelId::Hub, true)]);
}

#[test]
fn hub_broadcast_is_silent_while_down() {
    let mut hub = hub();
    hub.broadcast("{}");
    assert_eq!(hub.transport().broadcast_count(), 0);
}

// ── Broker ────────────────────────────────────────────────────

#[test]
fn broker_session_subscribes_control_topics() {
    let mut broker = broker();
    let mut d = Recorder::new();
    broker.service(0, &mut d);

    let subs = broker.transport().subscriptions();
    for field in ["valve1", "valve2", "target_temp", "fan_speed", "auto_mode"] {
        let topic = format!("irrigation/control/{field}");
        assert!(subs.contains(&topic), "missing {topic}");
    }
    assert_eq!(broker.transport().last_client_id(), Some("ESP32_Irrigation"));
    assert_eq!(d.links, vec![(ChannelId::Broker, true)]);
}

#[test]
fn broker_decodes_topic_payloads() {
    let mut broker = broker();
    let mut d = Recorder::new();
    broker.service(0, &mut d);
    let t = broker.transport();
    t.inject("irrigation/control/valve2", b"true");
    t.inject("irrigation/control/fan_speed", b" 33 ");
    t.inject("irrigation/control/auto_mode", b"TRUE");
    t.inject("irrigation/control/target_temp", b"22.5x");
    broker.service(100, &mut d);

    assert_eq!(
        d.applied,
        vec![
            (
                ChannelId::Broker,
                Command::SetValve {
                    valve: ValveId::Two,
                    open: true
                }
            ),
            (ChannelId::Broker, Command::SetFanSpeed(33)),
        ]
    );
    assert_eq!(
        d.rejected,
        vec![
            (ChannelId::Broker, CommandError::InvalidValue),
            (ChannelId::Broker, CommandError::InvalidValue),
        ]
    );
}

#[test]
fn broker_retries_on_fixed_delay_after_loss() {
    let mut broker = broker();
    let mut d = Recorder::new();
    broker.service(0, &mut d);
    broker.transport_mut().drop_connection();
    broker.transport_mut().fail_next_connects(2);

    broker.service(100, &mut d); // lost, immediate retry fails
    broker.service(5_099, &mut d);
    broker.service(5_100, &mut d); // fails again
    broker.service(10_100, &mut d); // succeeds
    assert_eq!(broker.transport().connect_calls(), 4);
    assert!(broker.is_connected());
    assert_eq!(
        d.links,
        vec![
            (ChannelId::Broker, true),
            (ChannelId::Broker, false),
            (ChannelId::Broker, true),
        ]
    );
}

#[test]
fn broker_stays_connecting_until_handshake_completes() {
    let mut broker = broker();
    let mut d = Recorder::new();
    broker.transport_mut().hold_handshake(true);

    broker.service(0, &mut d);
    assert_eq!(broker.link_state(), LinkState::Connecting);
    assert!(broker.transport().subscriptions().is_empty());
    broker.service(100, &mut d);
    assert_eq!(broker.transport().connect_calls(), 1);
    assert!(d.links.is_empty());

    assert!(broker.transport_mut().complete_handshake());
    broker.service(200, &mut d);
    assert!(broker.is_connected());
    assert_eq!(broker.transport().subscriptions().len(), 5);
    assert_eq!(d.links, vec![(ChannelId::Broker, true)]);
}

#[test]
fn broker_handshake_timeout_counts_as_failure() {
    let mut broker = broker();
    let mut d = Recorder::new();
    broker.transport_mut().hold_handshake(true);

    broker.service(0, &mut d);
    broker.service(2_999, &mut d);
    assert_eq!(broker.link_state(), LinkState::Connecting);
    broker.service(3_000, &mut d); // 3 s handshake limit
    assert_eq!(broker.link_state(), LinkState::Disconnected);
    assert!(!broker.transport_mut().complete_handshake());

    broker.transport_mut().hold_handshake(false);
    broker.service(7_999, &mut d);
    assert_eq!(broker.transport().connect_calls(), 1);
    broker.service(8_000, &mut d);
    assert_eq!(broker.transport().connect_calls(), 2);
    assert!(broker.is_connected());
}

#[test]
fn messages_from_a_lost_session_are_discarded() {
    let mut broker = broker();
    let mut d = Recorder::new();
    broker.service(0, &mut d);
    assert!(broker.transport().inject("irrigation/control/valve1", b"true"));
    broker.transport_mut().drop_connection();

    broker.service(100, &mut d); // lost, then an immediate fresh session
    assert!(broker.is_connected());
    assert!(d.applied.is_empty());
    assert_eq!(broker.transport().queued(), 0);
    assert_eq!(
        d.links,
        vec![
            (ChannelId::Broker, true),
            (ChannelId::Broker, false),
            (ChannelId::Broker, true),
        ]
    );
}

#[test]
fn broker_publishes_to_data_topic() {
    let mut broker = broker();
    broker.service(0, &mut Recorder::new());
    broker.broadcast(r#"{"temperature":22.5}"#);
    assert_eq!(
        broker.transport().last_published(),
        Some(("irrigation/sensors/data", r#"{"temperature":22.5}"#))
    );
}
