//! End-to-end tests: Controller → AppService → mock hardware + loopback
//! channels + simulated NVS.

use greenhouse::adapters::loopback::{LoopbackBroker, LoopbackHub};
use greenhouse::adapters::nvs::NvsAdapter;
use greenhouse::app::commands::{ChannelId, ValveId};
use greenhouse::app::events::AppEvent;
use greenhouse::app::ports::ConfigPort;
use greenhouse::app::state::Quantity;
use greenhouse::channels::{CommandChannel, LinkState};
use greenhouse::config::{ControllerConfig, PersistedConfig};
use greenhouse::config_store::ConfigStore;
use greenhouse::runtime::Controller;
use serde_json::Value;

use crate::mock_hw::{MockHardware, RecordingSink};

type TestController =
    Controller<MockHardware, ConfigStore<NvsAdapter>, LoopbackHub, LoopbackBroker, RecordingSink>;

fn store_with(config: PersistedConfig) -> ConfigStore<NvsAdapter> {
    let mut store = ConfigStore::new(NvsAdapter::new().unwrap());
    store.save(&config).unwrap();
    store
}

fn controller(hw: MockHardware, store: ConfigStore<NvsAdapter>) -> TestController {
    Controller::start(
        &ControllerConfig::default(),
        hw,
        store,
        LoopbackHub::new(),
        LoopbackBroker::new(),
        RecordingSink::new(),
    )
}

fn auto(target: f32) -> PersistedConfig {
    PersistedConfig {
        target_temperature_c: target,
        auto_mode: true,
        ..Default::default()
    }
}

fn last_hub_json(c: &TestController) -> Value {
    serde_json::from_str(c.hub().transport().last_broadcast().unwrap()).unwrap()
}

#[test]
fn startup_restores_persisted_config() {
    let c = controller(MockHardware::new(), store_with(PersistedConfig {
        target_temperature_c: 28.5,
        fan_speed_percent: 65,
        auto_mode: true,
    }));
    let snap = c.snapshot();
    assert_eq!(snap.config.target_temperature_c, 28.5);
    assert!(snap.config.auto_mode);
    assert_eq!(snap.actuators.fan_speed_percent, 65);
    assert_eq!(c.hardware().fan(), Some(65));
    assert!(!c.hardware().valve_open(ValveId::One));
}

#[test]
fn warm_greenhouse_opens_both_valves() {
    let mut c = controller(MockHardware::reading(27.0, 50.0, 0.0), store_with(auto(24.0)));
    c.step(0);
    assert!(c.hardware().valve_open(ValveId::One));
    assert!(c.hardware().valve_open(ValveId::Two));
    assert_eq!(c.hardware().fan(), Some(60));

    let json = last_hub_json(&c);
    assert_eq!(json["valve1"], true);
    assert_eq!(json["valve2"], true);
    assert_eq!(json["fanSpeed"], 60);
}

#[test]
fn dry_soil_overrides_cold_reading() {
    let mut c = controller(MockHardware::reading(20.0, 20.0, 0.0), store_with(auto(24.0)));
    c.step(0);
    assert!(c.hardware().valve_open(ValveId::One));
    assert!(!c.hardware().valve_open(ValveId::Two));
}

#[test]
fn high_wind_caps_fan() {
    let mut c = controller(MockHardware::reading(28.0, 50.0, 20.0), store_with(auto(24.0)));
    c.step(0);
    assert_eq!(c.hardware().fan(), Some(20));
    assert_eq!(last_hub_json(&c)["fanSpeed"], 20);
}

#[test]
fn broadcast_pairs_sensed_and_actuator_values_from_one_cycle() {
    let mut c = controller(MockHardware::reading(27.0, 50.0, 0.0), store_with(auto(24.0)));
    c.step(0);
    assert_eq!(last_hub_json(&c)["valve1"], true);

    c.hardware_mut().set(Quantity::InternalTemperature, 20.0);
    c.step(2_000);
    let json = last_hub_json(&c);
    assert_eq!(json["temperature"], 20.0);
    assert_eq!(json["valve1"], false);
    assert_eq!(json["valve2"], false);

    // Both channels carry byte-identical payloads.
    let (_, published) = c.broker().transport().last_published().unwrap();
    assert_eq!(published, c.hub().transport().last_broadcast().unwrap());
}

#[test]
fn out_of_range_readings_are_clamped_in_broadcast() {
    let mut hw = MockHardware::reading(24.0, 150.0, 0.0);
    hw.set(Quantity::Co2Saturation, 9_000.0);
    let mut c = controller(hw, store_with(PersistedConfig::default()));
    c.step(0);
    let json = last_hub_json(&c);
    assert_eq!(json["soilMoisture"], 100.0);
    assert_eq!(json["co2Saturation"], 600.0);
}

#[test]
fn dead_sensors_still_broadcast_defaults() {
    let mut c = controller(MockHardware::new(), store_with(PersistedConfig::default()));
    c.step(0);
    let json = last_hub_json(&c);
    assert_eq!(json["temperature"], 22.5);
    assert_eq!(json["soilMoisture"], 50.0);
    assert_eq!(json["externalTemperature"], 20.0);
}

#[test]
fn manual_valve_command_is_overridden_by_next_auto_cycle() {
    let mut c = controller(MockHardware::reading(20.0, 50.0, 0.0), store_with(auto(24.0)));
    c.step(0);
    assert!(!c.hardware().valve_open(ValveId::Two));

    c.hub().transport().send_text(1, r#"{"command":"toggle_valve2"}"#);
    c.step(100);
    assert!(c.hardware().valve_open(ValveId::Two));

    c.step(2_000);
    assert!(!c.hardware().valve_open(ValveId::Two));
}

#[test]
fn sampling_continues_while_broker_is_down() {
    let mut c = controller(MockHardware::reading(24.0, 50.0, 0.0), store_with(PersistedConfig::default()));
    c.broker_mut().transport_mut().fail_next_connects(2);

    c.step(0); // attempt 1 fails
    c.step(2_000);
    c.step(4_000);
    c.step(5_000); // attempt 2 fails
    assert!(!c.broker().is_connected());
    assert_eq!(c.hub().transport().broadcast_count(), 3);
    assert_eq!(c.broker().transport().publish_count(), 0);
    assert!(!c.snapshot().connectivity.broker);

    c.step(10_000); // attempt 3 succeeds
    assert!(c.broker().is_connected());
    assert_eq!(c.broker().transport().connect_calls(), 3);
    assert_eq!(c.broker().transport().publish_count(), 1);
    assert_eq!(last_hub_json(&c)["mqttConnected"], true);
}

#[test]
fn link_transitions_are_reported_once() {
    let mut c = controller(MockHardware::new(), store_with(PersistedConfig::default()));
    c.step(0);
    c.hub_mut().transport_mut().drop_listener();
    c.hub_mut().transport_mut().fail_next_listens(1);
    c.step(100); // lost, immediate retry fails
    assert!(!c.snapshot().connectivity.hub);
    c.step(200);
    c.step(2_100); // retry after 2 s
    assert!(c.snapshot().connectivity.hub);

    let hub_events: Vec<bool> = c
        .sink()
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::LinkChanged {
                channel: ChannelId::Hub,
                connected,
            } => Some(*connected),
            _ => None,
        })
        .collect();
    assert_eq!(hub_events, vec![true, false, true]);
}

#[test]
fn config_change_survives_restart() {
    let mut c = controller(MockHardware::new(), store_with(PersistedConfig::default()));
    c.step(0);
    c.broker()
        .transport()
        .inject("irrigation/control/target_temp", b"31.5");
    c.broker().transport().inject("irrigation/control/auto_mode", b"true");
    c.step(100);
    assert!(c.snapshot().config.auto_mode);

    let restored = c.store().load().unwrap();
    assert_eq!(restored.target_temperature_c, 31.5);
    assert!(restored.auto_mode);
}

#[test]
fn pending_broker_session_does_not_stall_the_loop() {
    let mut broker = LoopbackBroker::new();
    broker.hold_handshake(true);
    let mut c = Controller::start(
        &ControllerConfig::default(),
        MockHardware::new(),
        store_with(PersistedConfig::default()),
        LoopbackHub::new(),
        broker,
        RecordingSink::new(),
    );

    assert!(c.step(0).sample);
    assert_eq!(c.broker().link_state(), LinkState::Connecting);
    assert!(c.hub().is_connected());
    assert_eq!(last_hub_json(&c)["mqttConnected"], false);

    assert!(c.step(2_000).sample);
    assert_eq!(c.hub().transport().broadcast_count(), 2);
    assert_eq!(c.broker().transport().publish_count(), 0);

    assert!(c.broker_mut().transport_mut().complete_handshake());
    c.step(2_100);
    assert!(c.broker().is_connected());
    c.step(4_000);
    assert_eq!(last_hub_json(&c)["mqttConnected"], true);
    assert_eq!(c.broker().transport().publish_count(), 1);
}
