//! Integration tests: AppService → policy → actuators, commands and
//! persistence through a ConfigStore over an in-memory storage mock.

use greenhouse::app::commands::{ChannelId, Command, ValveId};
use greenhouse::app::events::AppEvent;
use greenhouse::app::ports::{
    ActuatorPort, ConfigPort, EventSink, SensorPort, StorageError, StoragePort,
};
use greenhouse::app::service::AppService;
use greenhouse::app::state::{Quantity, RawSample};
use greenhouse::channels::wire;
use greenhouse::config::PersistedConfig;
use greenhouse::config_store::{encode_block, ConfigStore, NAMESPACE, SLOT_KEYS};
use greenhouse::error::{ActuatorError, CommandError, SensorError};
use std::collections::HashMap;

// ── Mock implementations ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum ActCall {
    Valve(ValveId, bool),
    Fan(u8),
}

struct MockHw {
    raw: RawSample,
    calls: Vec<ActCall>,
    fan_broken: bool,
}

impl MockHw {
    fn new() -> Self {
        Self {
            raw: RawSample::unavailable(),
            calls: Vec::new(),
            fan_broken: false,
        }
    }

    fn climate(temperature: f32, soil: f32, wind: f32) -> Self {
        let mut hw = Self::new();
        hw.raw = RawSample::unavailable()
            .with(Quantity::InternalTemperature, temperature)
            .with(Quantity::SoilMoisture, soil)
            .with(Quantity::WindSpeed, wind);
        hw
    }
}

impl SensorPort for MockHw {
    fn read(&mut self, quantity: Quantity) -> Result<f32, SensorError> {
        self.raw.get(quantity).ok_or(SensorError::NoResponse)
    }
}

impl ActuatorPort for MockHw {
    fn set_valve(&mut self, valve: ValveId, open: bool) -> Result<(), ActuatorError> {
        self.calls.push(ActCall::Valve(valve, open));
        Ok(())
    }
    fn set_fan_speed(&mut self, percent: u8) -> Result<(), ActuatorError> {
        if self.fan_broken {
            return Err(ActuatorError::PwmWriteFailed);
        }
        self.calls.push(ActCall::Fan(percent));
        Ok(())
    }
}

#[derive(Default)]
struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    writes: usize,
}

impl StoragePort for MockNvs {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&format!("{}::{}", ns, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }
    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.writes += 1;
        self.store.insert(format!("{}::{}", ns, key), data.to_vec());
        Ok(())
    }
    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", ns, key));
        Ok(())
    }
    fn exists(&self, ns: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", ns, key))
    }
}

#[derive(Default)]
struct Sink {
    events: Vec<AppEvent>,
}

impl EventSink for Sink {
    fn emit(&mut self, e: &AppEvent) {
        self.events.push(e.clone());
    }
}

fn auto_app(target: f32) -> AppService {
    AppService::new(PersistedConfig {
        target_temperature_c: target,
        auto_mode: true,
        ..Default::default()
    })
}

fn store() -> ConfigStore<MockNvs> {
    ConfigStore::new(MockNvs::default())
}

// ── Sensing ───────────────────────────────────────────────────

#[test]
fn soil_reading_of_150_is_clamped_to_100() {
    let mut app = AppService::new(PersistedConfig::default());
    let mut hw = MockHw::climate(24.0, 150.0, 0.0);
    let snap = app.run_cycle(2_000, &mut hw, &mut Sink::default());
    assert_eq!(snap.sensed.soil_moisture, 100.0);
}

#[test]
fn non_finite_reading_becomes_default() {
    let mut app = AppService::new(PersistedConfig::default());
    let mut hw = MockHw::climate(f32::NAN, 50.0, f32::INFINITY);
    let snap = app.run_cycle(2_000, &mut hw, &mut Sink::default());
    assert_eq!(snap.sensed.temperature, 22.5);
    assert_eq!(snap.sensed.wind_speed, 0.0);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn stored_target_outside_10_to_40_loads_as_24() {
    for bad in [9.9_f32, -3.0, 40.1, 120.0] {
        let mut s = store();
        let block = encode_block(
            &PersistedConfig {
                target_temperature_c: bad,
                fan_speed_percent: 50,
                auto_mode: true,
            },
            1,
        );
        s.storage_mut().write(NAMESPACE, SLOT_KEYS[0], &block).unwrap();
        let loaded = s.load().unwrap();
        assert_eq!(loaded.target_temperature_c, 24.0, "stored {bad}");
        assert_eq!(loaded.fan_speed_percent, 50);
    }
}

#[test]
fn out_of_range_target_command_changes_nothing() {
    let mut app = AppService::new(PersistedConfig::default());
    let mut s = store();
    let mut sink = Sink::default();
    let before = app.snapshot();
    let r = app.handle_command(
        ChannelId::Hub,
        Command::SetTargetTemperature(55.0),
        &mut MockHw::new(),
        &mut s,
        &mut sink,
    );
    assert!(matches!(r, Err(CommandError::OutOfRange(_))));
    assert_eq!(app.snapshot(), before);
    assert_eq!(s.storage().writes, 0);
    assert!(matches!(
        sink.events.last(),
        Some(AppEvent::CommandRejected { origin: ChannelId::Hub, .. })
    ));
}

#[test]
fn target_command_is_persisted_once() {
    let mut app = AppService::new(PersistedConfig::default());
    let mut s = store();
    let mut hw = MockHw::new();
    let mut sink = Sink::default();
    for _ in 0..3 {
        app.handle_command(
            ChannelId::Broker,
            Command::SetTargetTemperature(27.0),
            &mut hw,
            &mut s,
            &mut sink,
        )
        .unwrap();
    }
    assert_eq!(s.storage().writes, 1);
    assert_eq!(s.load().unwrap().target_temperature_c, 27.0);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn repeated_valve_command_is_idempotent() {
    let mut app = AppService::new(PersistedConfig::default());
    let mut hw = MockHw::new();
    let mut s = store();
    let mut sink = Sink::default();
    let open = Command::SetValve {
        valve: ValveId::One,
        open: true,
    };
    app.handle_command(ChannelId::Broker, open, &mut hw, &mut s, &mut sink)
        .unwrap();
    let once = app.snapshot();
    app.handle_command(ChannelId::Broker, open, &mut hw, &mut s, &mut sink)
        .unwrap();
    let twice = app.snapshot();

    assert_eq!(once.actuators, twice.actuators);
    assert!(twice.actuators.valve1_open);
    assert!(hw.calls.contains(&ActCall::Valve(ValveId::One, true)));
    assert!(!hw.calls.contains(&ActCall::Valve(ValveId::One, false)));
}

#[test]
fn unknown_hub_command_leaves_state_unchanged() {
    let mut app = AppService::new(PersistedConfig::default());
    let mut sink = Sink::default();
    let before = app.snapshot();

    let reason = wire::parse_hub_message(r#"{"command":"self_destruct","value":1}"#).unwrap_err();
    app.note_rejected(ChannelId::Hub, reason, &mut sink);

    assert_eq!(reason, CommandError::UnknownCommand);
    assert_eq!(app.snapshot(), before);
}

#[test]
fn toggle_flips_valve_each_time() {
    let mut app = AppService::new(PersistedConfig::default());
    let mut hw = MockHw::new();
    let mut s = store();
    let mut sink = Sink::default();
    let toggle = Command::ToggleValve(ValveId::Two);
    app.handle_command(ChannelId::Hub, toggle, &mut hw, &mut s, &mut sink)
        .unwrap();
    assert!(app.snapshot().actuators.valve2_open);
    app.handle_command(ChannelId::Hub, toggle, &mut hw, &mut s, &mut sink)
        .unwrap();
    assert!(!app.snapshot().actuators.valve2_open);
}

// ── Auto mode ─────────────────────────────────────────────────

#[test]
fn diff_of_three_opens_both_valves() {
    let mut app = auto_app(24.0);
    let mut hw = MockHw::climate(27.0, 50.0, 0.0);
    let snap = app.run_cycle(2_000, &mut hw, &mut Sink::default());
    assert!(snap.actuators.valve1_open);
    assert!(snap.actuators.valve2_open);
}

#[test]
fn dry_soil_forces_valve1_open_in_cold_band() {
    let mut app = auto_app(24.0);
    let mut hw = MockHw::climate(20.0, 20.0, 0.0);
    let snap = app.run_cycle(2_000, &mut hw, &mut Sink::default());
    assert!(snap.actuators.valve1_open);
    assert!(!snap.actuators.valve2_open);
}

#[test]
fn high_wind_caps_fan_at_20() {
    let mut app = auto_app(24.0);
    let mut hw = MockHw::climate(28.0, 50.0, 20.0);
    let snap = app.run_cycle(2_000, &mut hw, &mut Sink::default());
    assert_eq!(snap.actuators.fan_speed_percent, 20);
    assert_eq!(hw.calls.last(), Some(&ActCall::Fan(20)));
}

#[test]
fn cycle_snapshot_matches_emitted_event() {
    let mut app = auto_app(24.0);
    let mut hw = MockHw::climate(27.0, 50.0, 0.0);
    let mut sink = Sink::default();
    let snap = app.run_cycle(4_000, &mut hw, &mut sink);
    match sink.events.last() {
        Some(AppEvent::CycleCompleted { snapshot, .. }) => assert_eq!(*snapshot, snap),
        other => panic!("expected CycleCompleted, got {other:?}"),
    }
    assert_eq!(snap.timestamp_ms, 4_000);
    assert_eq!(snap.sensed.temperature, 27.0);
    assert!(snap.actuators.valve1_open);
}

#[test]
fn broken_fan_does_not_abort_cycle() {
    let mut app = auto_app(24.0);
    let mut hw = MockHw::climate(28.0, 50.0, 0.0);
    hw.fan_broken = true;
    let mut sink = Sink::default();
    let snap = app.run_cycle(2_000, &mut hw, &mut sink);

    assert!(snap.actuators.valve1_open);
    assert_eq!(snap.actuators.fan_speed_percent, 80);
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::ActuatorFault(ActuatorError::PwmWriteFailed))));
    assert!(matches!(sink.events.last(), Some(AppEvent::CycleCompleted { .. })));
}
