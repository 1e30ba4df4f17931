//! ConfigStore over the simulated NVS backend: slot rotation, torn writes,
//! corrupt and out-of-range blocks.

use greenhouse::adapters::nvs::NvsAdapter;
use greenhouse::app::ports::{ConfigError, ConfigPort, StoragePort};
use greenhouse::config::PersistedConfig;
use greenhouse::config_store::{encode_block, ConfigStore, NAMESPACE, SLOT_KEYS};

fn cfg(target: f32, fan: u8, auto: bool) -> PersistedConfig {
    PersistedConfig {
        target_temperature_c: target,
        fan_speed_percent: fan,
        auto_mode: auto,
    }
}

fn fresh() -> ConfigStore<NvsAdapter> {
    ConfigStore::new(NvsAdapter::new().unwrap())
}

#[test]
fn first_boot_loads_defaults() {
    assert_eq!(fresh().load(), Ok(PersistedConfig::default()));
}

#[test]
fn saves_alternate_between_slots() {
    let mut store = fresh();
    store.save(&cfg(20.0, 10, false)).unwrap();
    assert!(store.storage().exists(NAMESPACE, SLOT_KEYS[0]));
    assert!(!store.storage().exists(NAMESPACE, SLOT_KEYS[1]));

    store.save(&cfg(21.0, 20, true)).unwrap();
    assert!(store.storage().exists(NAMESPACE, SLOT_KEYS[1]));
    store.save(&cfg(22.0, 30, false)).unwrap();

    assert_eq!(store.load(), Ok(cfg(22.0, 30, false)));
}

#[test]
fn torn_write_falls_back_to_previous_config() {
    let mut store = fresh();
    store.save(&cfg(20.0, 10, false)).unwrap();
    store.save(&cfg(33.0, 90, true)).unwrap();

    // Power cut halfway through the second write.
    store
        .storage_mut()
        .corrupt(NAMESPACE, SLOT_KEYS[1], |bytes| bytes.truncate(7));
    assert_eq!(store.load(), Ok(cfg(20.0, 10, false)));

    // The next save overwrites the damaged slot, not the good one.
    store.save(&cfg(25.0, 50, true)).unwrap();
    assert_eq!(store.load(), Ok(cfg(25.0, 50, true)));
    store
        .storage_mut()
        .corrupt(NAMESPACE, SLOT_KEYS[1], |bytes| bytes[0] ^= 0xFF);
    assert_eq!(store.load(), Ok(cfg(20.0, 10, false)));
}

#[test]
fn out_of_range_fields_fall_back_individually() {
    let mut store = fresh();
    let mut bad = cfg(30.0, 70, true);
    bad.target_temperature_c = 45.0;
    let block = encode_block(&bad, 1);
    store
        .storage_mut()
        .write(NAMESPACE, SLOT_KEYS[0], &block)
        .unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.target_temperature_c, 24.0);
    assert_eq!(loaded.fan_speed_percent, 70);
    assert!(loaded.auto_mode);
}

#[test]
fn low_target_in_store_loads_as_default() {
    let mut store = fresh();
    let block = encode_block(&cfg(5.0, 45, false), 1);
    store
        .storage_mut()
        .write(NAMESPACE, SLOT_KEYS[0], &block)
        .unwrap();
    assert_eq!(store.load().unwrap().target_temperature_c, 24.0);
}

#[test]
fn both_slots_corrupt_means_defaults() {
    let mut store = fresh();
    store.save(&cfg(20.0, 10, true)).unwrap();
    store.save(&cfg(21.0, 11, true)).unwrap();
    for key in SLOT_KEYS {
        store.storage_mut().corrupt(NAMESPACE, key, |b| b[15] ^= 1);
    }
    assert_eq!(store.load(), Ok(PersistedConfig::default()));
}

#[test]
fn failed_write_leaves_store_unchanged() {
    let mut store = fresh();
    store.save(&cfg(20.0, 10, false)).unwrap();
    store.storage_mut().set_fail_writes(true);
    assert_eq!(store.save(&cfg(30.0, 99, true)), Err(ConfigError::IoError));
    store.storage_mut().set_fail_writes(false);
    assert_eq!(store.load(), Ok(cfg(20.0, 10, false)));
}

#[test]
fn invalid_config_is_never_written() {
    let mut store = fresh();
    assert!(matches!(
        store.save(&cfg(50.0, 10, false)),
        Err(ConfigError::ValidationFailed(_))
    ));
    assert!(!store.storage().exists(NAMESPACE, SLOT_KEYS[0]));
}

#[test]
fn generation_wraps_without_losing_order() {
    let mut store = fresh();
    for i in 0..300u32 {
        store
            .save(&cfg(10.0 + (i % 30) as f32, (i % 100) as u8, i % 2 == 0))
            .unwrap();
    }
    let i = 299u32;
    assert_eq!(
        store.load(),
        Ok(cfg(10.0 + (i % 30) as f32, (i % 100) as u8, i % 2 == 0))
    );
}
