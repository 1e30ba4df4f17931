//! Transactional configuration store.
//!
//! The persisted subset is written as one fixed 16-byte block:
//!
//! ```text
//!  0..4   target temperature   f32 LE
//!  4..8   fan speed            i32 LE
//!  8      auto mode            u8, 0 or 1
//!  9      generation           u8, wrapping
//! 10..12  reserved             zero
//! 12..16  SHA-256(bytes 0..12) first four bytes
//! ```
//!
//! Two slots alternate.  `save` always overwrites the slot that does NOT
//! hold the newest valid block, so a write torn by power loss leaves the
//! previous configuration readable.  `load` takes the newest slot whose
//! digest checks out and then falls back per field to defaults.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::{self, PersistedConfig};

pub const NAMESPACE: &str = "greenhouse";
pub const SLOT_KEYS: [&str; 2] = ["cfg_a", "cfg_b"];
pub const BLOCK_LEN: usize = 16;

const DIGEST_OFFSET: usize = 12;
const DIGEST_LEN: usize = 4;

/// A block that passed its integrity check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedBlock {
    pub generation: u8,
    /// Already sanitized: every invalid field replaced by its default.
    pub config: PersistedConfig,
    /// Number of fields that needed the fallback.
    pub defaulted_fields: u8,
}

fn digest(body: &[u8]) -> [u8; DIGEST_LEN] {
    let full = hmac_sha256::Hash::hash(body);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&full[..DIGEST_LEN]);
    out
}

pub fn encode_block(cfg: &PersistedConfig, generation: u8) -> [u8; BLOCK_LEN] {
    let mut block = [0u8; BLOCK_LEN];
    block[0..4].copy_from_slice(&cfg.target_temperature_c.to_le_bytes());
    block[4..8].copy_from_slice(&i32::from(cfg.fan_speed_percent).to_le_bytes());
    block[8] = u8::from(cfg.auto_mode);
    block[9] = generation;
    let d = digest(&block[..DIGEST_OFFSET]);
    block[DIGEST_OFFSET..].copy_from_slice(&d);
    block
}

/// Returns `None` for a short block or a digest mismatch.
pub fn decode_block(bytes: &[u8]) -> Option<DecodedBlock> {
    let block: &[u8; BLOCK_LEN] = bytes.try_into().ok()?;
    if block[DIGEST_OFFSET..] != digest(&block[..DIGEST_OFFSET]) {
        return None;
    }

    let defaults = PersistedConfig::default();
    let mut defaulted_fields = 0;

    let target = f32::from_le_bytes([block[0], block[1], block[2], block[3]]);
    let target_temperature_c = if config::target_temperature_valid(target) {
        target
    } else {
        defaulted_fields += 1;
        defaults.target_temperature_c
    };

    let fan = i32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    let fan_speed_percent = if config::fan_speed_valid(i64::from(fan)) {
        fan as u8
    } else {
        defaulted_fields += 1;
        defaults.fan_speed_percent
    };

    let auto_mode = match block[8] {
        0 => false,
        1 => true,
        _ => {
            defaulted_fields += 1;
            defaults.auto_mode
        }
    };

    Some(DecodedBlock {
        generation: block[9],
        config: PersistedConfig {
            target_temperature_c,
            fan_speed_percent,
            auto_mode,
        },
        defaulted_fields,
    })
}

/// Wrap-aware "a was written after b".
fn is_newer(a: u8, b: u8) -> bool {
    (a.wrapping_sub(b) as i8) > 0
}

/// [`ConfigPort`] on top of any [`StoragePort`].
pub struct ConfigStore<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> ConfigStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    fn read_slot(&self, slot: usize) -> Result<Option<DecodedBlock>, StorageError> {
        let mut buf = [0u8; BLOCK_LEN + 1];
        match self.storage.read(NAMESPACE, SLOT_KEYS[slot], &mut buf) {
            Ok(len) => {
                let block = decode_block(&buf[..len]);
                if block.is_none() {
                    warn!("ConfigStore: slot {} failed integrity check", SLOT_KEYS[slot]);
                }
                Ok(block)
            }
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Index and block of the newest valid slot.
    fn newest(&self) -> (Option<(usize, DecodedBlock)>, [Result<(), StorageError>; 2]) {
        let mut best: Option<(usize, DecodedBlock)> = None;
        let mut status = [Ok(()), Ok(())];
        for slot in 0..SLOT_KEYS.len() {
            match self.read_slot(slot) {
                Ok(Some(block)) => {
                    let replace = best.is_none_or(|(_, b)| is_newer(block.generation, b.generation));
                    if replace {
                        best = Some((slot, block));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("ConfigStore: reading {} failed: {}", SLOT_KEYS[slot], e);
                    status[slot] = Err(e);
                }
            }
        }
        (best, status)
    }
}

impl<S: StoragePort> ConfigPort for ConfigStore<S> {
    fn load(&self) -> Result<PersistedConfig, ConfigError> {
        let (best, status) = self.newest();
        match best {
            Some((slot, block)) => {
                if block.defaulted_fields > 0 {
                    warn!(
                        "ConfigStore: {} field(s) out of range in {}, using defaults for them",
                        block.defaulted_fields, SLOT_KEYS[slot]
                    );
                }
                info!(
                    "ConfigStore: loaded {} (generation {})",
                    SLOT_KEYS[slot], block.generation
                );
                Ok(block.config)
            }
            None => match status {
                [Err(e), Err(_)] => Err(e.into()),
                _ => {
                    info!("ConfigStore: no stored config, using defaults");
                    Ok(PersistedConfig::default())
                }
            },
        }
    }

    fn save(&mut self, config: &PersistedConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::ValidationFailed)?;

        let (best, status) = self.newest();
        let (slot, generation) = match best {
            Some((slot, block)) => (1 - slot, block.generation.wrapping_add(1)),
            // An unreadable slot may hold a newer generation than anything
            // written now; refuse rather than write out of order.
            None => match status.iter().find_map(|s| s.err()) {
                Some(e) => {
                    warn!("ConfigStore: no readable slot, save refused");
                    return Err(e.into());
                }
                None => (0, 1),
            },
        };

        let block = encode_block(config, generation);
        self.storage
            .write(NAMESPACE, SLOT_KEYS[slot], &block)
            .map_err(ConfigError::from)?;
        info!(
            "ConfigStore: saved to {} (generation {})",
            SLOT_KEYS[slot], generation
        );
        Ok(())
    }
}
