//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] on the ESP-IDF NVS partition, or on an
//! in-memory map for host builds.  The configuration block on top of it
//! lives in [`crate::config_store`].
//!
//! Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.

use crate::app::ports::{StorageError, StoragePort};
use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::{HashMap, HashSet};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// NVS keys and namespaces are limited to 15 characters plus NUL.
#[cfg(target_os = "espidf")]
const NVS_NAME_LEN: usize = 16;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
    /// Host only: make every write fail (power-loss and full-flash tests).
    #[cfg(not(target_os = "espidf"))]
    fail_writes: bool,
    /// Host only: keys whose reads fail with `IoError`.
    #[cfg(not(target_os = "espidf"))]
    unreadable: HashSet<String>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is erased
    /// and re-initialised automatically.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            fail_writes: false,
            #[cfg(not(target_os = "espidf"))]
            unreadable: HashSet::new(),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Simulation: make subsequent writes fail with `IoError`.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Simulation: make reads of one key fail with `IoError` (flash page
    /// errors) while `fail` is set.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_fail_reads(&mut self, namespace: &str, key: &str, fail: bool) {
        let key = Self::composite_key(namespace, key);
        if fail {
            self.unreadable.insert(key);
        } else {
            self.unreadable.remove(&key);
        }
    }

    /// Simulation: overwrite a stored value in place, bypassing validation
    /// (corruption and torn-write tests).
    #[cfg(not(target_os = "espidf"))]
    pub fn corrupt(&mut self, namespace: &str, key: &str, f: impl FnOnce(&mut Vec<u8>)) {
        if let Some(data) = self.store.get_mut(&Self::composite_key(namespace, key)) {
            f(data);
        }
    }

    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; NVS_NAME_LEN] {
        let mut buf = [0u8; NVS_NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NVS_NAME_LEN - 1);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

/// Adapter without flash initialisation.  On the device every access then
/// fails and the config store falls back to defaults; on host it is an
/// empty simulated store.
impl Default for NvsAdapter {
    fn default() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            fail_writes: false,
            #[cfg(not(target_os = "espidf"))]
            unreadable: HashSet::new(),
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            if self.unreadable.contains(&composite) {
                return Err(StorageError::IoError);
            }
            match self.store.get(&composite) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::c_name(key);
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(e) => {
                    warn!("NvsAdapter: read {}/{} failed ({})", namespace, key, e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            if self.fail_writes {
                return Err(StorageError::IoError);
            }
            self.store.insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = Self::c_name(key);
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                warn!("NvsAdapter: write {}/{} failed ({})", namespace, key, e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = Self::c_name(key);
                let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::c_name(key);
                let ret = unsafe {
                    nvs_find_key(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}
