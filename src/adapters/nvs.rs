//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] and [`StatePort`] for the SmartCam.  Both are
//! stored as `postcard` blobs in the `smartcam` namespace.
//!
//! - Config validation: every field is range-checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - The host build keeps blobs in a `HashMap` (simulation and tests).

use crate::app::ports::{ConfigError, ConfigPort, PersistedState, StatePort, StorageError};
use crate::config::SystemConfig;
use log::{info, warn};

#[cfg(not(feature = "espidf"))]
use std::collections::HashMap;

#[cfg(feature = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &[u8] = b"smartcam\0";
const CONFIG_KEY: &[u8] = b"syscfg\0";
const STATE_KEY: &[u8] = b"state\0";

#[cfg_attr(not(feature = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 4000;

pub struct NvsAdapter {
    #[cfg(not(feature = "espidf"))]
    store: std::cell::RefCell<HashMap<&'static [u8], Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(feature = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK
                {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(feature = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(feature = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    // ── Blob access ───────────────────────────────────────────

    #[cfg(not(feature = "espidf"))]
    fn read_blob(&self, key: &'static [u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.store.borrow().get(key).cloned())
    }

    #[cfg(not(feature = "espidf"))]
    fn write_blob(&self, key: &'static [u8], bytes: &[u8]) -> Result<(), StorageError> {
        self.store.borrow_mut().insert(key, bytes.to_vec());
        Ok(())
    }

    /// Open the namespace, execute a closure with the handle, then close.
    #[cfg(feature = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(NAMESPACE.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(feature = "espidf")]
    fn read_blob(&self, key: &'static [u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;

            // First call: get size
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr().cast(), core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });

        match result {
            Ok(buf) => Ok(Some(buf)),
            // A namespace that was never written cannot be opened read-only.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                Err(StorageError::IoError)
            }
        }
    }

    #[cfg(feature = "espidf")]
    fn write_blob(&self, key: &'static [u8], bytes: &[u8]) -> Result<(), StorageError> {
        let result = Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(handle, key.as_ptr().cast(), bytes.as_ptr().cast(), bytes.len())
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
            warn!("NvsAdapter: NVS write error {}", e);
            if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match self.read_blob(CONFIG_KEY) {
            Ok(Some(bytes)) => {
                let cfg: SystemConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                cfg.validate()?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Ok(None) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
            Err(_) => Err(ConfigError::IoError),
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(CONFIG_KEY, &bytes)
            .map_err(|_| ConfigError::IoError)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StatePort for NvsAdapter {
    fn load_state(&self) -> Result<PersistedState, StorageError> {
        match self.read_blob(STATE_KEY)? {
            Some(bytes) => postcard::from_bytes(&bytes).map_err(|_| StorageError::Corrupted),
            None => {
                info!("NvsAdapter: no stored state, starting fresh");
                Ok(PersistedState::default())
            }
        }
    }

    fn save_state(&mut self, state: &PersistedState) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(state).map_err(|_| StorageError::IoError)?;
        self.write_blob(STATE_KEY, &bytes)
    }
}
