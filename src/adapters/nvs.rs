//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] for the snapshot that survives deep sleep.
//!
//! - **`target_os = "espidf"`**: blobs live in one NVS namespace.
//!   `nvs_set_blob` + `nvs_commit` replace a value atomically, so a brown-out
//!   mid-write leaves the previous snapshot readable.
//! - **`not(target_os = "espidf")`**: an in-memory map; single-entry
//!   replacement is trivially atomic.
//!
//! NVS keys are limited to 15 bytes; longer keys are rejected.
//!
//! When flash cannot be initialised the node still runs with
//! [`NvsAdapter::unavailable`]: every load finds nothing and every save
//! fails, so each cycle reports as if it had never reported before.

use log::{info, warn};

use crate::app::ports::StoragePort;
use crate::error::StorageError;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "sensornode";
const MAX_KEY_LEN: usize = 15;
const MAX_BLOB_SIZE: usize = 4000;

pub struct NvsAdapter {
    ready: bool,
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.  On first boot or after a layout version
    /// change the partition is erased and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
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

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            ready: true,
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        })
    }

    /// Stand-in for a partition that failed to initialise.
    pub fn unavailable() -> Self {
        warn!("NvsAdapter: storage unavailable, snapshots will not persist");
        Self {
            ready: false,
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// NUL-terminated copy of `s` for the C API.
    fn c_key(s: &str) -> Result<[u8; MAX_KEY_LEN + 1], StorageError> {
        if s.is_empty() || s.len() > MAX_KEY_LEN || s.contains('\0') {
            return Err(StorageError::IoError);
        }
        let mut buf = [0u8; MAX_KEY_LEN + 1];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        Ok(buf)
    }

    /// Open the namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_key(NAMESPACE).map_err(|_| ESP_ERR_INVALID_ARG as i32)?;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }
}

impl StoragePort for NvsAdapter {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let c_key = Self::c_key(key)?;
        if !self.ready {
            return Ok(None);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let _ = c_key;
            Ok(self.store.get(key).cloned())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_handle(false, |handle| {
                let mut size = 0usize;
                let ret = unsafe {
                    nvs_get_blob(handle, c_key.as_ptr().cast(), core::ptr::null_mut(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(handle, c_key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                buf.truncate(size);
                Ok(buf)
            });
            match result {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
                Err(e) => {
                    warn!("NvsAdapter: read error {}", e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    fn save(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        let c_key = Self::c_key(key)?;
        if !self.ready {
            return Err(StorageError::IoError);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let _ = c_key;
            self.store.insert(key.to_owned(), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(handle, c_key.as_ptr().cast(), data.as_ptr().cast(), data.len())
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
            match result {
                Ok(()) => Ok(()),
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
                Err(e) => {
                    warn!("NvsAdapter: write error {}", e);
                    Err(StorageError::IoError)
                }
            }
        }
    }
}
