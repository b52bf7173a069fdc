//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`], [`CalibrationPort`] and [`StoragePort`].
//!
//! - Config validation: all fields are range-checked before persistence.
//! - Namespace isolation: each subsystem uses its own namespace prefix.
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().
//!
//! Config and calibration are stored as postcard blobs.  On the host the
//! backend is an in-memory map, which is what the tests exercise.

use crate::app::ports::{CalibrationPort, ConfigError, ConfigPort, StorageError, StoragePort};
use crate::calibration::CalibrationPoint;
use crate::config::SystemConfig;
use log::{info, warn};

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
use std::collections::HashMap;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "soilguard";
const CONFIG_KEY: &str = "syscfg";
const CALIBRATION_KEY: &str = "calib";

#[cfg_attr(not(all(target_os = "espidf", feature = "espidf")), allow(dead_code))]
pub(crate) const MAX_BLOB_SIZE: usize = 4000;

pub struct NvsAdapter {
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated, truncated to the 15-byte NVS limit.
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    // ── Blob helpers shared by the config and calibration ports ──

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self
            .store
            .borrow()
            .get(&Self::composite_key(CONFIG_NAMESPACE, key))
            .cloned())
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        let key_buf = Self::c_name(key);
        let result = Self::with_nvs_handle(CONFIG_NAMESPACE, false, |handle| {
            let mut size: usize = 0;
            // First call: get size
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }

            let mut buf = vec![0u8; size];
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
            Ok(buf)
        });

        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {} for {}", e, key);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn save_blob(&self, key: &str, bytes: Vec<u8>) -> Result<(), ConfigError> {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(CONFIG_NAMESPACE, key), bytes);
        Ok(())
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn save_blob(&self, key: &str, bytes: Vec<u8>) -> Result<(), ConfigError> {
        let key_buf = Self::c_name(key);
        let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    bytes.as_ptr() as *const _,
                    bytes.len(),
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
            warn!("NvsAdapter: NVS write error {} for {}", e, key);
            if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                ConfigError::StorageFull
            } else {
                ConfigError::IoError
            }
        })
    }
}


impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match self.load_blob(CONFIG_KEY) {
            Ok(Some(bytes)) => {
                let cfg: SystemConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Ok(None) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
            Err(e) => {
                warn!("NvsAdapter: config read failed ({}), using defaults", e);
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        let len = bytes.len();
        self.save_blob(CONFIG_KEY, bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", len);
        Ok(())
    }
}

impl CalibrationPort for NvsAdapter {
    fn load_calibration(&self) -> Result<Option<CalibrationPoint>, ConfigError> {
        match self.load_blob(CALIBRATION_KEY)? {
            Some(bytes) => postcard::from_bytes(&bytes).map(Some).map_err(|_| {
                warn!("NvsAdapter: calibration blob corrupted");
                ConfigError::Corrupted
            }),
            None => Ok(None),
        }
    }

    fn save_calibration(&self, point: &CalibrationPoint) -> Result<(), ConfigError> {
        point
            .validate()
            .map_err(|_| ConfigError::ValidationFailed("dry and wet references must differ"))?;
        let bytes = postcard::to_allocvec(point).map_err(|_| ConfigError::IoError)?;
        self.save_blob(CALIBRATION_KEY, bytes)?;
        info!("NvsAdapter: calibration saved");
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
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
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
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
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
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
        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let ret = unsafe {
                    nvs_find_key(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}
