//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the control loop
//! stalls.  The loop feeds it between sleep slices through the
//! [`Heartbeat`] port, so the timeout only needs to exceed one cycle's
//! sensor reads and relay writes, not the cycle interval.

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use esp_idf_svc::sys::*;

use log::info;

use crate::app::ports::Heartbeat;

pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    subscribed: bool,
    timeout_ms: u32,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({}ms timeout, panic on trigger)", timeout_ms);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self {
                    subscribed,
                    timeout_ms,
                }
            }
        }

        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        {
            info!("Watchdog(sim): no-op, {}ms timeout", timeout_ms);
            Self { timeout_ms }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }
}

impl Heartbeat for Watchdog {
    fn feed(&self) {
        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_delete(core::ptr::null_mut());
                }
            }
        }
    }
}
