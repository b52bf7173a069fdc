//! ESP32 clock adapter.
//!
//! Implements [`Clock`] for the controller.
//!
//! - **`target_os = "espidf"` with the `espidf` feature**: uptime from `esp_timer_get_time()`
//!   (microsecond precision, monotonic); wall clock from
//!   `gettimeofday()` once SNTP has set it.
//! - **otherwise**: `std::time::Instant` for uptime
//!   and `SystemTime` for the wall clock.

use crate::app::ports::Clock;
use crate::records::Timestamp;

/// Anything earlier than 2020-01-01 means the RTC was never synced.
const EPOCH_2020: u64 = 1_577_836_800;

pub struct SystemClock {
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Wall-clock seconds since the Unix epoch. `None` before SNTP sync.
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    pub fn unix_secs(&self) -> Option<u64> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        synced(tv.tv_sec as i64)
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    pub fn unix_secs(&self) -> Option<u64> {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs();
        synced(secs as i64)
    }
}

fn synced(secs: i64) -> Option<u64> {
    u64::try_from(secs).ok().filter(|s| *s >= EPOCH_2020)
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp {
            uptime_ms: self.uptime_ms(),
            unix_secs: self.unix_secs(),
        }
    }
}
