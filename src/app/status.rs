//! Liveness and state surface polled by the external status endpoint.
//!
//! The control loop writes, pollers read a copy; both sides only ever
//! hold the lock for a struct copy.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::Serialize;

use crate::fsm::StateId;
use crate::records::Timestamp;

/// Short fixed-capacity identifier (device id, boot token).
pub type Tag = heapless::String<16>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub state: StateId,
    pub state_since: Timestamp,
    pub last_cycle_at: Option<Timestamp>,
    pub started_at: Timestamp,
    /// Changes on every boot; lets a poller notice a restart.
    pub boot_token: Tag,
    pub device_id: Tag,
    pub cycles: u64,
    pub calibrated: bool,
    pub sensor_degraded: bool,
    /// The loop stopped after an actuator fault.
    pub halted: bool,
    pub pump_on: bool,
    pub light_on: bool,
}

pub struct StatusBoard {
    inner: Mutex<CriticalSectionRawMutex, RefCell<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new(device_id: &str, boot_token: &str, started_at: Timestamp) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(StatusSnapshot {
                state: StateId::Idle,
                state_since: started_at,
                last_cycle_at: None,
                started_at,
                boot_token: tag(boot_token),
                device_id: tag(device_id),
                cycles: 0,
                calibrated: false,
                sensor_degraded: false,
                halted: false,
                pump_on: false,
                light_on: false,
            })),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.lock(|s| s.borrow().clone())
    }

    pub fn update(&self, f: impl FnOnce(&mut StatusSnapshot)) {
        self.inner.lock(|s| f(&mut s.borrow_mut()));
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }
}

/// Copy as much of `s` as fits.
fn tag(s: &str) -> Tag {
    let mut out = Tag::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
