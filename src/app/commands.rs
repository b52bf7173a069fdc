//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (status
//! endpoint, serial console, provisioning) that the
//! [`AppService`](super::service::AppService) applies between cycles.
//! They arrive through [`CONTROL_CHANNEL`], which the loop drains at the
//! start of every cycle.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::calibration::ReferencePoint;
use crate::config::SystemConfig;

#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Capture the latest accepted soil value as a reference point.
    Calibrate(ReferencePoint),

    /// Hot-reload configuration.  Persisted on the next auto-save.
    UpdateConfig(SystemConfig),

    /// Persist the current config immediately.
    SaveConfig,

    /// Stop after the current cycle and force every relay off.
    Shutdown,
}

/// Channel depth for inbound commands.
const COMMAND_DEPTH: usize = 8;

pub type CommandChannel = Channel<CriticalSectionRawMutex, AppCommand, COMMAND_DEPTH>;

/// Inbound command channel: external boundary → control loop.
pub static CONTROL_CHANNEL: CommandChannel = Channel::new();

/// Cooperative stop flag, checked by the loop between cycles only.
pub struct ShutdownSignal {
    requested: AtomicBool,
}

impl ShutdownSignal {
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
        }
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
