//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (sensors, relays, journal, storage, clock) implement
//! these traits.  The [`AppService`](super::service::AppService) consumes
//! them via generics, so the domain core never touches hardware directly.
//!
//! Ports that are shared between the control loop and the manual-control
//! surface (journal, calibration/config store, clock) take `&self`;
//! implementations provide their own interior locking.

use crate::calibration::CalibrationPoint;
use crate::config::SystemConfig;
use crate::error::{ActuatorError, JournalError, SensorError};
use crate::records::{
    Entry, EventId, IdSelection, LogRecord, RecordId, RelayEvent, RelayId, Timestamp,
};
use crate::sensors::{RawValue, SensorKind};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: one blocking read per sensor kind.
///
/// Transient faults are returned, never panicked on.
pub trait SensorPort {
    fn read_soil_moisture(&mut self) -> Result<RawValue, SensorError>;

    fn read_air(&mut self) -> Result<RawValue, SensorError>;

    fn read_soil_temp(&mut self) -> Result<RawValue, SensorError>;

    fn read_light(&mut self) -> Result<RawValue, SensorError>;

    fn read(&mut self, kind: SensorKind) -> Result<RawValue, SensorError> {
        match kind {
            SensorKind::SoilMoisture => self.read_soil_moisture(),
            SensorKind::AirTempHumidity => self.read_air(),
            SensorKind::SoilTemp => self.read_soil_temp(),
            SensorKind::Light => self.read_light(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port.  Only [`RelayManager`](crate::control::relay_manager::RelayManager)
/// ever holds one.
pub trait ActuatorPort {
    /// Drive a relay coil.  `on` is the logical state; polarity is the
    /// adapter's concern.
    fn set_relay(&mut self, relay: RelayId, on: bool) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Record journal (driven adapter: domain → append-only history)
// ───────────────────────────────────────────────────────────────

/// Append-only history of cycle records and relay events.
///
/// Ids are assigned at insertion, strictly increase and are never reused,
/// including across restarts and after a delete-all.
pub trait RecordJournal {
    fn append_log_record(&self, record: &LogRecord) -> Result<RecordId, JournalError>;

    fn append_relay_event(&self, event: &RelayEvent) -> Result<EventId, JournalError>;

    /// Stored cycle records, oldest first.
    fn log_records(&self) -> Result<Vec<Entry<LogRecord>>, JournalError>;

    /// Stored relay events, oldest first.
    fn relay_events(&self) -> Result<Vec<Entry<RelayEvent>>, JournalError>;

    /// Administrative delete.  Returns the number of entries removed.
    fn delete_log_records(&self, ids: &IdSelection) -> Result<usize, JournalError>;

    fn delete_relay_events(&self, ids: &IdSelection) -> Result<usize, JournalError>;

    fn delete_all_log_records(&self) -> Result<usize, JournalError> {
        self.delete_log_records(&IdSelection::All)
    }

    fn delete_all_relay_events(&self) -> Result<usize, JournalError> {
        self.delete_relay_events(&IdSelection::All)
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration & calibration ports (domain ↔ persistent store)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Persists the active soil-probe calibration.
pub trait CalibrationPort {
    /// `Ok(None)` when the probe was never calibrated.
    fn load_calibration(&self) -> Result<Option<CalibrationPoint>, ConfigError>;

    fn save_calibration(&self, point: &CalibrationPoint) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for NVS-backed blobs.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic, with no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively; in-memory simulation
///   achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Clock & heartbeat
// ───────────────────────────────────────────────────────────────

pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Liveness signal fed between cycles (task watchdog on the board).
pub trait Heartbeat {
    fn feed(&self);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] / [`CalibrationPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}

impl core::error::Error for StorageError {}
