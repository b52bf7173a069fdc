//! Unified error types for the SoilGuard firmware.
//!
//! Every subsystem has its own small `Copy` enum; all of them convert into
//! the top-level [`Error`] so the cycle orchestrator can handle failures
//! uniformly.  Sensor and calibration errors are recovered inside a cycle,
//! relay errors are reported to the caller, and an actuator fault that
//! survives its retries halts the automatic loop.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};
use crate::records::RelayId;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned implausible data.
    Sensor(SensorError),
    /// The soil channel cannot be converted to a moisture percentage.
    Calibration(CalibrationError),
    /// A relay command was rejected or failed.
    Relay(RelayError),
    /// The record journal could not be read or written.
    Journal(JournalError),
    /// Configuration is invalid or could not be persisted.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// The automatic loop was halted by an earlier actuator fault.
    Halted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Calibration(e) => write!(f, "calibration: {e}"),
            Self::Relay(e) => write!(f, "relay: {e}"),
            Self::Journal(e) => write!(f, "journal: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Halted => write!(f, "control loop halted"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Transient failures reported by a sensor driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The device did not answer, or answered after the read deadline.
    Timeout,
    /// Checksum, CRC or framing mismatch on the wire.
    ProtocolFault,
    /// The decoded value is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "read timed out"),
            Self::ProtocolFault => write!(f, "checksum or protocol fault"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl core::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Calibration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// No complete dry/wet reference pair is active.
    Uncalibrated,
    /// There is no raw soil value to convert.
    MissingReading,
    /// The dry and wet references coincide (or are not finite).
    InvalidCalibration,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uncalibrated => write!(f, "soil probe not calibrated"),
            Self::MissingReading => write!(f, "no soil reading available"),
            Self::InvalidCalibration => write!(f, "dry and wet references must differ"),
        }
    }
}

impl core::error::Error for CalibrationError {}

impl From<CalibrationError> for Error {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

/// A single physical relay write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
    /// The pin level read back differs from the level just written.
    ReadbackMismatch,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::ReadbackMismatch => write!(f, "GPIO readback mismatch"),
        }
    }
}

impl core::error::Error for ActuatorError {}

// ---------------------------------------------------------------------------
// Relay errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// Switching `requested` on would violate an interlock with `conflicting`.
    InterlockViolation {
        requested: RelayId,
        conflicting: RelayId,
    },
    /// The driver kept failing after every retry.  Fatal for the automatic loop.
    ActuatorFault(ActuatorError),
    /// Manual toggles arrive faster than the relay is allowed to switch.
    RateLimited,
    /// The physical state changed but the audit event could not be stored.
    Journal(JournalError),
    /// The control loop has shut down; relays stay off until reboot.
    Stopped,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterlockViolation {
                requested,
                conflicting,
            } => write!(f, "interlock: {requested:?} conflicts with {conflicting:?}"),
            Self::ActuatorFault(e) => write!(f, "actuator fault: {e}"),
            Self::RateLimited => write!(f, "manual toggle rate limited"),
            Self::Journal(e) => write!(f, "audit append failed: {e}"),
            Self::Stopped => write!(f, "control stopped, relays locked off"),
        }
    }
}

impl core::error::Error for RelayError {}

impl From<RelayError> for Error {
    fn from(e: RelayError) -> Self {
        Self::Relay(e)
    }
}

impl From<ActuatorError> for RelayError {
    fn from(e: ActuatorError) -> Self {
        Self::ActuatorFault(e)
    }
}

// ---------------------------------------------------------------------------
// Journal errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalError {
    /// The backing key/value store failed.
    Storage(StorageError),
    /// A record could not be serialised.
    Encode,
    /// A stored slot could not be decoded.
    Corrupted,
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Encode => write!(f, "record encoding failed"),
            Self::Corrupted => write!(f, "stored record corrupted"),
        }
    }
}

impl core::error::Error for JournalError {}

impl From<StorageError> for JournalError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<JournalError> for Error {
    fn from(e: JournalError) -> Self {
        Self::Journal(e)
    }
}

impl From<JournalError> for RelayError {
    fn from(e: JournalError) -> Self {
        Self::Journal(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
