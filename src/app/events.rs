//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, forward to the
//! status endpoint, etc.

use crate::calibration::CalibrationPoint;
use crate::error::{ActuatorError, CalibrationError, RelayError, SensorError};
use crate::fsm::StateId;
use crate::records::{RecordId, RelayEvent, Timestamp};
use crate::sensors::SensorKind;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries initial state and calibration).
    Started { state: StateId, calibrated: bool },

    /// The watering controller changed state.
    StateChanged {
        from: StateId,
        to: StateId,
        at: Timestamp,
    },

    /// One cycle finished.  `record` is `None` when the journal append
    /// failed.
    CycleCompleted {
        cycle: u64,
        state: StateId,
        soil_percent: Option<f32>,
        stable: bool,
        record: Option<RecordId>,
    },

    /// A sensor read failed this cycle; its previous value was carried
    /// forward.
    SensorFault { kind: SensorKind, error: SensorError },

    /// Soil readings have been unstable past the grace period.
    SensorDegraded { unstable_cycles: u32 },

    /// Soil readings are trustworthy again.
    SensorRecovered,

    /// Watering is disabled until the soil probe is calibrated.
    CalibrationRequired(CalibrationError),

    CalibrationUpdated(CalibrationPoint),

    /// A relay command was executed (automatic path).
    RelayChanged(RelayEvent),

    /// A relay command was refused without a state change.
    RelayRejected(RelayError),

    /// Relay writes failed after every retry; the loop halts.
    ActuatorFault(ActuatorError),

    /// The loop exited and every relay was forced off.
    Stopped,
}
