//! Per-cycle acquisition with a per-sensor deadline.
//!
//! Drivers block on their bus, so the deadline is enforced after the fact:
//! a read whose wall time exceeded the budget is reported as
//! [`SensorError::Timeout`] and its value discarded, even if the driver
//! eventually produced one.  The DHT22 channel gets its retry spacing
//! on top of the configured budget.

use log::warn;

use super::{RawValue, SensorKind, air};
use crate::app::ports::{Clock, SensorPort};
use crate::error::SensorError;
use crate::records::Timestamp;

/// One driver result, stamped when the read finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub kind: SensorKind,
    pub result: Result<RawValue, SensorError>,
    pub timestamp: Timestamp,
}

pub struct SensorReader {
    timeout_ms: u32,
}

impl SensorReader {
    pub fn new(timeout_ms: u32) -> Self {
        Self { timeout_ms }
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    /// Read every sensor once, in [`SensorKind::ALL`] order.
    pub fn read_all(&self, port: &mut impl SensorPort, clock: &impl Clock) -> [RawSample; SensorKind::COUNT] {
        SensorKind::ALL.map(|kind| self.read(&mut *port, clock, kind))
    }

    /// Wall-time budget for one read of `kind`.
    pub fn deadline_ms(&self, kind: SensorKind) -> u64 {
        let base = u64::from(self.timeout_ms);
        match kind {
            SensorKind::AirTempHumidity => base + u64::from(air::RETRY_BUDGET_MS),
            _ => base,
        }
    }

    pub fn read(&self, port: &mut impl SensorPort, clock: &impl Clock, kind: SensorKind) -> RawSample {
        let started = clock.now();
        let result = port.read(kind);
        let finished = clock.now();

        let elapsed_ms = finished.millis_since(&started);
        let deadline_ms = self.deadline_ms(kind);
        let result = if elapsed_ms > deadline_ms {
            warn!(
                "{:?}: read took {} ms (deadline {} ms), discarding",
                kind, elapsed_ms, deadline_ms
            );
            Err(SensorError::Timeout)
        } else {
            match result {
                Ok(value) if value.kind() != kind => {
                    warn!("{:?}: driver returned a {:?} value", kind, value.kind());
                    Err(SensorError::ProtocolFault)
                }
                other => other,
            }
        };

        RawSample {
            kind,
            result,
            timestamp: finished,
        }
    }
}
