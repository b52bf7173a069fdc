//! Soil-probe calibration: dry/wet reference points and raw → percent.
//!
//! ```text
//!   percent = clamp(100 · (dry − raw) / (dry − wet), 0, 100)
//! ```
//!
//! The wet reference is always 100 %, so the same formula serves probes
//! whose output falls with moisture (capacitive, the usual case) and
//! probes whose output rises.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::CalibrationPort;
use crate::error::{CalibrationError, Error};
use crate::sensors::{RawValue, SensorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferencePoint {
    Dry,
    Wet,
}

/// A validated dry/wet pair for one analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub channel: SensorKind,
    pub dry_raw: f32,
    pub wet_raw: f32,
}

impl CalibrationPoint {
    pub fn new(dry_raw: f32, wet_raw: f32) -> Result<Self, CalibrationError> {
        let point = Self {
            channel: SensorKind::SoilMoisture,
            dry_raw,
            wet_raw,
        };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.channel != SensorKind::SoilMoisture
            || !self.dry_raw.is_finite()
            || !self.wet_raw.is_finite()
            || self.dry_raw == self.wet_raw
        {
            return Err(CalibrationError::InvalidCalibration);
        }
        Ok(())
    }

    pub fn percent(&self, raw: f32) -> Result<f32, CalibrationError> {
        if !raw.is_finite() {
            return Err(CalibrationError::MissingReading);
        }
        let span = self.dry_raw - self.wet_raw;
        Ok((100.0 * (self.dry_raw - raw) / span).clamp(0.0, 100.0))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    active: Option<CalibrationPoint>,
    pending_dry: Option<f32>,
    pending_wet: Option<f32>,
}

impl CalibrationStore {
    /// An uncalibrated store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calibration(point: CalibrationPoint) -> Result<Self, CalibrationError> {
        point.validate()?;
        Ok(Self {
            active: Some(point),
            ..Self::default()
        })
    }

    /// Load the persisted pair.  A missing, unreadable or invalid pair
    /// leaves the store uncalibrated.
    pub fn load(port: &impl CalibrationPort) -> Self {
        match port.load_calibration() {
            Ok(Some(point)) => match Self::with_calibration(point) {
                Ok(store) => {
                    info!(
                        "Calibration loaded: dry={:.3} wet={:.3}",
                        point.dry_raw, point.wet_raw
                    );
                    store
                }
                Err(e) => {
                    warn!("Stored calibration rejected ({e}), starting uncalibrated");
                    Self::new()
                }
            },
            Ok(None) => {
                warn!("No calibration stored, soil watering disabled until calibrated");
                Self::new()
            }
            Err(e) => {
                warn!("Calibration load failed ({e}), starting uncalibrated");
                Self::new()
            }
        }
    }

    pub fn active(&self) -> Option<&CalibrationPoint> {
        self.active.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.active.is_some()
    }

    pub fn convert(&self, raw: f32) -> Result<f32, CalibrationError> {
        self.active
            .as_ref()
            .ok_or(CalibrationError::Uncalibrated)?
            .percent(raw)
    }

    /// Convert the accepted soil value of a cycle.
    pub fn convert_reading(&self, raw: Option<RawValue>) -> Result<f32, CalibrationError> {
        match raw {
            Some(RawValue::Volts(v)) => self.convert(v),
            _ => Err(CalibrationError::MissingReading),
        }
    }

    /// Record one reference reading.
    ///
    /// The other reference comes from a pending capture or, failing that,
    /// from the active pair.  Returns `Ok(None)` while the second point is
    /// still missing and `Ok(Some(pair))` once a new pair is persisted and
    /// active.  An invalid pair discards the reading just submitted; a
    /// failed save keeps both pending so the operator can retry.
    pub fn calibrate(
        &mut self,
        point: ReferencePoint,
        raw: f32,
        port: &impl CalibrationPort,
    ) -> Result<Option<CalibrationPoint>, Error> {
        if !raw.is_finite() {
            return Err(CalibrationError::MissingReading.into());
        }

        let (dry, wet) = match point {
            ReferencePoint::Dry => (
                Some(raw),
                self.pending_wet.or(self.active.map(|a| a.wet_raw)),
            ),
            ReferencePoint::Wet => (
                self.pending_dry.or(self.active.map(|a| a.dry_raw)),
                Some(raw),
            ),
        };

        let (Some(dry_raw), Some(wet_raw)) = (dry, wet) else {
            info!("Calibration: {:?} captured at {:.3}, awaiting the other point", point, raw);
            self.set_pending(point, Some(raw));
            return Ok(None);
        };

        let candidate = match CalibrationPoint::new(dry_raw, wet_raw) {
            Ok(c) => c,
            Err(e) => {
                warn!("Calibration: dry == wet ({:.3}), {:?} point discarded", raw, point);
                self.set_pending(point, None);
                return Err(e.into());
            }
        };

        if let Err(e) = port.save_calibration(&candidate) {
            warn!("Calibration: save failed ({e}), previous calibration kept");
            self.set_pending(point, Some(raw));
            return Err(e.into());
        }

        info!(
            "Calibration updated: dry={:.3} wet={:.3}",
            candidate.dry_raw, candidate.wet_raw
        );
        self.active = Some(candidate);
        self.pending_dry = None;
        self.pending_wet = None;
        Ok(Some(candidate))
    }

    fn set_pending(&mut self, point: ReferencePoint, raw: Option<f32>) {
        match point {
            ReferencePoint::Dry => self.pending_dry = raw,
            ReferencePoint::Wet => self.pending_wet = raw,
        }
    }
}
