//! Reading stabilisation: carry-forward on failure, flag-but-accept on a
//! large jump.

use log::debug;

use crate::config::StabilityTolerances;
use crate::error::SensorError;
use crate::sensors::{RawValue, SensorKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// The value to record: the new sample, or the carried-forward one.
    pub accepted: Option<RawValue>,
    pub stable: bool,
}

pub struct StabilityFilter {
    tolerances: StabilityTolerances,
    previous: [Option<RawValue>; SensorKind::COUNT],
    unstable_streak: [u32; SensorKind::COUNT],
}

impl StabilityFilter {
    pub fn new(tolerances: StabilityTolerances) -> Self {
        Self {
            tolerances,
            previous: [None; SensorKind::COUNT],
            unstable_streak: [0; SensorKind::COUNT],
        }
    }

    pub fn set_tolerances(&mut self, tolerances: StabilityTolerances) {
        self.tolerances = tolerances;
    }

    /// Pure policy, no state touched.
    pub fn evaluate(
        &self,
        kind: SensorKind,
        new: &Result<RawValue, SensorError>,
        previous: Option<RawValue>,
    ) -> Evaluation {
        let value = match new {
            Ok(v) => *v,
            Err(_) => {
                return Evaluation {
                    accepted: previous,
                    stable: false,
                };
            }
        };

        let stable = match previous {
            None => true,
            Some(prev) => !self.exceeds_tolerance(kind, &prev, &value),
        };

        Evaluation {
            accepted: Some(value),
            stable,
        }
    }

    /// Evaluate against the remembered accepted value, then remember the
    /// outcome.
    pub fn observe(&mut self, kind: SensorKind, new: Result<RawValue, SensorError>) -> Evaluation {
        let idx = kind.index();
        let eval = self.evaluate(kind, &new, self.previous[idx]);

        self.previous[idx] = eval.accepted;
        if eval.stable {
            self.unstable_streak[idx] = 0;
        } else {
            self.unstable_streak[idx] = self.unstable_streak[idx].saturating_add(1);
            debug!(
                "{:?}: unstable ({} consecutive), accepted {:?}",
                kind, self.unstable_streak[idx], eval.accepted
            );
        }
        eval
    }

    pub fn previous(&self, kind: SensorKind) -> Option<RawValue> {
        self.previous[kind.index()]
    }

    /// Consecutive unstable evaluations for `kind`, including the latest.
    pub fn unstable_streak(&self, kind: SensorKind) -> u32 {
        self.unstable_streak[kind.index()]
    }

    fn exceeds_tolerance(&self, kind: SensorKind, prev: &RawValue, new: &RawValue) -> bool {
        let t = &self.tolerances;
        match (prev, new) {
            (RawValue::Volts(a), RawValue::Volts(b)) => (a - b).abs() > t.soil_volts,
            (
                RawValue::TempHumidity {
                    celsius: c0,
                    humidity: h0,
                },
                RawValue::TempHumidity {
                    celsius: c1,
                    humidity: h1,
                },
            ) => (c0 - c1).abs() > t.air_celsius || (h0 - h1).abs() > t.air_humidity,
            (RawValue::Celsius(a), RawValue::Celsius(b)) => (a - b).abs() > t.soil_celsius,
            (RawValue::Lux(a), RawValue::Lux(b)) => (a - b).abs() > t.lux,
            _ => {
                debug!("{:?}: value kind changed, treating as unstable", kind);
                true
            }
        }
    }
}
