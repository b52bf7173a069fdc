//! Audit-trail records: per-cycle sensor logs and relay actuation events.
//!
//! Both record kinds are append-only.  Ids are assigned by the journal at
//! insertion time and never reused, so an operator can delete by id
//! (`"1,3,5-10"`) without disturbing later inserts.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::fsm::StateId;
use crate::sensors::{RawValue, SensorKind, SensorReading, soil_moisture};

// ───────────────────────────────────────────────────────────────
// Time
// ───────────────────────────────────────────────────────────────

/// Point in time attached to every reading and record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    /// Monotonic milliseconds since boot.
    pub uptime_ms: u64,
    /// Wall-clock seconds since the Unix epoch, once the clock is synced.
    pub unix_secs: Option<u64>,
}

impl Timestamp {
    pub const fn from_uptime_ms(uptime_ms: u64) -> Self {
        Self {
            uptime_ms,
            unix_secs: None,
        }
    }

    /// Milliseconds elapsed since `earlier` (saturating).
    pub fn millis_since(&self, earlier: &Timestamp) -> u64 {
        self.uptime_ms.saturating_sub(earlier.uptime_ms)
    }
}

// ───────────────────────────────────────────────────────────────
// Relay events
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RelayId {
    Pump = 0,
    Light = 1,
}

impl RelayId {
    pub const COUNT: usize = 2;
    pub const ALL: [RelayId; Self::COUNT] = [Self::Pump, Self::Light];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Pump => "pump",
            Self::Light => "light",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayAction {
    On,
    Off,
}

impl RelayAction {
    pub const fn from_on(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

/// Who asked for the toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelaySource {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEvent {
    pub relay_id: RelayId,
    pub action: RelayAction,
    pub source: RelaySource,
    pub timestamp: Timestamp,
}

// ───────────────────────────────────────────────────────────────
// Cycle log records
// ───────────────────────────────────────────────────────────────

/// One row per control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: Timestamp,
    pub air_celsius: Option<f32>,
    pub air_humidity: Option<f32>,
    pub soil_celsius: Option<f32>,
    pub soil_volts: Option<f32>,
    /// ADS1115 count behind `soil_volts`.
    pub soil_raw: Option<i16>,
    pub soil_percent: Option<f32>,
    pub lux: Option<f32>,
    pub state: StateId,
    /// False if any constituent reading was unstable.
    pub stable: bool,
}

impl LogRecord {
    pub fn from_readings(readings: &[SensorReading], state: StateId, timestamp: Timestamp) -> Self {
        let mut record = Self {
            timestamp,
            air_celsius: None,
            air_humidity: None,
            soil_celsius: None,
            soil_volts: None,
            soil_raw: None,
            soil_percent: None,
            lux: None,
            state,
            stable: readings.iter().all(|r| r.stable),
        };

        for reading in readings {
            match (reading.kind, reading.raw_value) {
                (SensorKind::SoilMoisture, Some(RawValue::Volts(v))) => {
                    record.soil_volts = Some(v);
                    record.soil_raw = Some(soil_moisture::volts_to_raw(v));
                    record.soil_percent = reading.derived_value;
                }
                (SensorKind::AirTempHumidity, Some(RawValue::TempHumidity { celsius, humidity })) => {
                    record.air_celsius = Some(celsius);
                    record.air_humidity = Some(humidity);
                }
                (SensorKind::SoilTemp, Some(RawValue::Celsius(c))) => record.soil_celsius = Some(c),
                (SensorKind::Light, Some(RawValue::Lux(lx))) => record.lux = Some(lx),
                _ => {}
            }
        }
        record
    }
}

// ───────────────────────────────────────────────────────────────
// Stored entries
// ───────────────────────────────────────────────────────────────

pub type RecordId = u64;
pub type EventId = u64;

/// A record as returned from the journal, tagged with its insertion id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<T> {
    pub id: u64,
    pub item: T,
}

// ───────────────────────────────────────────────────────────────
// Id selection ("1,3,5-10")
// ───────────────────────────────────────────────────────────────

/// Inclusive id range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    pub first: u64,
    pub last: u64,
}

/// Which stored entries an administrative delete applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSelection {
    All,
    Ranges(Vec<IdRange>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSelectionError {
    Empty,
    InvalidId,
    ReversedRange,
}

impl fmt::Display for IdSelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty id selection"),
            Self::InvalidId => write!(f, "id is not a positive integer"),
            Self::ReversedRange => write!(f, "range end precedes its start"),
        }
    }
}

impl IdSelection {
    /// Parse `"all"` or a comma-separated list of ids and `a-b` ranges.
    /// Whitespace around tokens is ignored; empty tokens are skipped.
    pub fn parse(input: &str) -> Result<Self, IdSelectionError> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let mut ranges = Vec::new();
        for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let range = match token.split_once('-') {
                Some((a, b)) => {
                    let first = parse_id(a)?;
                    let last = parse_id(b)?;
                    if last < first {
                        return Err(IdSelectionError::ReversedRange);
                    }
                    IdRange { first, last }
                }
                None => {
                    let id = parse_id(token)?;
                    IdRange { first: id, last: id }
                }
            };
            ranges.push(range);
        }

        if ranges.is_empty() {
            return Err(IdSelectionError::Empty);
        }
        Ok(Self::Ranges(ranges))
    }

    pub fn contains(&self, id: u64) -> bool {
        match self {
            Self::All => true,
            Self::Ranges(ranges) => ranges.iter().any(|r| (r.first..=r.last).contains(&id)),
        }
    }
}

fn parse_id(s: &str) -> Result<u64, IdSelectionError> {
    s.trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(IdSelectionError::InvalidId)
}
