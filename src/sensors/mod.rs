//! Sensor subsystem: reading types, protocol drivers and the aggregating
//! [`SensorHub`].
//!
//! | Kind              | Device  | Bus              | Raw value          |
//! |-------------------|---------|------------------|--------------------|
//! | `SoilMoisture`    | ADS1115 | I²C (0x48)       | probe volts        |
//! | `AirTempHumidity` | DHT22   | single-wire GPIO | °C + %RH           |
//! | `SoilTemp`        | DS18B20 | 1-Wire GPIO      | °C                 |
//! | `Light`           | BH1750  | I²C (0x23)       | lux                |
//!
//! Drivers only speak `embedded-hal` traits, so the same code runs against
//! `esp-idf-hal` peripherals on the board and against scripted mocks on
//! the host.

pub mod air;
pub mod light;
pub mod reader;
pub mod soil_moisture;
pub mod soil_temp;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::{ErrorKind, I2c};
use serde::{Deserialize, Serialize};

use crate::error::SensorError;
use crate::records::Timestamp;
use air::Dht22;
use light::Bh1750;
use soil_moisture::Ads1115;
use soil_temp::Ds18b20;

// ───────────────────────────────────────────────────────────────
// Reading types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SensorKind {
    SoilMoisture = 0,
    AirTempHumidity = 1,
    SoilTemp = 2,
    Light = 3,
}

impl SensorKind {
    pub const COUNT: usize = 4;
    /// Fixed acquisition order used by every cycle.
    pub const ALL: [SensorKind; Self::COUNT] = [
        Self::SoilMoisture,
        Self::AirTempHumidity,
        Self::SoilTemp,
        Self::Light,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::SoilMoisture => "soil_moisture",
            Self::AirTempHumidity => "air",
            Self::SoilTemp => "soil_temp",
            Self::Light => "light",
        }
    }
}

/// Driver output in the sensor's native engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Volts(f32),
    TempHumidity { celsius: f32, humidity: f32 },
    Celsius(f32),
    Lux(f32),
}

impl RawValue {
    pub const fn kind(&self) -> SensorKind {
        match self {
            Self::Volts(_) => SensorKind::SoilMoisture,
            Self::TempHumidity { .. } => SensorKind::AirTempHumidity,
            Self::Celsius(_) => SensorKind::SoilTemp,
            Self::Lux(_) => SensorKind::Light,
        }
    }

    /// The headline number of the reading (air temperature for DHT22).
    pub const fn primary(&self) -> f32 {
        match *self {
            Self::Volts(v) | Self::Celsius(v) | Self::Lux(v) => v,
            Self::TempHumidity { celsius, .. } => celsius,
        }
    }
}

/// One sensor's contribution to a cycle.  Built once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub kind: SensorKind,
    /// Accepted raw value: this cycle's sample, or the carried-forward one.
    pub raw_value: Option<RawValue>,
    /// Moisture percent for the soil probe, primary value for the others.
    pub derived_value: Option<f32>,
    pub stable: bool,
    pub timestamp: Timestamp,
}

// ───────────────────────────────────────────────────────────────
// Bus error mapping
// ───────────────────────────────────────────────────────────────

/// A NACK means nobody answered; anything else is a wire-level fault.
pub(crate) fn i2c_fault<E: embedded_hal::i2c::Error>(e: E) -> SensorError {
    match e.kind() {
        ErrorKind::NoAcknowledge(_) => SensorError::Timeout,
        _ => SensorError::ProtocolFault,
    }
}

pub(crate) fn pin_fault<E>(_: E) -> SensorError {
    SensorError::ProtocolFault
}

// ───────────────────────────────────────────────────────────────
// SensorHub
// ───────────────────────────────────────────────────────────────

/// Owns the shared I²C bus, both bit-banged data pins and the delay
/// provider, and hands them to the right driver per read.
pub struct SensorHub<I, DP, OP, D> {
    i2c: I,
    delay: D,
    soil: Ads1115,
    air: Dht22<DP>,
    soil_temp: Ds18b20<OP>,
    light: Bh1750,
}

impl<I, DP, OP, D> SensorHub<I, DP, OP, D>
where
    I: I2c,
    DP: InputPin + OutputPin,
    OP: InputPin + OutputPin,
    D: DelayNs,
{
    /// Construct a new hub.  Pass in pre-built drivers (built in main
    /// where peripheral ownership is established).
    pub fn new(i2c: I, delay: D, air: Dht22<DP>, soil_temp: Ds18b20<OP>) -> Self {
        Self {
            i2c,
            delay,
            soil: Ads1115::default(),
            air,
            soil_temp,
            light: Bh1750::default(),
        }
    }

    pub fn read_soil_moisture(&mut self) -> Result<RawValue, SensorError> {
        self.soil
            .read_volts(&mut self.i2c, &mut self.delay)
            .map(RawValue::Volts)
    }

    pub fn read_air(&mut self) -> Result<RawValue, SensorError> {
        let r = self.air.read(&mut self.delay)?;
        Ok(RawValue::TempHumidity {
            celsius: r.celsius,
            humidity: r.humidity,
        })
    }

    pub fn read_soil_temp(&mut self) -> Result<RawValue, SensorError> {
        self.soil_temp.read(&mut self.delay).map(RawValue::Celsius)
    }

    pub fn read_light(&mut self) -> Result<RawValue, SensorError> {
        self.light
            .read_lux(&mut self.i2c, &mut self.delay)
            .map(RawValue::Lux)
    }
}

// ───────────────────────────────────────────────────────────────
// Test doubles shared by the driver unit tests
// ───────────────────────────────────────────────────────────────
