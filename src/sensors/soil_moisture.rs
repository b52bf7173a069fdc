//! Capacitive soil probe behind an ADS1115 16-bit ADC (AIN0, single-ended).
//!
//! Single-shot conversions at ±4.096 V full scale.  The first conversion
//! after a channel switch settles the input multiplexer and is discarded;
//! the second one is returned.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::i2c_fault;
use crate::error::SensorError;

pub const DEFAULT_ADDRESS: u8 = 0x48;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

/// OS=start, MUX=AIN0/GND, PGA=±4.096 V, MODE=single-shot, DR=128 SPS,
/// comparator disabled.
const CONFIG_SINGLE_AIN0: u16 = 0xC383;
const CONFIG_OS_READY: u16 = 0x8000;

/// Full-scale voltage for PGA gain 1.
pub const FULL_SCALE_VOLTS: f32 = 4.096;

/// 128 SPS ≈ 8 ms per conversion; poll for up to ~40 ms.
const CONVERSION_POLLS: u8 = 20;
const POLL_INTERVAL_MS: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct Ads1115 {
    address: u8,
}

impl Default for Ads1115 {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}

impl Ads1115 {
    pub const fn new(address: u8) -> Self {
        Self { address }
    }

    /// Sensor voltage on AIN0.
    pub fn read_volts<I: I2c, D: DelayNs>(
        &mut self,
        i2c: &mut I,
        delay: &mut D,
    ) -> Result<f32, SensorError> {
        let _settle = self.convert(i2c, delay)?;
        let raw = self.convert(i2c, delay)?;
        raw_to_volts(raw)
    }

    fn convert<I: I2c, D: DelayNs>(&mut self, i2c: &mut I, delay: &mut D) -> Result<i16, SensorError> {
        let [hi, lo] = CONFIG_SINGLE_AIN0.to_be_bytes();
        i2c.write(self.address, &[REG_CONFIG, hi, lo])
            .map_err(i2c_fault)?;

        let mut buf = [0u8; 2];
        for _ in 0..CONVERSION_POLLS {
            delay.delay_ms(POLL_INTERVAL_MS);
            i2c.write_read(self.address, &[REG_CONFIG], &mut buf)
                .map_err(i2c_fault)?;
            if u16::from_be_bytes(buf) & CONFIG_OS_READY != 0 {
                i2c.write_read(self.address, &[REG_CONVERSION], &mut buf)
                    .map_err(i2c_fault)?;
                return Ok(i16::from_be_bytes(buf));
            }
        }
        Err(SensorError::Timeout)
    }
}

/// Convert a signed conversion result to volts.
///
/// Small negative offsets around ground are clamped to 0 V; a clearly
/// negative or saturated result means the probe is miswired.
pub fn raw_to_volts(raw: i16) -> Result<f32, SensorError> {
    if raw == i16::MAX {
        return Err(SensorError::OutOfRange);
    }
    let volts = f32::from(raw) * FULL_SCALE_VOLTS / 32_768.0;
    if volts < -0.05 {
        return Err(SensorError::OutOfRange);
    }
    Ok(volts.max(0.0))
}

/// ADC count behind an accepted voltage, for the cycle log.  Exact for
/// any value [`raw_to_volts`] produced, except clamped ground noise,
/// which maps to 0.
pub fn volts_to_raw(volts: f32) -> i16 {
    (volts * 32_768.0 / FULL_SCALE_VOLTS).round() as i16
}
