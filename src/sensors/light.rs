//! BH1750 ambient light sensor (I²C, continuous high-resolution mode).

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::i2c_fault;
use crate::error::SensorError;

/// ADDR pin low.
pub const DEFAULT_ADDRESS: u8 = 0x23;

const CMD_POWER_ON: u8 = 0x01;
const CMD_CONTINUOUS_HIGH_RES: u8 = 0x10;
/// Worst-case first measurement in H-resolution mode.
const FIRST_MEASUREMENT_MS: u32 = 180;

#[derive(Debug, Clone, Copy)]
pub struct Bh1750 {
    address: u8,
    measuring: bool,
}

impl Default for Bh1750 {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}

impl Bh1750 {
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            measuring: false,
        }
    }

    /// Current illuminance.  The first call (and the first call after a
    /// bus error) powers the sensor up and waits for a measurement.
    pub fn read_lux<I: I2c, D: DelayNs>(&mut self, i2c: &mut I, delay: &mut D) -> Result<f32, SensorError> {
        if !self.measuring {
            i2c.write(self.address, &[CMD_POWER_ON]).map_err(i2c_fault)?;
            i2c.write(self.address, &[CMD_CONTINUOUS_HIGH_RES])
                .map_err(i2c_fault)?;
            delay.delay_ms(FIRST_MEASUREMENT_MS);
            self.measuring = true;
        }

        let mut buf = [0u8; 2];
        if let Err(e) = i2c.read(self.address, &mut buf) {
            self.measuring = false;
            return Err(i2c_fault(e));
        }
        Ok(raw_to_lux(u16::from_be_bytes(buf)))
    }
}

/// Counts to lux at the default measurement time (MTreg = 69).
pub fn raw_to_lux(raw: u16) -> f32 {
    f32::from(raw) / 1.2
}
