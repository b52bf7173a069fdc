//! Bit-banged Dallas/Maxim 1-Wire master.
//!
//! Standard-speed slot timings on an open-drain GPIO with an external
//! 4.7 kΩ pull-up.  Only the single-drop subset is implemented: reset
//! with presence detect, byte write/read and the CRC-8 used by ROM codes
//! and scratchpads.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::SensorError;
use crate::sensors::pin_fault;

pub const CMD_SKIP_ROM: u8 = 0xCC;

// Standard-speed timings (µs).
const RESET_LOW_US: u32 = 480;
const PRESENCE_SAMPLE_US: u32 = 70;
const RESET_RECOVERY_US: u32 = 410;
const SLOT_START_US: u32 = 6;
const WRITE_ZERO_LOW_US: u32 = 60;
const WRITE_ONE_RECOVERY_US: u32 = 64;
const WRITE_ZERO_RECOVERY_US: u32 = 10;
const READ_SAMPLE_US: u32 = 9;
const READ_RECOVERY_US: u32 = 55;

pub struct OneWire<P> {
    pin: P,
}

impl<P: InputPin + OutputPin> OneWire<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Issue a reset pulse.  A missing presence pulse means no device
    /// answered on the bus.
    pub fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), SensorError> {
        self.pin.set_low().map_err(pin_fault)?;
        delay.delay_us(RESET_LOW_US);
        self.pin.set_high().map_err(pin_fault)?;
        delay.delay_us(PRESENCE_SAMPLE_US);
        let present = self.pin.is_low().map_err(pin_fault)?;
        delay.delay_us(RESET_RECOVERY_US);
        if present {
            Ok(())
        } else {
            Err(SensorError::ProtocolFault)
        }
    }

    pub fn write_byte<D: DelayNs>(&mut self, delay: &mut D, byte: u8) -> Result<(), SensorError> {
        for bit in 0..8 {
            self.write_bit(delay, byte & (1 << bit) != 0)?;
        }
        Ok(())
    }

    pub fn read_byte<D: DelayNs>(&mut self, delay: &mut D) -> Result<u8, SensorError> {
        let mut byte = 0u8;
        for bit in 0..8 {
            if self.read_bit(delay)? {
                byte |= 1 << bit;
            }
        }
        Ok(byte)
    }

    pub fn read_bit<D: DelayNs>(&mut self, delay: &mut D) -> Result<bool, SensorError> {
        self.pin.set_low().map_err(pin_fault)?;
        delay.delay_us(SLOT_START_US);
        self.pin.set_high().map_err(pin_fault)?;
        delay.delay_us(READ_SAMPLE_US);
        let high = self.pin.is_high().map_err(pin_fault)?;
        delay.delay_us(READ_RECOVERY_US);
        Ok(high)
    }

    fn write_bit<D: DelayNs>(&mut self, delay: &mut D, one: bool) -> Result<(), SensorError> {
        self.pin.set_low().map_err(pin_fault)?;
        if one {
            delay.delay_us(SLOT_START_US);
            self.pin.set_high().map_err(pin_fault)?;
            delay.delay_us(WRITE_ONE_RECOVERY_US);
        } else {
            delay.delay_us(WRITE_ZERO_LOW_US);
            self.pin.set_high().map_err(pin_fault)?;
            delay.delay_us(WRITE_ZERO_RECOVERY_US);
        }
        Ok(())
    }
}

/// Dallas/Maxim CRC-8 (polynomial x⁸ + x⁵ + x⁴ + 1, LSB first).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}
