//! DS18B20 waterproof soil temperature probe on a single-drop 1-Wire bus.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::drivers::onewire::{CMD_SKIP_ROM, OneWire, crc8};
use crate::error::SensorError;

const CMD_CONVERT_T: u8 = 0x44;
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

/// 12-bit conversion takes up to 750 ms; poll the busy bit every 10 ms.
const CONVERSION_POLL_MS: u32 = 10;
const CONVERSION_POLLS: u32 = 80;

/// Scratchpad value latched at power-on before any conversion (85.0 °C).
const POWER_ON_RAW: i16 = 0x0550;

const RANGE_CELSIUS: core::ops::RangeInclusive<f32> = -55.0..=125.0;

pub struct Ds18b20<P> {
    bus: OneWire<P>,
}

impl<P: InputPin + OutputPin> Ds18b20<P> {
    pub fn new(pin: P) -> Self {
        Self {
            bus: OneWire::new(pin),
        }
    }

    pub fn read<D: DelayNs>(&mut self, delay: &mut D) -> Result<f32, SensorError> {
        self.bus.reset(delay)?;
        self.bus.write_byte(delay, CMD_SKIP_ROM)?;
        self.bus.write_byte(delay, CMD_CONVERT_T)?;

        let mut done = false;
        for _ in 0..CONVERSION_POLLS {
            delay.delay_ms(CONVERSION_POLL_MS);
            if self.bus.read_bit(delay)? {
                done = true;
                break;
            }
        }
        if !done {
            return Err(SensorError::Timeout);
        }

        self.bus.reset(delay)?;
        self.bus.write_byte(delay, CMD_SKIP_ROM)?;
        self.bus.write_byte(delay, CMD_READ_SCRATCHPAD)?;
        let mut scratchpad = [0u8; 9];
        for byte in &mut scratchpad {
            *byte = self.bus.read_byte(delay)?;
        }
        decode_scratchpad(&scratchpad)
    }
}

/// Validate the scratchpad CRC and convert the temperature register.
pub fn decode_scratchpad(scratchpad: &[u8; 9]) -> Result<f32, SensorError> {
    if crc8(&scratchpad[..8]) != scratchpad[8] {
        return Err(SensorError::ProtocolFault);
    }
    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    if raw == POWER_ON_RAW {
        return Err(SensorError::ProtocolFault);
    }
    let celsius = f32::from(raw) / 16.0;
    if !RANGE_CELSIUS.contains(&celsius) {
        return Err(SensorError::OutOfRange);
    }
    Ok(celsius)
}
