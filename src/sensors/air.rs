//! DHT22 / AM2302 air temperature and humidity sensor.
//!
//! Single-wire protocol, bit-banged on an open-drain GPIO:
//!
//! ```text
//!  host:   ‾‾‾\____ ≥1ms ____/‾‾ 30µs ‾‾
//!  sensor:                          \__80µs__/‾‾80µs‾‾\  40 × bit
//!  bit:    \__50µs__/‾‾ 26µs (0) | 70µs (1) ‾‾\
//! ```
//!
//! The 40-bit frame is humidity (16), temperature (16, sign-magnitude)
//! and an 8-bit additive checksum.
//!
//! The sensor drops the odd frame, so a garbled or silent read is retried
//! up to [`READ_ATTEMPTS`] times.  Consecutive attempts are spaced by the
//! datasheet's 2 s minimum sampling interval.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::debug;

use super::pin_fault;
use crate::error::SensorError;

const START_LOW_MS: u32 = 2;
const RELEASE_US: u32 = 30;
const EDGE_TIMEOUT_US: u32 = 100;
/// High pulses longer than this encode a `1`.
const ONE_THRESHOLD_US: u32 = 35;

/// Attempts per [`Dht22::read`], first try included.
pub const READ_ATTEMPTS: u8 = 2;
/// Minimum spacing between two conversions.
pub const MIN_INTERVAL_MS: u32 = 2_000;
/// Worst-case extra wall time the retries add to one read.
pub const RETRY_BUDGET_MS: u32 = (READ_ATTEMPTS as u32 - 1) * MIN_INTERVAL_MS;

const HUMIDITY_RANGE: core::ops::RangeInclusive<f32> = 0.0..=100.0;
const TEMPERATURE_RANGE: core::ops::RangeInclusive<f32> = -40.0..=80.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirReading {
    pub celsius: f32,
    pub humidity: f32,
}

pub struct Dht22<P> {
    pin: P,
}

impl<P: InputPin + OutputPin> Dht22<P> {
    /// `pin` must be configured open-drain with a pull-up.
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Read one frame, retrying line and checksum faults.  An implausible
    /// but well-formed frame is returned as `OutOfRange` straight away.
    pub fn read<D: DelayNs>(&mut self, delay: &mut D) -> Result<AirReading, SensorError> {
        let mut attempt = 1;
        loop {
            let result = self.read_frame(delay).and_then(|frame| decode_frame(&frame));
            match result {
                Err(e @ (SensorError::ProtocolFault | SensorError::Timeout))
                    if attempt < READ_ATTEMPTS =>
                {
                    debug!("DHT22: attempt {} failed ({}), retrying", attempt, e);
                    attempt += 1;
                    delay.delay_ms(MIN_INTERVAL_MS);
                }
                other => return other,
            }
        }
    }

    fn read_frame<D: DelayNs>(&mut self, delay: &mut D) -> Result<[u8; 5], SensorError> {
        self.pin.set_low().map_err(pin_fault)?;
        delay.delay_ms(START_LOW_MS);
        self.pin.set_high().map_err(pin_fault)?;
        delay.delay_us(RELEASE_US);

        // Sensor response: low, high, then low again to start the first bit.
        self.wait_for(false, delay)?;
        self.wait_for(true, delay)?;
        self.wait_for(false, delay)?;

        let mut frame = [0u8; 5];
        for byte in &mut frame {
            for _ in 0..8 {
                self.wait_for(true, delay)?;
                let high_us = self.wait_for(false, delay)?;
                *byte = (*byte << 1) | u8::from(high_us > ONE_THRESHOLD_US);
            }
        }
        Ok(frame)
    }

    /// Busy-wait until the line reaches `high`; returns the wait in µs.
    fn wait_for<D: DelayNs>(&mut self, high: bool, delay: &mut D) -> Result<u32, SensorError> {
        let mut waited = 0;
        while self.pin.is_high().map_err(pin_fault)? != high {
            if waited >= EDGE_TIMEOUT_US {
                return Err(SensorError::Timeout);
            }
            delay.delay_us(1);
            waited += 1;
        }
        Ok(waited)
    }
}

/// Validate and decode a raw 5-byte DHT22 frame.
pub fn decode_frame(frame: &[u8; 5]) -> Result<AirReading, SensorError> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(SensorError::ProtocolFault);
    }

    let humidity = f32::from(u16::from_be_bytes([frame[0], frame[1]])) / 10.0;
    let magnitude = f32::from(u16::from_be_bytes([frame[2] & 0x7F, frame[3]])) / 10.0;
    let celsius = if frame[2] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    };

    if !HUMIDITY_RANGE.contains(&humidity) || !TEMPERATURE_RANGE.contains(&celsius) {
        return Err(SensorError::OutOfRange);
    }
    Ok(AirReading { celsius, humidity })
}
