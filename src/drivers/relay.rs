//! Relay coil driver.
//!
//! The relay module on the board is active-LOW: pulling the input low
//! energises the coil.  Every write is read back from the output latch;
//! a latch that disagrees with the commanded level is reported as
//! [`ActuatorError::ReadbackMismatch`] so the caller can retry.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: `P` is an `esp-idf-hal` `PinDriver` in output mode.
//! On host/test: any `embedded-hal` stateful output pin (mocks included).

use embedded_hal::digital::StatefulOutputPin;

use crate::error::ActuatorError;
use crate::records::RelayId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

pub struct Relay<P> {
    pin: P,
    polarity: Polarity,
}

impl<P: StatefulOutputPin> Relay<P> {
    /// Wrap `pin` and drive it to the de-energised level immediately.
    pub fn new(mut pin: P, polarity: Polarity) -> Result<Self, ActuatorError> {
        drive(&mut pin, polarity, false)?;
        Ok(Self { pin, polarity })
    }

    pub fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        drive(&mut self.pin, self.polarity, on)?;
        let latched = self
            .pin
            .is_set_high()
            .map_err(|_| ActuatorError::GpioWriteFailed)?;
        if latched == level(self.polarity, on) {
            Ok(())
        } else {
            Err(ActuatorError::ReadbackMismatch)
        }
    }

    /// Logical state as read from the output latch.
    pub fn is_on(&mut self) -> Result<bool, ActuatorError> {
        let high = self
            .pin
            .is_set_high()
            .map_err(|_| ActuatorError::GpioWriteFailed)?;
        Ok(high == level(self.polarity, true))
    }
}

const fn level(polarity: Polarity, on: bool) -> bool {
    match polarity {
        Polarity::ActiveHigh => on,
        Polarity::ActiveLow => !on,
    }
}

fn drive<P: StatefulOutputPin>(pin: &mut P, polarity: Polarity, on: bool) -> Result<(), ActuatorError> {
    let res = if level(polarity, on) {
        pin.set_high()
    } else {
        pin.set_low()
    };
    res.map_err(|_| ActuatorError::GpioWriteFailed)
}

/// The two relay channels of the board.
pub struct RelayBoard<PP, LP> {
    pump: Relay<PP>,
    light: Relay<LP>,
}

impl<PP: StatefulOutputPin, LP: StatefulOutputPin> RelayBoard<PP, LP> {
    pub fn new(pump: Relay<PP>, light: Relay<LP>) -> Self {
        Self { pump, light }
    }

    pub fn set(&mut self, relay: RelayId, on: bool) -> Result<(), ActuatorError> {
        match relay {
            RelayId::Pump => self.pump.set(on),
            RelayId::Light => self.light.set(on),
        }
    }
}
