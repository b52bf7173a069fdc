//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! [`SensorHub`] is exposed through [`SensorPort`] and [`RelayBoard`]
//! through [`ActuatorPort`].  These are the only places in the system
//! that touch actual hardware; both sides are generic over
//! `embedded-hal` traits, so host tests drive them with mocks.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, StatefulOutputPin};
use embedded_hal::i2c::I2c;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::drivers::relay::RelayBoard;
use crate::error::{ActuatorError, SensorError};
use crate::records::RelayId;
use crate::sensors::{RawValue, SensorHub};

// ── SensorPort implementation ─────────────────────────────────

impl<I, DP, OP, D> SensorPort for SensorHub<I, DP, OP, D>
where
    I: I2c,
    DP: InputPin + OutputPin,
    OP: InputPin + OutputPin,
    D: DelayNs,
{
    fn read_soil_moisture(&mut self) -> Result<RawValue, SensorError> {
        SensorHub::read_soil_moisture(self)
    }

    fn read_air(&mut self) -> Result<RawValue, SensorError> {
        SensorHub::read_air(self)
    }

    fn read_soil_temp(&mut self) -> Result<RawValue, SensorError> {
        SensorHub::read_soil_temp(self)
    }

    fn read_light(&mut self) -> Result<RawValue, SensorError> {
        SensorHub::read_light(self)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<PP: StatefulOutputPin, LP: StatefulOutputPin> ActuatorPort for RelayBoard<PP, LP> {
    fn set_relay(&mut self, relay: RelayId, on: bool) -> Result<(), ActuatorError> {
        self.set(relay, on)
    }
}
