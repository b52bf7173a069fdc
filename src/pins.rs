//! GPIO / peripheral pin assignments for the SoilGuard controller board
//! (ESP32-DevKitC + 2-channel relay module).
//!
//! Single source of truth: `main` builds every peripheral from these
//! numbers rather than hard-coding them.  Change a pin here and it
//! propagates everywhere.

// ---------------------------------------------------------------------------
// I²C bus (ADS1115 soil-probe ADC @ 0x48, BH1750 light sensor @ 0x23)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// Both devices are happy at fast-mode.
pub const I2C_BAUD_HZ: u32 = 400_000;

// ---------------------------------------------------------------------------
// Bit-banged single-wire sensors (open-drain, external pull-ups)
// ---------------------------------------------------------------------------

/// DHT22 air temperature / humidity data line (10 kΩ pull-up).
pub const DHT22_DATA_GPIO: i32 = 4;
/// DS18B20 soil temperature probe, 1-Wire bus (4.7 kΩ pull-up).
pub const ONEWIRE_GPIO: i32 = 15;

// ---------------------------------------------------------------------------
// Relay module (active-LOW inputs)
// ---------------------------------------------------------------------------

/// Relay 1: irrigation pump.
pub const PUMP_RELAY_GPIO: i32 = 26;
/// Relay 2: grow light.
pub const LIGHT_RELAY_GPIO: i32 = 27;
