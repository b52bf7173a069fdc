//! System configuration parameters
//!
//! All tunable parameters for the SoilGuard controller.
//! Values can be overridden via NVS (non-volatile storage) or pushed at
//! runtime with [`AppCommand::UpdateConfig`](crate::app::commands::AppCommand).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::control::interlock::InterlockRule;

/// Maximum number of interlock rules the relay manager evaluates.
pub const MAX_INTERLOCKS: usize = 4;

/// Largest accepted jump between two consecutive accepted readings, per
/// sensor channel.  A bigger jump is accepted but flagged unstable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilityTolerances {
    /// Soil probe voltage (V).
    pub soil_volts: f32,
    /// DHT22 air temperature (°C).
    pub air_celsius: f32,
    /// DHT22 relative humidity (%RH).
    pub air_humidity: f32,
    /// DS18B20 soil temperature (°C).
    pub soil_celsius: f32,
    /// BH1750 illuminance (lx).
    pub lux: f32,
}

impl Default for StabilityTolerances {
    fn default() -> Self {
        Self {
            soil_volts: 0.25,
            air_celsius: 2.0,
            air_humidity: 10.0,
            soil_celsius: 1.5,
            lux: 5_000.0,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Watering ---
    /// Soil moisture (%) below which a watering cycle starts
    pub low_threshold_percent: f32,
    /// Soil moisture (%) at which a watering cycle stops
    pub high_threshold_percent: f32,
    /// Hard cap on a single watering cycle (seconds)
    pub max_watering_secs: u32,
    /// Minimum idle period after watering stops (seconds)
    pub cooldown_secs: u32,
    /// How long soil readings may stay unstable before the controller degrades
    pub instability_grace_secs: u32,

    // --- Timing ---
    /// Control cycle interval (milliseconds)
    pub cycle_interval_ms: u32,
    /// Per-sensor read deadline (milliseconds)
    pub sensor_read_timeout_ms: u32,

    // --- Relays ---
    /// Physical write attempts before a relay is declared faulted
    pub actuator_retry_attempts: u8,
    /// Manual toggles allowed per second (also the burst size)
    pub manual_toggle_burst: u8,
    /// Declarative relay interlocks checked before any On toggle
    pub interlocks: heapless::Vec<InterlockRule, MAX_INTERLOCKS>,

    // --- Filtering ---
    pub stability: StabilityTolerances,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Watering
            low_threshold_percent: 40.0,
            high_threshold_percent: 60.0,
            max_watering_secs: 30,
            cooldown_secs: 3600, // 1 h soak before the next cycle
            instability_grace_secs: 300,

            // Timing
            cycle_interval_ms: 5_000,
            sensor_read_timeout_ms: 2_000,

            // Relays
            actuator_retry_attempts: 3,
            manual_toggle_burst: 4,
            interlocks: heapless::Vec::new(),

            // Filtering
            stability: StabilityTolerances::default(),
        }
    }
}

impl SystemConfig {
    /// Duration of one control cycle in seconds.
    pub fn cycle_secs(&self) -> f32 {
        self.cycle_interval_ms as f32 / 1000.0
    }

    /// Range-check every field.  Applied before a config is persisted or
    /// pushed into the running loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cfg = self;
        if !(0.0..=100.0).contains(&cfg.low_threshold_percent) {
            return Err(ConfigError::ValidationFailed(
                "low_threshold_percent must be 0–100",
            ));
        }
        if !(0.0..=100.0).contains(&cfg.high_threshold_percent) {
            return Err(ConfigError::ValidationFailed(
                "high_threshold_percent must be 0–100",
            ));
        }
        if cfg.low_threshold_percent >= cfg.high_threshold_percent {
            return Err(ConfigError::ValidationFailed(
                "low_threshold_percent must be < high_threshold_percent",
            ));
        }
        if !(1..=3600).contains(&cfg.max_watering_secs) {
            return Err(ConfigError::ValidationFailed(
                "max_watering_secs must be 1–3600",
            ));
        }
        if cfg.cooldown_secs > 86_400 {
            return Err(ConfigError::ValidationFailed(
                "cooldown_secs must be 0–86400",
            ));
        }
        if cfg.instability_grace_secs > 86_400 {
            return Err(ConfigError::ValidationFailed(
                "instability_grace_secs must be 0–86400",
            ));
        }
        if !(100..=3_600_000).contains(&cfg.cycle_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "cycle_interval_ms must be 100–3600000",
            ));
        }
        if !(10..=10_000).contains(&cfg.sensor_read_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "sensor_read_timeout_ms must be 10–10000",
            ));
        }
        if !(1..=10).contains(&cfg.actuator_retry_attempts) {
            return Err(ConfigError::ValidationFailed(
                "actuator_retry_attempts must be 1–10",
            ));
        }
        if !(1..=20).contains(&cfg.manual_toggle_burst) {
            return Err(ConfigError::ValidationFailed(
                "manual_toggle_burst must be 1–20",
            ));
        }
        let t = &cfg.stability;
        if [t.soil_volts, t.air_celsius, t.air_humidity, t.soil_celsius, t.lux]
            .iter()
            .any(|v| !v.is_finite() || *v <= 0.0)
        {
            return Err(ConfigError::ValidationFailed(
                "stability tolerances must be positive",
            ));
        }
        if cfg.interlocks.iter().any(|rule| match rule {
            InterlockRule::MutuallyExclusive(a, b) => a == b,
        }) {
            return Err(ConfigError::ValidationFailed(
                "interlock rule must name two different relays",
            ));
        }
        Ok(())
    }
}
