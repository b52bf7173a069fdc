//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to: the latest soil input, the pump intent, timing and
//! configuration.  Think of it as the "blackboard" in a blackboard
//! architecture.

use crate::config::SystemConfig;

// ---------------------------------------------------------------------------
// Soil input (written by the controller before each tick)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SoilInput {
    /// Calibrated moisture percent.  `None` while uncalibrated or when no
    /// soil value has ever been accepted.
    pub percent: Option<f32>,
    /// Stability flag of this cycle's soil reading.
    pub stable: bool,
    /// Consecutive cycles the soil reading has been unstable, including
    /// this one.
    pub unstable_cycles: u32,
}

// ---------------------------------------------------------------------------
// Intents (written by state handlers; executed by the relay manager)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerCommands {
    pub pump_on: bool,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

pub struct FsmContext {
    // -- Timing --
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    /// Duration of one tick in seconds.
    pub tick_period_secs: f32,

    // -- Inputs --
    pub soil: SoilInput,

    // -- Outputs --
    pub commands: ControllerCommands,
    /// A watering cycle just ended; `Idle` must hand over to `Cooldown`.
    pub cooldown_pending: bool,

    pub config: SystemConfig,
}

impl FsmContext {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            ticks_in_state: 0,
            tick_period_secs: config.cycle_secs(),
            soil: SoilInput::default(),
            commands: ControllerCommands::default(),
            cooldown_pending: false,
            config,
        }
    }

    /// Replace the configuration.  Takes effect on the next tick.
    pub fn set_config(&mut self, config: SystemConfig) {
        self.tick_period_secs = config.cycle_secs();
        self.config = config;
    }

    /// Seconds elapsed since the current state was entered.
    pub fn secs_in_state(&self) -> f32 {
        self.ticks_in_state as f32 * self.tick_period_secs
    }

    /// Soil readings have been unstable for longer than the grace period.
    pub fn degraded(&self) -> bool {
        self.soil.unstable_cycles as f32 * self.tick_period_secs
            > self.config.instability_grace_secs as f32
    }
}
