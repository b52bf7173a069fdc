//! `WateringController`: owns the FSM, its context and the timestamp of
//! the last state entry.

use super::context::{FsmContext, SoilInput};
use super::{Fsm, StateId, states};
use crate::config::SystemConfig;
use crate::records::Timestamp;

/// Result of one controller step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerOutput {
    pub previous: StateId,
    pub state: StateId,
    /// Desired pump state after this step.
    pub pump_on: bool,
    pub degraded: bool,
}

impl ControllerOutput {
    pub fn transitioned(&self) -> bool {
        self.previous != self.state
    }
}

pub struct WateringController {
    fsm: Fsm,
    ctx: FsmContext,
    state_since: Timestamp,
}

impl WateringController {
    pub fn new(config: SystemConfig, now: Timestamp) -> Self {
        let mut fsm = Fsm::new(states::build_state_table(), StateId::Idle);
        let mut ctx = FsmContext::new(config);
        fsm.start(&mut ctx);
        Self {
            fsm,
            ctx,
            state_since: now,
        }
    }

    /// Advance one cycle with this cycle's soil input.
    pub fn step(&mut self, input: SoilInput, at: Timestamp) -> ControllerOutput {
        let previous = self.fsm.current_state();
        self.ctx.soil = input;
        self.fsm.tick(&mut self.ctx);
        let state = self.fsm.current_state();
        if state != previous {
            self.state_since = at;
        }
        ControllerOutput {
            previous,
            state,
            pump_on: self.ctx.commands.pump_on,
            degraded: self.ctx.degraded(),
        }
    }

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Entry timestamp of the current state.
    pub fn state_since(&self) -> Timestamp {
        self.state_since
    }

    pub fn pump_on(&self) -> bool {
        self.ctx.commands.pump_on
    }

    pub fn config(&self) -> &SystemConfig {
        &self.ctx.config
    }

    pub fn set_config(&mut self, config: SystemConfig) {
        self.ctx.set_config(config);
    }
}
