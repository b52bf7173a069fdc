//! Concrete state handler functions and table builder.
//!
//! ```text
//!          [stable && % < low && !degraded]
//!  IDLE ─────────────────────────────────────▶ WATERING
//!   ▲ │                                            │
//!   │ │[cooldown pending]   [stable && % >= high]  │
//!   │ ▼                     [or secs >= max]       │
//!  COOLDOWN          IDLE ◀────────────────────────┘
//!   │                (cooldown pending)
//!   └──[secs >= cooldown]──▶ IDLE
//! ```
//!
//! The cycle that stops the pump reports `Idle`; `Cooldown` starts on
//! the following cycle.

use super::context::FsmContext;
use super::{StateDescriptor, StateId};
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: Watering
        StateDescriptor {
            id: StateId::Watering,
            name: "Watering",
            on_enter: Some(watering_enter),
            on_exit: Some(watering_exit),
            on_update: watering_update,
        },
        // Index 2: Cooldown
        StateDescriptor {
            id: StateId::Cooldown,
            name: "Cooldown",
            on_enter: Some(cooldown_enter),
            on_exit: None,
            on_update: cooldown_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.commands.pump_on = false;
    info!("IDLE: monitoring soil moisture");
}

fn idle_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.cooldown_pending {
        return Some(StateId::Cooldown);
    }

    let percent = ctx.soil.percent?;

    if percent < ctx.config.low_threshold_percent && ctx.soil.stable {
        if ctx.degraded() {
            warn!(
                "IDLE: soil at {:.1}% but readings unstable for {} cycles, not watering",
                percent, ctx.soil.unstable_cycles
            );
            return None;
        }
        info!(
            "IDLE: soil {:.1}% < {:.1}% → watering",
            percent, ctx.config.low_threshold_percent
        );
        return Some(StateId::Watering);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  WATERING state: pump running
// ═══════════════════════════════════════════════════════════════════════════

fn watering_enter(ctx: &mut FsmContext) {
    ctx.commands.pump_on = true;
    info!(
        "WATERING: pump on, target {:.1}%, cap {}s",
        ctx.config.high_threshold_percent, ctx.config.max_watering_secs
    );
}

fn watering_exit(ctx: &mut FsmContext) {
    ctx.commands.pump_on = false;
    ctx.cooldown_pending = true;
    info!("WATERING: pump off after {:.0}s", ctx.secs_in_state());
}

fn watering_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.secs_in_state() >= ctx.config.max_watering_secs as f32 {
        warn!(
            "WATERING: safety cap of {}s reached without reaching {:.1}%",
            ctx.config.max_watering_secs, ctx.config.high_threshold_percent
        );
        return Some(StateId::Idle);
    }

    match ctx.soil.percent {
        Some(percent) if ctx.soil.stable && percent >= ctx.config.high_threshold_percent => {
            info!("WATERING: soil reached {:.1}%", percent);
            Some(StateId::Idle)
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  COOLDOWN state: letting water percolate
// ═══════════════════════════════════════════════════════════════════════════

fn cooldown_enter(ctx: &mut FsmContext) {
    ctx.commands.pump_on = false;
    ctx.cooldown_pending = false;
    info!("COOLDOWN: holding for {}s", ctx.config.cooldown_secs);
}

fn cooldown_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.secs_in_state() >= ctx.config.cooldown_secs as f32 {
        return Some(StateId::Idle);
    }
    None
}
