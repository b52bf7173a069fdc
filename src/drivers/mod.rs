//! Peripheral drivers: relay coils, the 1-Wire bus master, the task
//! watchdog and core-pinned task spawning.

pub mod onewire;
pub mod relay;
pub mod task_pin;
pub mod watchdog;
