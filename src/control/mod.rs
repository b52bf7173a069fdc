//! Relay control: exclusive ownership, interlocks and the manual surface.

pub mod interlock;
pub mod manual;
pub mod relay_manager;
