//! Application core: domain logic behind port traits.
//!
//! The cycle orchestration lives in [`service`]; everything it touches
//! outside the process (sensors, relays, journal, storage, clock) is
//! reached through the traits in [`ports`], so the whole loop runs on
//! the host against mock adapters.

pub mod commands;
pub mod console;
pub mod events;
pub mod ports;
pub mod service;
pub mod status;
