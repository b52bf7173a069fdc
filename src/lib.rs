//! SoilGuard firmware library.
//!
//! Exposes the control logic, drivers and adapters for integration
//! testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(all(target_os = "espidf", feature = "espidf"))]` within each
//! module, so the whole crate builds and tests on the host, and an
//! `espidf`-target build without the feature falls back to the host
//! implementations instead of naming a missing crate.

#![deny(unused_must_use)]

pub mod app;
pub mod calibration;
pub mod config;
pub mod control;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod records;
pub mod stability;

pub mod adapters;
pub mod drivers;
pub mod sensors;

#[cfg(target_os = "espidf")]
mod esp_link_shims;
