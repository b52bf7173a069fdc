//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the
//! ESP-IDF logger (UART / USB-CDC in production, stderr on the host).
//! Lines carry a fixed tag so they can be grepped from a serial capture.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::records::RelaySource;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { state, calibrated } => {
                info!("START | initial_state={} | calibrated={}", state, calibrated);
            }
            AppEvent::StateChanged { from, to, at } => {
                info!("STATE | {} -> {} | t={}ms", from, to, at.uptime_ms);
            }
            AppEvent::CycleCompleted {
                cycle,
                state,
                soil_percent,
                stable,
                record,
            } => match soil_percent {
                Some(p) => info!(
                    "CYCLE | #{} | state={} | soil={:.1}% | stable={} | record={:?}",
                    cycle, state, p, stable, record
                ),
                None => info!(
                    "CYCLE | #{} | state={} | soil=-- | stable={} | record={:?}",
                    cycle, state, stable, record
                ),
            },
            AppEvent::SensorFault { kind, error } => {
                warn!("SENSOR | {} read failed: {}", kind.name(), error);
            }
            AppEvent::SensorDegraded { unstable_cycles } => {
                warn!(
                    "SENSOR | soil degraded after {} unstable cycles, watering suppressed",
                    unstable_cycles
                );
            }
            AppEvent::SensorRecovered => {
                info!("SENSOR | soil readings stable again");
            }
            AppEvent::CalibrationRequired(e) => {
                warn!("CALIB | watering disabled: {}", e);
            }
            AppEvent::CalibrationUpdated(point) => {
                info!(
                    "CALIB | dry={:.3}V wet={:.3}V",
                    point.dry_raw, point.wet_raw
                );
            }
            AppEvent::RelayChanged(ev) => {
                let source = match ev.source {
                    RelaySource::Auto => "auto",
                    RelaySource::Manual => "manual",
                };
                info!(
                    "RELAY | {} {:?} ({}) | t={}ms",
                    ev.relay_id.name(),
                    ev.action,
                    source,
                    ev.timestamp.uptime_ms
                );
            }
            AppEvent::RelayRejected(e) => {
                warn!("RELAY | rejected: {}", e);
            }
            AppEvent::ActuatorFault(e) => {
                error!("FAULT | actuator: {}, halting", e);
            }
            AppEvent::Stopped => {
                info!("STOP | all relays off");
            }
        }
    }
}
