//! Application service: the hexagonal core and cycle orchestrator.
//!
//! [`AppService`] owns the sensor reader, stability filter, calibration
//! and watering controller.  All I/O flows through port traits injected
//! at call sites via [`CyclePorts`], making the entire loop testable with
//! mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          AppService          │
//!  Clock ───────▶ │ read · filter · calibrate ·  │ ──▶ RecordJournal
//!                 │ control · reconcile · record │
//!                 └──────────────┬───────────────┘ ──▶ StatusBoard
//!                                ▼
//!                          RelayManager ──▶ ActuatorPort
//! ```

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::calibration::CalibrationStore;
use crate::config::SystemConfig;
use crate::control::relay_manager::RelayManager;
use crate::error::{CalibrationError, Error, RelayError, Result};
use crate::fsm::StateId;
use crate::fsm::context::SoilInput;
use crate::fsm::controller::WateringController;
use crate::records::{LogRecord, RelayId, RelaySource, Timestamp};
use crate::sensors::reader::SensorReader;
use crate::sensors::{RawValue, SensorKind, SensorReading};
use crate::stability::StabilityFilter;

use super::commands::{AppCommand, CommandChannel, ShutdownSignal};
use super::events::AppEvent;
use super::ports::{
    ActuatorPort, CalibrationPort, Clock, ConfigPort, EventSink, Heartbeat, RecordJournal, SensorPort,
};
use super::status::StatusBoard;

/// Longest single sleep between shutdown checks and heartbeat feeds.
const SLEEP_SLICE_MS: u32 = 250;

/// Unsaved config is flushed this long after the last change.
const AUTO_SAVE_DELAY_SECS: f32 = 5.0;

// ───────────────────────────────────────────────────────────────
// Ports bundle
// ───────────────────────────────────────────────────────────────

/// Everything one cycle touches outside the service.
pub struct CyclePorts<'a, S, A, J, C, P> {
    pub sensors: &'a mut S,
    pub relays: &'a RelayManager<A>,
    pub journal: &'a J,
    pub clock: &'a C,
    pub status: &'a StatusBoard,
    /// Calibration and config persistence.
    pub store: &'a P,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    reader: SensorReader,
    filter: StabilityFilter,
    calibration: CalibrationStore,
    controller: WateringController,
    cycle_count: u64,
    halted: bool,
    stop_requested: bool,
    degraded: bool,
    calibration_reported: bool,
    config_dirty: bool,
    dirty_since_cycle: u64,
}

impl AppService {
    pub fn new(config: SystemConfig, calibration: CalibrationStore, now: Timestamp) -> Self {
        Self {
            reader: SensorReader::new(config.sensor_read_timeout_ms),
            filter: StabilityFilter::new(config.stability),
            calibration,
            controller: WateringController::new(config, now),
            cycle_count: 0,
            halted: false,
            stop_requested: false,
            degraded: false,
            calibration_reported: false,
            config_dirty: false,
            dirty_since_cycle: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start<S, A, J, C, P>(&mut self, io: &mut CyclePorts<'_, S, A, J, C, P>, sink: &mut impl EventSink)
    where
        A: ActuatorPort,
    {
        let state = self.controller.state();
        let calibrated = self.calibration.is_calibrated();
        let [pump_on, light_on] = io.relays.snapshot();
        io.status.update(|s| {
            s.state = state;
            s.state_since = self.controller.state_since();
            s.calibrated = calibrated;
            s.pump_on = pump_on;
            s.light_on = light_on;
        });
        sink.emit(&AppEvent::Started { state, calibrated });
        info!("AppService started in {:?} (calibrated: {})", state, calibrated);
    }

    /// Run cycles until shutdown or an actuator fault.  The last action is
    /// always a forced all-off.
    pub fn run<S, A, J, C, P>(
        &mut self,
        io: &mut CyclePorts<'_, S, A, J, C, P>,
        sink: &mut impl EventSink,
        delay: &mut impl DelayNs,
        heartbeat: &impl Heartbeat,
        shutdown: &ShutdownSignal,
        commands: &CommandChannel,
    ) -> Result<()>
    where
        S: SensorPort,
        A: ActuatorPort,
        J: RecordJournal,
        C: Clock,
        P: CalibrationPort + ConfigPort,
    {
        self.start(io, sink);

        let outcome = loop {
            while let Ok(cmd) = commands.try_receive() {
                if let Err(e) = self.handle_command(cmd, io, sink) {
                    warn!("Command failed: {}", e);
                }
            }
            if shutdown.is_requested() || self.stop_requested {
                info!("Shutdown requested after {} cycles", self.cycle_count);
                break Ok(());
            }

            if let Err(e) = self.tick(io, sink) {
                break Err(e);
            }

            let mut remaining = self.controller.config().cycle_interval_ms;
            while remaining > 0 && !shutdown.is_requested() {
                let slice = remaining.min(SLEEP_SLICE_MS);
                delay.delay_ms(slice);
                heartbeat.feed();
                remaining -= slice;
            }
        };

        self.shutdown(io, sink);
        outcome
    }

    /// Flush config, then force every relay off and lock the relays out so
    /// no later command (manual ones included) can switch them back on.
    /// Called on every exit path of [`run`](Self::run); safe to call on its
    /// own.
    pub fn shutdown<S, A, J, C, P>(&mut self, io: &mut CyclePorts<'_, S, A, J, C, P>, sink: &mut impl EventSink)
    where
        A: ActuatorPort,
        J: RecordJournal,
        C: Clock,
        P: ConfigPort,
    {
        self.force_save_if_dirty(io.store);

        if let Err(e) = io.relays.shut_down(io.clock.now(), io.journal) {
            error!("Safe-state on exit incomplete: {}", e);
        }
        let [pump_on, light_on] = io.relays.snapshot();
        let halted = self.halted;
        io.status.update(|s| {
            s.pump_on = pump_on;
            s.light_on = light_on;
            s.halted = halted;
        });
        sink.emit(&AppEvent::Stopped);
        info!("AppService stopped");
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one full cycle: read → filter → calibrate → control →
    /// reconcile relays → record → publish.
    ///
    /// Sensor, calibration and journal problems are absorbed here.  Only
    /// an actuator fault returns `Err`, after which the service is halted.
    pub fn tick<S, A, J, C, P>(&mut self, io: &mut CyclePorts<'_, S, A, J, C, P>, sink: &mut impl EventSink) -> Result<StateId>
    where
        S: SensorPort,
        A: ActuatorPort,
        J: RecordJournal,
        C: Clock,
        P: ConfigPort,
    {
        if self.halted {
            return Err(Error::Halted);
        }
        if let Some(fault) = io.relays.fault() {
            return Err(self.halt(fault.into(), io.status, sink));
        }

        self.cycle_count += 1;

        // 1. Acquire
        let samples = self.reader.read_all(&mut *io.sensors, io.clock);

        // 2–3. Stabilise and convert
        let readings = samples.map(|sample| {
            if let Err(error) = sample.result {
                warn!("{:?}: {} (carrying previous value forward)", sample.kind, error);
                sink.emit(&AppEvent::SensorFault {
                    kind: sample.kind,
                    error,
                });
            }
            let eval = self.filter.observe(sample.kind, sample.result);
            let derived_value = match sample.kind {
                SensorKind::SoilMoisture => self.calibration.convert_reading(eval.accepted).ok(),
                _ => eval.accepted.map(|v| v.primary()),
            };
            SensorReading {
                kind: sample.kind,
                raw_value: eval.accepted,
                derived_value,
                stable: eval.stable,
                timestamp: sample.timestamp,
            }
        });

        let soil = readings[SensorKind::SoilMoisture.index()];
        if !self.calibration.is_calibrated() && !self.calibration_reported {
            warn!("Soil probe uncalibrated, watering disabled");
            sink.emit(&AppEvent::CalibrationRequired(CalibrationError::Uncalibrated));
            self.calibration_reported = true;
        }

        // 4. Control
        let now = io.clock.now();
        let out = self.controller.step(
            SoilInput {
                percent: soil.derived_value,
                stable: soil.stable,
                unstable_cycles: self.filter.unstable_streak(SensorKind::SoilMoisture),
            },
            now,
        );

        if out.degraded != self.degraded {
            self.degraded = out.degraded;
            if out.degraded {
                let unstable_cycles = self.filter.unstable_streak(SensorKind::SoilMoisture);
                warn!("Soil readings unstable for {} cycles, watering suppressed", unstable_cycles);
                sink.emit(&AppEvent::SensorDegraded { unstable_cycles });
            } else {
                info!("Soil readings stable again");
                sink.emit(&AppEvent::SensorRecovered);
            }
        }

        if out.transitioned() {
            sink.emit(&AppEvent::StateChanged {
                from: out.previous,
                to: out.state,
                at: now,
            });
        }

        // 5. Reconcile the pump with the controller's intent
        if io.relays.is_on(RelayId::Pump) != out.pump_on {
            match io
                .relays
                .set_state(RelayId::Pump, out.pump_on, RelaySource::Auto, now, io.journal)
            {
                Ok(event) => sink.emit(&AppEvent::RelayChanged(event)),
                Err(RelayError::ActuatorFault(fault)) => {
                    return Err(self.halt(fault.into(), io.status, sink));
                }
                Err(RelayError::Journal(e)) => {
                    error!("Pump switched but the event was not recorded: {}", e);
                }
                Err(e) => {
                    warn!("Pump command rejected: {}", e);
                    sink.emit(&AppEvent::RelayRejected(e));
                }
            }
        }

        // 6. Record
        let record = LogRecord::from_readings(&readings, out.state, now);
        let record_id = match io.journal.append_log_record(&record) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Cycle {} not recorded: {}", self.cycle_count, e);
                None
            }
        };

        // 7. Publish
        let [pump_on, light_on] = io.relays.snapshot();
        let cycles = self.cycle_count;
        let state_since = self.controller.state_since();
        let calibrated = self.calibration.is_calibrated();
        io.status.update(|s| {
            s.state = out.state;
            s.state_since = state_since;
            s.last_cycle_at = Some(now);
            s.cycles = cycles;
            s.calibrated = calibrated;
            s.sensor_degraded = out.degraded;
            s.pump_on = pump_on;
            s.light_on = light_on;
        });
        sink.emit(&AppEvent::CycleCompleted {
            cycle: cycles,
            state: out.state,
            soil_percent: soil.derived_value,
            stable: record.stable,
            record: record_id,
        });

        self.auto_save_if_needed(io.store);
        Ok(out.state)
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an external command.  Called between cycles.
    pub fn handle_command<S, A, J, C, P>(
        &mut self,
        cmd: AppCommand,
        io: &mut CyclePorts<'_, S, A, J, C, P>,
        sink: &mut impl EventSink,
    ) -> Result<()>
    where
        A: ActuatorPort,
        P: CalibrationPort + ConfigPort,
    {
        match cmd {
            AppCommand::Calibrate(point) => {
                let Some(RawValue::Volts(raw)) = self.filter.previous(SensorKind::SoilMoisture) else {
                    warn!("Calibration {:?} requested before any soil reading", point);
                    return Err(CalibrationError::MissingReading.into());
                };
                if let Some(pair) = self.calibration.calibrate(point, raw, io.store)? {
                    self.calibration_reported = false;
                    io.status.update(|s| s.calibrated = true);
                    sink.emit(&AppEvent::CalibrationUpdated(pair));
                }
            }
            AppCommand::UpdateConfig(new_config) => {
                if let Err(e) = new_config.validate() {
                    warn!("Configuration update rejected: {}", e);
                    return Err(e.into());
                }
                self.apply_config(&new_config, io.relays);
                self.mark_config_dirty();
                info!("Configuration updated at runtime");
            }
            AppCommand::SaveConfig => {
                io.store.save(self.controller.config())?;
                self.config_dirty = false;
                info!("Configuration saved on request");
            }
            AppCommand::Shutdown => {
                self.stop_requested = true;
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.controller.state()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    pub fn current_config(&self) -> SystemConfig {
        self.controller.config().clone()
    }

    // ── Internal ──────────────────────────────────────────────

    fn halt(&mut self, fault: RelayError, status: &StatusBoard, sink: &mut impl EventSink) -> Error {
        self.halted = true;
        error!("Actuator fault, halting automatic control: {}", fault);
        if let RelayError::ActuatorFault(e) = fault {
            sink.emit(&AppEvent::ActuatorFault(e));
        }
        status.update(|s| s.halted = true);
        fault.into()
    }

    fn apply_config<A: ActuatorPort>(&mut self, config: &SystemConfig, relays: &RelayManager<A>) {
        self.reader.set_timeout_ms(config.sensor_read_timeout_ms);
        self.filter.set_tolerances(config.stability);
        relays.configure(config);
        self.controller.set_config(config.clone());
    }

    // ── Config dirty-flag management ──────────────────────────

    fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_cycle = self.cycle_count;
        }
    }

    /// Save once the config has been unchanged for a few seconds.
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        let cycles_since_dirty = self.cycle_count.saturating_sub(self.dirty_since_cycle);
        let secs_since_dirty = cycles_since_dirty as f32 * self.controller.config().cycle_secs();
        if secs_since_dirty < AUTO_SAVE_DELAY_SECS {
            return false;
        }
        match storage.save(self.controller.config()) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config auto-saved");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Force-save if dirty (called on the way out).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(self.controller.config()) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config force-saved before shutdown");
            }
            Err(e) => {
                warn!("Config force-save failed: {}", e);
            }
        }
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
