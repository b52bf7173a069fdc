//! Integration tests for the AppService → controller → relays → journal
//! pipeline.
//!
//! These run on the host and drive whole cycles through mock adapters,
//! checking the externally visible results: states, relay events, log
//! records, status and emitted application events.

use crate::mock_hw::{
    CountingHeartbeat, FailingJournal, ManualClock, MockActuator, MockDelay, RecordingSink,
    ScriptedSensors, SharedActuator, calibration, memory_journal, test_config, volts_for,
};
use std::sync::atomic::{AtomicBool, Ordering};

use soilguard::adapters::journal::StorageJournal;
use soilguard::adapters::nvs::NvsAdapter;
use soilguard::app::commands::{AppCommand, CommandChannel, ShutdownSignal};
use soilguard::app::events::AppEvent;
use soilguard::app::ports::{CalibrationPort, Clock, ConfigError, ConfigPort, RecordJournal};
use soilguard::app::service::{AppService, CyclePorts};
use soilguard::app::status::StatusBoard;
use soilguard::calibration::{CalibrationStore, ReferencePoint};
use soilguard::config::SystemConfig;
use soilguard::control::manual::ManualControl;
use soilguard::control::relay_manager::RelayManager;
use soilguard::error::{ActuatorError, CalibrationError, Error, RelayError, SensorError};
use soilguard::fsm::StateId;
use soilguard::records::{RelayAction, RelayId, RelaySource, Timestamp};
use soilguard::sensors::RawValue;

// ── Test rig ──────────────────────────────────────────────────

struct Rig {
    sensors: ScriptedSensors,
    actuator: MockActuator,
    relays: RelayManager<MockActuator>,
    journal: StorageJournal<NvsAdapter>,
    clock: ManualClock,
    status: StatusBoard,
    store: NvsAdapter,
}

type Io<'a> = CyclePorts<'a, ScriptedSensors, MockActuator, StorageJournal<NvsAdapter>, ManualClock, NvsAdapter>;

impl Rig {
    fn new(sensors: ScriptedSensors) -> Self {
        let actuator = MockActuator::new();
        Self {
            sensors,
            relays: RelayManager::new(actuator.clone(), &test_config()),
            actuator,
            journal: memory_journal(),
            clock: ManualClock::default(),
            status: StatusBoard::new("SG-EFCAFE", "0000beef", Timestamp::default()),
            store: NvsAdapter::new().unwrap(),
        }
    }

    fn io(&mut self) -> Io<'_> {
        CyclePorts {
            sensors: &mut self.sensors,
            relays: &self.relays,
            journal: &self.journal,
            clock: &self.clock,
            status: &self.status,
            store: &self.store,
        }
    }

    /// Service with the standard dry 3.0 V / wet 1.0 V calibration.
    fn calibrated_app(&mut self) -> AppService {
        self.store.save_calibration(&calibration()).unwrap();
        let store = CalibrationStore::load(&self.store);
        AppService::new(test_config(), store, self.clock.now())
    }

    fn uncalibrated_app(&self) -> AppService {
        AppService::new(test_config(), CalibrationStore::new(), self.clock.now())
    }

    /// Run one cycle per second, starting at t = 1 s.
    fn run_cycles(&mut self, app: &mut AppService, sink: &mut RecordingSink, n: u64) -> Vec<StateId> {
        (0..n)
            .map(|_| {
                self.clock.advance(1_000);
                app.tick(&mut self.io(), sink).unwrap()
            })
            .collect()
    }

    fn relay_summary(&self) -> Vec<(RelayId, RelayAction, RelaySource, u64)> {
        self.journal
            .relay_events()
            .unwrap()
            .iter()
            .map(|e| {
                (
                    e.item.relay_id,
                    e.item.action,
                    e.item.source,
                    e.item.timestamp.uptime_ms,
                )
            })
            .collect()
    }
}

// ── Watering scenario ─────────────────────────────────────────

#[test]
fn reference_scenario_waters_then_cools_down() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[25.0, 28.0, 45.0, 61.0, 50.0, 20.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();
    app.start(&mut rig.io(), &mut sink);

    let states = rig.run_cycles(&mut app, &mut sink, 6);
    assert_eq!(
        states,
        vec![
            StateId::Watering,
            StateId::Watering,
            StateId::Watering,
            StateId::Idle,
            StateId::Cooldown,
            StateId::Cooldown,
        ]
    );

    assert_eq!(
        rig.relay_summary(),
        vec![
            (RelayId::Pump, RelayAction::On, RelaySource::Auto, 1_000),
            (RelayId::Pump, RelayAction::Off, RelaySource::Auto, 4_000),
        ]
    );
    assert_eq!(
        rig.actuator.calls(),
        vec![(RelayId::Pump, true), (RelayId::Pump, false)]
    );

    let transitions: Vec<(StateId, StateId)> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::StateChanged { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (StateId::Idle, StateId::Watering),
            (StateId::Watering, StateId::Idle),
            (StateId::Idle, StateId::Cooldown),
        ]
    );
}

#[test]
fn every_cycle_appends_one_log_record() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[25.0, 28.0, 45.0, 61.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();
    let states = rig.run_cycles(&mut app, &mut sink, 4);

    let records = rig.journal.log_records().unwrap();
    let ids: Vec<u64> = records.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    for (entry, state) in records.iter().zip(&states) {
        assert_eq!(entry.item.state, *state);
        assert!(entry.item.stable);
        assert_eq!(entry.item.lux, Some(1_200.0));
        assert_eq!(entry.item.air_humidity, Some(55.0));
    }
    let first = records[0].item.soil_percent.unwrap();
    assert!((first - 25.0).abs() < 0.01, "got {first}");
    assert_eq!(records[0].item.soil_volts, Some(volts_for(25.0)));
    assert_eq!(records[0].item.soil_raw, Some(20_000), "2.5 V at ±4.096 V full scale");

    let completed: Vec<Option<u64>> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::CycleCompleted { record, .. } => Some(*record),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![Some(1), Some(2), Some(3), Some(4)]);
}

#[test]
fn safety_cap_ends_watering_even_while_dry() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[10.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    let states = rig.run_cycles(&mut app, &mut sink, 12);
    assert_eq!(states[0], StateId::Watering);
    assert_eq!(states[9], StateId::Watering, "9 s in: still under the 10 s cap");
    assert_eq!(states[10], StateId::Idle, "10 s in: cap reached");
    assert_eq!(states[11], StateId::Cooldown);
    assert!(!rig.relays.is_on(RelayId::Pump));
}

// ── Sensor faults ─────────────────────────────────────────────

#[test]
fn timeouts_hold_off_watering_until_a_reading_arrives() {
    let soil = vec![
        Err(SensorError::Timeout),
        Err(SensorError::Timeout),
        Ok(RawValue::Volts(volts_for(25.0))),
    ];
    let mut rig = Rig::new(ScriptedSensors::new(soil));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    let states = rig.run_cycles(&mut app, &mut sink, 3);
    assert_eq!(states, vec![StateId::Idle, StateId::Idle, StateId::Watering]);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SensorFault { error: SensorError::Timeout, .. })),
        2
    );

    let records = rig.journal.log_records().unwrap();
    assert_eq!(records[0].item.soil_percent, None);
    assert!(!records[0].item.stable);
    assert!(records[2].item.stable);
}

#[test]
fn carried_forward_value_never_ends_watering() {
    let soil = vec![
        Ok(RawValue::Volts(volts_for(25.0))),
        Err(SensorError::Timeout),
        Err(SensorError::ProtocolFault),
        Ok(RawValue::Volts(volts_for(65.0))),
    ];
    let mut rig = Rig::new(ScriptedSensors::new(soil));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    let states = rig.run_cycles(&mut app, &mut sink, 4);
    assert_eq!(
        states,
        vec![StateId::Watering, StateId::Watering, StateId::Watering, StateId::Idle]
    );

    let carried = &rig.journal.log_records().unwrap()[1].item;
    assert!(!carried.stable);
    assert_eq!(carried.soil_volts, Some(volts_for(25.0)));
}

#[test]
fn other_sensor_failure_does_not_abort_the_cycle() {
    let mut sensors = ScriptedSensors::from_percents(&[25.0]);
    sensors.light_fails = true;
    let mut rig = Rig::new(sensors);
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    let states = rig.run_cycles(&mut app, &mut sink, 1);
    assert_eq!(states, vec![StateId::Watering]);
    let rec = &rig.journal.log_records().unwrap()[0].item;
    assert_eq!(rec.lux, None);
    assert!(!rec.stable);
}

#[test]
fn prolonged_instability_degrades_then_recovers() {
    let mut soil = vec![Ok(RawValue::Volts(volts_for(50.0)))];
    soil.extend([Err(SensorError::Timeout); 5]);
    soil.push(Ok(RawValue::Volts(volts_for(20.0))));
    let mut rig = Rig::new(ScriptedSensors::new(soil));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    let states = rig.run_cycles(&mut app, &mut sink, 7);
    assert!(states[..6].iter().all(|s| *s == StateId::Idle));
    assert_eq!(states[6], StateId::Watering);

    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SensorDegraded { unstable_cycles: 4 })),
        1
    );
    assert_eq!(sink.count(|e| matches!(e, AppEvent::SensorRecovered)), 1);
    assert!(!rig.status.snapshot().sensor_degraded);
}

// ── Calibration ───────────────────────────────────────────────

#[test]
fn uncalibrated_sensor_never_waters() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[5.0]));
    let mut app = rig.uncalibrated_app();
    let mut sink = RecordingSink::new();

    let states = rig.run_cycles(&mut app, &mut sink, 3);
    assert!(states.iter().all(|s| *s == StateId::Idle));
    assert!(rig.actuator.calls().is_empty());
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::CalibrationRequired(CalibrationError::Uncalibrated))),
        1,
        "reported once, not every cycle"
    );
    let rec = &rig.journal.log_records().unwrap()[0].item;
    assert_eq!(rec.soil_percent, None);
    assert!(rec.soil_volts.is_some());
}

#[test]
fn calibrate_commands_capture_latest_soil_value() {
    let soil = vec![Ok(RawValue::Volts(2.9)), Ok(RawValue::Volts(1.1))];
    let mut rig = Rig::new(ScriptedSensors::new(soil));
    let mut app = rig.uncalibrated_app();
    let mut sink = RecordingSink::new();

    assert_eq!(
        app.handle_command(AppCommand::Calibrate(ReferencePoint::Dry), &mut rig.io(), &mut sink),
        Err(Error::Calibration(CalibrationError::MissingReading)),
        "nothing to capture before the first cycle"
    );

    rig.run_cycles(&mut app, &mut sink, 1);
    app.handle_command(AppCommand::Calibrate(ReferencePoint::Dry), &mut rig.io(), &mut sink)
        .unwrap();
    assert!(!app.calibration().is_calibrated(), "one point is not a pair");

    rig.run_cycles(&mut app, &mut sink, 1);
    app.handle_command(AppCommand::Calibrate(ReferencePoint::Wet), &mut rig.io(), &mut sink)
        .unwrap();

    let active = *app.calibration().active().unwrap();
    assert_eq!((active.dry_raw, active.wet_raw), (2.9, 1.1));
    assert_eq!(rig.store.load_calibration(), Ok(Some(active)));
    assert!(rig.status.snapshot().calibrated);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::CalibrationUpdated(_))), 1);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn updated_config_is_auto_saved_after_quiet_period() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[50.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    let new_cfg = SystemConfig {
        low_threshold_percent: 55.0,
        ..test_config()
    };
    app.handle_command(AppCommand::UpdateConfig(new_cfg.clone()), &mut rig.io(), &mut sink)
        .unwrap();
    assert!(app.is_config_dirty());
    assert_eq!(app.current_config(), new_cfg);

    // 50 % is now below the low threshold.
    let states = rig.run_cycles(&mut app, &mut sink, 4);
    assert_eq!(states[0], StateId::Watering);
    assert!(app.is_config_dirty(), "4 s after the change: not yet");

    rig.run_cycles(&mut app, &mut sink, 1);
    assert!(!app.is_config_dirty());
    assert_eq!(rig.store.load(), Ok(new_cfg));
}

#[test]
fn invalid_config_update_is_rejected_and_not_applied() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[65.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    let inverted = SystemConfig {
        low_threshold_percent: 70.0,
        high_threshold_percent: 60.0,
        cooldown_secs: 0,
        ..test_config()
    };
    let result = app.handle_command(AppCommand::UpdateConfig(inverted), &mut rig.io(), &mut sink);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::ValidationFailed(_)))
    ));
    assert_eq!(app.current_config(), test_config());
    assert!(!app.is_config_dirty());

    // 65 % sits above the untouched band: no pump chatter.
    let states = rig.run_cycles(&mut app, &mut sink, 8);
    assert!(states.iter().all(|s| *s == StateId::Idle), "{states:?}");
    assert!(rig.actuator.calls().iter().all(|(relay, _)| *relay != RelayId::Pump));
    assert_eq!(rig.store.load(), Ok(SystemConfig::default()));
}

#[test]
fn save_config_command_persists_immediately() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[50.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    app.handle_command(AppCommand::SaveConfig, &mut rig.io(), &mut sink)
        .unwrap();
    assert_eq!(rig.store.load(), Ok(test_config()));
}

// ── Manual toggles ────────────────────────────────────────────

#[test]
fn automatic_control_wins_over_manual_pump_toggle() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[50.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    {
        let mut manual = ManualControl::new(&rig.relays, 4);
        manual
            .toggle(RelayId::Pump, true, &rig.journal, &rig.clock)
            .unwrap();
        manual
            .toggle(RelayId::Light, true, &rig.journal, &rig.clock)
            .unwrap();
    }

    let states = rig.run_cycles(&mut app, &mut sink, 1);
    assert_eq!(states, vec![StateId::Idle]);
    assert!(!rig.relays.is_on(RelayId::Pump), "loop switched the pump back off");
    assert!(rig.relays.is_on(RelayId::Light), "loop leaves the light alone");

    let sources: Vec<(RelayId, RelayAction, RelaySource)> = rig
        .relay_summary()
        .into_iter()
        .map(|(r, a, s, _)| (r, a, s))
        .collect();
    assert_eq!(
        sources,
        vec![
            (RelayId::Pump, RelayAction::On, RelaySource::Manual),
            (RelayId::Light, RelayAction::On, RelaySource::Manual),
            (RelayId::Pump, RelayAction::Off, RelaySource::Auto),
        ]
    );
    assert!(rig.status.snapshot().light_on);
}

#[test]
fn concurrent_manual_toggles_keep_audit_and_hardware_in_step() {
    let actuator = SharedActuator::new();
    let relays = RelayManager::new(actuator.clone(), &test_config());
    let journal = StorageJournal::open(NvsAdapter::new().unwrap(), 16_384).unwrap();
    let clock = ManualClock::default();
    let status = StatusBoard::new("SG-EFCAFE", "0000beef", Timestamp::default());
    let store = NvsAdapter::new().unwrap();
    store.save_calibration(&calibration()).unwrap();
    let mut app = AppService::new(test_config(), CalibrationStore::load(&store), clock.now());
    let mut sink = RecordingSink::new();

    // Dry and wet spells long enough to water, stop and cool down.
    let script: Vec<f32> = (0..5).flat_map(|_| [[20.0; 6], [70.0; 6]]).flatten().collect();
    let mut sensors = ScriptedSensors::from_percents(&script);
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let mut manual = ManualControl::new(&relays, 255);
            let mut on = true;
            for _ in 0..10_000 {
                if done.load(Ordering::Relaxed) {
                    break;
                }
                if manual.toggle(RelayId::Pump, on, &journal, &clock).is_ok() {
                    on = !on;
                }
                std::thread::yield_now();
            }
        });

        let mut io = CyclePorts {
            sensors: &mut sensors,
            relays: &relays,
            journal: &journal,
            clock: &clock,
            status: &status,
            store: &store,
        };
        for _ in 0..script.len() {
            clock.advance(1_000);
            app.tick(&mut io, &mut sink).unwrap();
        }
        done.store(true, Ordering::Relaxed);
    });

    // Replay the audit trail: every entry that changes the pump must match
    // the next physical write, and no write may go unrecorded.
    let writes: Vec<bool> = actuator
        .calls()
        .into_iter()
        .filter(|(relay, _)| *relay == RelayId::Pump)
        .map(|(_, on)| on)
        .collect();
    let events = journal.relay_events().unwrap();
    let mut pending = writes.iter();
    let mut physical = false;
    for entry in events.iter().filter(|e| e.item.relay_id == RelayId::Pump) {
        let on = entry.item.action == RelayAction::On;
        if on != physical {
            assert_eq!(pending.next(), Some(&on), "event {} has no matching write", entry.id);
            physical = on;
        }
    }
    assert_eq!(pending.next(), None, "pump written without an audit entry");
    assert_eq!(relays.is_on(RelayId::Pump), physical);
    assert!(events.iter().any(|e| e.item.source == RelaySource::Auto));
}

// ── Journal failures ──────────────────────────────────────────

#[test]
fn journal_failure_does_not_stop_the_cycle() {
    let mut sensors = ScriptedSensors::from_percents(&[25.0]);
    let actuator = MockActuator::new();
    let relays = RelayManager::new(actuator.clone(), &test_config());
    let journal = FailingJournal;
    let clock = ManualClock::at(1_000);
    let status = StatusBoard::new("SG-EFCAFE", "0000beef", Timestamp::default());
    let store = NvsAdapter::new().unwrap();
    store.save_calibration(&calibration()).unwrap();

    let mut app = AppService::new(test_config(), CalibrationStore::load(&store), clock.now());
    let mut sink = RecordingSink::new();
    let mut io = CyclePorts {
        sensors: &mut sensors,
        relays: &relays,
        journal: &journal,
        clock: &clock,
        status: &status,
        store: &store,
    };

    assert_eq!(app.tick(&mut io, &mut sink), Ok(StateId::Watering));
    assert!(relays.is_on(RelayId::Pump), "relay state is authoritative");
    assert_eq!(actuator.calls(), vec![(RelayId::Pump, true)]);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::CycleCompleted {
            record: None,
            state: StateId::Watering,
            ..
        }
    )));
}

// ── Actuator faults ───────────────────────────────────────────

#[test]
fn actuator_fault_halts_the_loop() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[25.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();
    rig.actuator.set_broken(true);

    rig.clock.advance(1_000);
    assert_eq!(
        app.tick(&mut rig.io(), &mut sink),
        Err(Error::Relay(RelayError::ActuatorFault(ActuatorError::GpioWriteFailed)))
    );
    assert_eq!(
        rig.actuator.calls(),
        vec![(RelayId::Pump, true); 3],
        "three attempts before giving up"
    );
    assert!(app.is_halted());
    assert!(rig.status.snapshot().halted);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ActuatorFault(_))), 1);

    rig.clock.advance(1_000);
    assert_eq!(app.tick(&mut rig.io(), &mut sink), Err(Error::Halted));
}

#[test]
fn run_returns_fault_and_still_forces_all_off() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[25.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();
    rig.actuator.set_broken(true);

    let shutdown = ShutdownSignal::new();
    let commands = CommandChannel::new();
    let heartbeat = CountingHeartbeat::default();
    let clock = ManualClock::default();
    let mut delay = MockDelay {
        clock: &clock,
        shutdown: &shutdown,
        stop_after_ms: None,
        slept_ms: 0,
    };

    let outcome = app.run(&mut rig.io(), &mut sink, &mut delay, &heartbeat, &shutdown, &commands);
    assert!(matches!(outcome, Err(Error::Relay(RelayError::ActuatorFault(_)))));
    let calls = rig.actuator.calls();
    assert!(calls.contains(&(RelayId::Pump, false)));
    assert!(calls.contains(&(RelayId::Light, false)));
    assert_eq!(sink.events.last(), Some(&AppEvent::Stopped));
}

// ── Shutdown ──────────────────────────────────────────────────

#[test]
fn shutdown_mid_watering_leaves_every_relay_off() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[25.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    let shutdown = ShutdownSignal::new();
    let commands = CommandChannel::new();
    let heartbeat = CountingHeartbeat::default();
    let mut delay = MockDelay {
        clock: &rig.clock,
        shutdown: &shutdown,
        stop_after_ms: Some(2_500),
        slept_ms: 0,
    };

    // The delay borrows the rig clock, so build the ports by hand.
    let mut io = CyclePorts {
        sensors: &mut rig.sensors,
        relays: &rig.relays,
        journal: &rig.journal,
        clock: &rig.clock,
        status: &rig.status,
        store: &rig.store,
    };
    let outcome = app.run(&mut io, &mut sink, &mut delay, &heartbeat, &shutdown, &commands);
    assert_eq!(outcome, Ok(()));

    assert_eq!(app.cycle_count(), 3, "cycles at 0, 1 and 2 s");
    assert_eq!(heartbeat.feeds.get(), 10, "fed after every 250 ms slice");
    assert!(!rig.relays.is_on(RelayId::Pump));
    assert!(!rig.relays.is_on(RelayId::Light));

    let events = rig.journal.relay_events().unwrap();
    for relay in RelayId::ALL {
        let last = events.iter().rev().find(|e| e.item.relay_id == relay).unwrap();
        assert_eq!(last.item.action, RelayAction::Off, "{relay:?} must end off");
    }
    assert_eq!(sink.events.last(), Some(&AppEvent::Stopped));
}

#[test]
fn shutdown_command_stops_before_the_next_cycle() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[25.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    let shutdown = ShutdownSignal::new();
    let commands = CommandChannel::new();
    commands.try_send(AppCommand::Shutdown).unwrap();
    let heartbeat = CountingHeartbeat::default();
    let clock = ManualClock::default();
    let mut delay = MockDelay {
        clock: &clock,
        shutdown: &shutdown,
        stop_after_ms: None,
        slept_ms: 0,
    };

    let outcome = app.run(&mut rig.io(), &mut sink, &mut delay, &heartbeat, &shutdown, &commands);
    assert_eq!(outcome, Ok(()));
    assert_eq!(app.cycle_count(), 0);
    assert!(matches!(sink.events.first(), Some(AppEvent::Started { .. })));
    assert_eq!(sink.events.last(), Some(&AppEvent::Stopped));
    assert_eq!(
        rig.actuator.calls(),
        vec![(RelayId::Pump, false), (RelayId::Light, false)]
    );
}

#[test]
fn manual_toggle_after_shutdown_is_refused() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[50.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    let shutdown = ShutdownSignal::new();
    let commands = CommandChannel::new();
    commands.try_send(AppCommand::Shutdown).unwrap();
    let heartbeat = CountingHeartbeat::default();
    let clock = ManualClock::default();
    let mut delay = MockDelay {
        clock: &clock,
        shutdown: &shutdown,
        stop_after_ms: None,
        slept_ms: 0,
    };
    assert_eq!(
        app.run(&mut rig.io(), &mut sink, &mut delay, &heartbeat, &shutdown, &commands),
        Ok(())
    );
    let calls_at_stop = rig.actuator.calls().len();

    let mut manual = ManualControl::new(&rig.relays, 4);
    for relay in RelayId::ALL {
        assert_eq!(
            manual.toggle(relay, true, &rig.journal, &rig.clock),
            Err(RelayError::Stopped)
        );
    }

    assert!(rig.relays.is_locked_out());
    assert_eq!(rig.relays.snapshot(), [false, false]);
    assert_eq!(rig.actuator.calls().len(), calls_at_stop, "no write after shutdown");
    let events = rig.journal.relay_events().unwrap();
    for relay in RelayId::ALL {
        let last = events.iter().rev().find(|e| e.item.relay_id == relay).unwrap();
        assert_eq!(last.item.action, RelayAction::Off);
    }
}

#[test]
fn dirty_config_is_flushed_on_shutdown() {
    let mut rig = Rig::new(ScriptedSensors::from_percents(&[50.0]));
    let mut app = rig.calibrated_app();
    let mut sink = RecordingSink::new();

    let new_cfg = SystemConfig {
        cooldown_secs: 42,
        ..test_config()
    };
    app.handle_command(AppCommand::UpdateConfig(new_cfg.clone()), &mut rig.io(), &mut sink)
        .unwrap();
    app.shutdown(&mut rig.io(), &mut sink);

    assert!(!app.is_config_dirty());
    assert_eq!(rig.store.load(), Ok(new_cfg));
}
