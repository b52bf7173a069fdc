//! Operator console driven line by line against the shared surfaces the
//! control loop uses.

use crate::mock_hw::{ManualClock, MockActuator, memory_journal, test_config};

use soilguard::adapters::journal::StorageJournal;
use soilguard::adapters::nvs::NvsAdapter;
use soilguard::app::commands::{AppCommand, CommandChannel, ShutdownSignal};
use soilguard::app::console::Console;
use soilguard::app::ports::RecordJournal;
use soilguard::app::status::StatusBoard;
use soilguard::calibration::ReferencePoint;
use soilguard::control::manual::ManualControl;
use soilguard::control::relay_manager::RelayManager;
use soilguard::fsm::StateId;
use soilguard::records::{LogRecord, RelayId, Timestamp};

struct Surfaces {
    actuator: MockActuator,
    relays: RelayManager<MockActuator>,
    journal: StorageJournal<NvsAdapter>,
    clock: ManualClock,
    status: StatusBoard,
    commands: CommandChannel,
    shutdown: ShutdownSignal,
}

impl Surfaces {
    fn new() -> Self {
        let actuator = MockActuator::new();
        Self {
            relays: RelayManager::new(actuator.clone(), &test_config()),
            actuator,
            journal: memory_journal(),
            clock: ManualClock::at(2_000),
            status: StatusBoard::new("SG-EFCAFE", "0000beef", Timestamp::default()),
            commands: CommandChannel::new(),
            shutdown: ShutdownSignal::new(),
        }
    }

    fn console(&self) -> Console<'_, MockActuator, StorageJournal<NvsAdapter>, ManualClock> {
        Console::new(
            ManualControl::new(&self.relays, 4),
            &self.journal,
            &self.clock,
            &self.status,
            &self.commands,
            &self.shutdown,
        )
    }
}

fn record(state: StateId, ms: u64) -> LogRecord {
    LogRecord {
        timestamp: Timestamp::from_uptime_ms(ms),
        air_celsius: None,
        air_humidity: None,
        soil_celsius: None,
        soil_volts: Some(2.0),
        soil_raw: Some(16_000),
        soil_percent: Some(50.0),
        lux: None,
        state,
        stable: true,
    }
}

#[test]
fn relay_toggle_reaches_the_hardware() {
    let s = Surfaces::new();
    let mut console = s.console();

    assert_eq!(console.dispatch("pump on"), "OK pump On");
    assert_eq!(console.dispatch("LIGHT on"), "OK light On");
    assert_eq!(console.dispatch("pump off"), "OK pump Off");

    assert_eq!(
        s.actuator.calls(),
        vec![
            (RelayId::Pump, true),
            (RelayId::Light, true),
            (RelayId::Pump, false),
        ]
    );
    assert_eq!(s.journal.relay_events().unwrap().len(), 3);
}

#[test]
fn status_reports_the_published_snapshot() {
    let s = Surfaces::new();
    s.status.update(|st| {
        st.state = StateId::Watering;
        st.pump_on = true;
    });

    let reply = s.console().dispatch("status");
    assert!(reply.starts_with("OK {"), "got {reply}");
    assert!(reply.contains("\"state\":\"Watering\""));
    assert!(reply.contains("\"pump_on\":true"));
}

#[test]
fn listing_returns_the_newest_entries() {
    let s = Surfaces::new();
    for i in 1..=5 {
        s.journal.append_log_record(&record(StateId::Idle, i * 1_000)).unwrap();
    }

    let reply = s.console().dispatch("logs 2");
    assert!(reply.starts_with("OK ["));
    assert!(reply.contains("\"id\":4"));
    assert!(reply.contains("\"id\":5"));
    assert!(!reply.contains("\"id\":3"));
}

#[test]
fn delete_by_selection_and_all() {
    let s = Surfaces::new();
    for i in 1..=6 {
        s.journal.append_log_record(&record(StateId::Idle, i * 1_000)).unwrap();
    }
    let mut console = s.console();

    assert_eq!(console.dispatch("delete logs 1, 3-4"), "OK deleted 3");
    let ids: Vec<u64> = s.journal.log_records().unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![2, 5, 6]);

    assert_eq!(console.dispatch("delete logs all"), "OK deleted 3");
    assert!(s.journal.log_records().unwrap().is_empty());

    let next = s.journal.append_log_record(&record(StateId::Idle, 9_000)).unwrap();
    assert_eq!(next, 7, "ids are never reused");
}

#[test]
fn loop_commands_are_queued_not_executed() {
    let s = Surfaces::new();
    let mut console = s.console();

    assert_eq!(console.dispatch("calibrate dry"), "OK queued for next cycle");
    assert_eq!(console.dispatch("save"), "OK queued for next cycle");

    assert!(matches!(
        s.commands.try_receive(),
        Ok(AppCommand::Calibrate(ReferencePoint::Dry))
    ));
    assert!(matches!(s.commands.try_receive(), Ok(AppCommand::SaveConfig)));
    assert!(s.commands.try_receive().is_err());
}

#[test]
fn full_queue_asks_the_operator_to_retry() {
    let s = Surfaces::new();
    let mut console = s.console();

    for _ in 0..8 {
        assert_eq!(console.dispatch("save"), "OK queued for next cycle");
    }
    assert_eq!(console.dispatch("save"), "ERR busy, retry");
}

#[test]
fn shutdown_raises_the_signal() {
    let s = Surfaces::new();
    assert!(!s.shutdown.is_requested());
    assert!(s.console().dispatch("shutdown").starts_with("OK"));
    assert!(s.shutdown.is_requested());
}

#[test]
fn malformed_lines_are_rejected_without_side_effects() {
    let s = Surfaces::new();
    let mut console = s.console();

    assert_eq!(console.dispatch("   "), "");
    assert!(console.dispatch("pump sideways").starts_with("ERR"));
    assert!(console.dispatch("water now").starts_with("ERR"));
    assert!(console.dispatch("delete logs 5-2").starts_with("ERR"));
    assert!(s.actuator.calls().is_empty());
}
