//! RelayManager behaviour seen through the journal: idempotent commands,
//! manual rate limiting, interlocks and the fault latch.

use crate::mock_hw::{ManualClock, MockActuator, memory_journal, test_config};

use soilguard::app::ports::RecordJournal;
use soilguard::config::SystemConfig;
use soilguard::control::interlock::InterlockRule;
use soilguard::control::manual::ManualControl;
use soilguard::control::relay_manager::RelayManager;
use soilguard::error::{ActuatorError, RelayError};
use soilguard::records::{RelayAction, RelayId, RelaySource, Timestamp};

const T0: Timestamp = Timestamp::from_uptime_ms(0);

#[test]
fn repeated_command_drives_once_and_records_twice() {
    let actuator = MockActuator::new();
    let relays = RelayManager::new(actuator.clone(), &test_config());
    let journal = memory_journal();

    relays
        .set_state(RelayId::Pump, true, RelaySource::Auto, T0, &journal)
        .unwrap();
    relays
        .set_state(RelayId::Pump, true, RelaySource::Auto, T0, &journal)
        .unwrap();

    assert_eq!(actuator.calls(), vec![(RelayId::Pump, true)]);
    let events = journal.relay_events().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.item.action == RelayAction::On));
    assert_eq!(events[1].id, 2);
}

#[test]
fn manual_toggles_are_rate_limited() {
    let actuator = MockActuator::new();
    let relays = RelayManager::new(actuator.clone(), &test_config());
    let journal = memory_journal();
    let clock = ManualClock::at(500);
    let mut manual = ManualControl::new(&relays, 2);

    manual.toggle(RelayId::Light, true, &journal, &clock).unwrap();
    manual.toggle(RelayId::Light, false, &journal, &clock).unwrap();
    assert_eq!(
        manual.toggle(RelayId::Light, true, &journal, &clock),
        Err(RelayError::RateLimited)
    );

    assert!(!relays.is_on(RelayId::Light));
    assert_eq!(
        actuator.calls(),
        vec![(RelayId::Light, true), (RelayId::Light, false)]
    );
    let events = journal.relay_events().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.item.source == RelaySource::Manual));
    assert_eq!(events[0].item.timestamp.uptime_ms, 500);
}

#[test]
fn interlock_blocks_on_but_never_off() {
    let mut config = test_config();
    config
        .interlocks
        .push(InterlockRule::MutuallyExclusive(RelayId::Pump, RelayId::Light))
        .unwrap();
    let actuator = MockActuator::new();
    let relays = RelayManager::new(actuator.clone(), &config);
    let journal = memory_journal();

    relays
        .set_state(RelayId::Light, true, RelaySource::Manual, T0, &journal)
        .unwrap();
    assert_eq!(
        relays.set_state(RelayId::Pump, true, RelaySource::Auto, T0, &journal),
        Err(RelayError::InterlockViolation {
            requested: RelayId::Pump,
            conflicting: RelayId::Light,
        })
    );
    assert!(!relays.is_on(RelayId::Pump));
    assert_eq!(journal.relay_events().unwrap().len(), 1, "rejected command leaves no event");

    relays
        .set_state(RelayId::Light, false, RelaySource::Manual, T0, &journal)
        .unwrap();
    relays
        .set_state(RelayId::Pump, true, RelaySource::Auto, T0, &journal)
        .unwrap();
    assert!(relays.is_on(RelayId::Pump));
}

#[test]
fn reconfigured_interlocks_apply_immediately() {
    let actuator = MockActuator::new();
    let relays = RelayManager::new(actuator, &SystemConfig::default());
    let journal = memory_journal();

    relays
        .set_state(RelayId::Pump, true, RelaySource::Auto, T0, &journal)
        .unwrap();

    let mut config = SystemConfig::default();
    config
        .interlocks
        .push(InterlockRule::MutuallyExclusive(RelayId::Light, RelayId::Pump))
        .unwrap();
    relays.configure(&config);

    assert!(matches!(
        relays.set_state(RelayId::Light, true, RelaySource::Manual, T0, &journal),
        Err(RelayError::InterlockViolation { .. })
    ));
}

#[test]
fn fault_latch_refuses_commands_but_force_off_still_drives() {
    let actuator = MockActuator::new();
    let relays = RelayManager::new(actuator.clone(), &test_config());
    let journal = memory_journal();

    actuator.set_broken(true);
    assert_eq!(
        relays.set_state(RelayId::Pump, true, RelaySource::Auto, T0, &journal),
        Err(RelayError::ActuatorFault(ActuatorError::GpioWriteFailed))
    );
    assert!(relays.is_faulted());

    actuator.set_broken(false);
    assert_eq!(
        relays.set_state(RelayId::Light, true, RelaySource::Manual, T0, &journal),
        Err(RelayError::ActuatorFault(ActuatorError::GpioWriteFailed)),
        "latched until reboot"
    );

    relays.force_all_off(T0, &journal).unwrap();
    let tail: Vec<_> = actuator.calls().into_iter().rev().take(2).collect();
    assert_eq!(tail, vec![(RelayId::Light, false), (RelayId::Pump, false)]);
    assert_eq!(journal.relay_events().unwrap().len(), 2);
}

#[test]
fn force_all_off_records_only_confirmed_writes() {
    let actuator = MockActuator::new();
    let relays = RelayManager::new(actuator.clone(), &test_config());
    let journal = memory_journal();

    actuator.set_broken(true);
    assert!(relays.force_all_off(T0, &journal).is_err());
    assert!(journal.relay_events().unwrap().is_empty());
    assert_eq!(actuator.calls().len(), 6, "three attempts per relay");
}
