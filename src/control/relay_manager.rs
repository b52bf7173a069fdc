//! `RelayManager`: the single owner of physical relay state.
//!
//! Every command, automatic or manual, runs inside one blocking-mutex
//! section that covers the state read-modify-write, the driver call and
//! the audit append, so the relay level and the journal can never
//! disagree about the order of events.
//!
//! ```text
//!  set_state(relay, on, source)
//!    ├─ shut down?          → Stopped (latched)
//!    ├─ faulted?            → ActuatorFault (latched)
//!    ├─ already in state?   → no driver call, audit event only
//!    ├─ on && interlock?    → InterlockViolation, nothing changes
//!    ├─ drive with retries  → ActuatorFault + latch on exhaustion
//!    └─ append RelayEvent   → Journal error after the physical change
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{error, info, warn};

use super::interlock::{self, InterlockRule};
use crate::app::ports::{ActuatorPort, RecordJournal};
use crate::config::{MAX_INTERLOCKS, SystemConfig};
use crate::error::{ActuatorError, RelayError};
use crate::records::{RelayAction, RelayEvent, RelayId, RelaySource, Timestamp};

struct Inner<A> {
    actuator: A,
    states: [bool; RelayId::COUNT],
    /// Set once retries are exhausted; only `force_all_off` still drives.
    fault: Option<ActuatorError>,
    /// Set by `shut_down`; no command drives a relay afterwards.
    locked_out: bool,
    interlocks: heapless::Vec<InterlockRule, MAX_INTERLOCKS>,
    retry_attempts: u8,
}

impl<A: ActuatorPort> Inner<A> {
    fn drive(&mut self, relay: RelayId, on: bool) -> Result<(), ActuatorError> {
        let attempts = self.retry_attempts.max(1);
        let mut last = ActuatorError::GpioWriteFailed;
        for attempt in 1..=attempts {
            match self.actuator.set_relay(relay, on) {
                Ok(()) => {
                    self.states[relay.index()] = on;
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "relay {}: write {} failed ({e}), attempt {attempt}/{attempts}",
                        relay.name(),
                        if on { "ON" } else { "OFF" }
                    );
                    last = e;
                }
            }
        }
        Err(last)
    }

    fn force_all_off(&mut self, at: Timestamp, journal: &impl RecordJournal) -> Result<(), RelayError> {
        let mut first_err = None;

        for relay in RelayId::ALL {
            if let Err(e) = self.drive(relay, false) {
                error!("relay {}: forced OFF failed ({e})", relay.name());
                first_err = first_err.or(Some(RelayError::ActuatorFault(e)));
                continue;
            }
            let event = RelayEvent {
                relay_id: relay,
                action: RelayAction::Off,
                source: RelaySource::Auto,
                timestamp: at,
            };
            if let Err(e) = journal.append_relay_event(&event) {
                error!("relay {}: audit append failed: {e}", relay.name());
                first_err = first_err.or(Some(RelayError::Journal(e)));
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => {
                info!("all relays forced OFF");
                Ok(())
            }
        }
    }
}

pub struct RelayManager<A> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<A>>>,
}

impl<A: ActuatorPort> RelayManager<A> {
    /// All relays are assumed off; call [`force_all_off`](Self::force_all_off)
    /// at startup to make that true.
    pub fn new(actuator: A, config: &SystemConfig) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                actuator,
                states: [false; RelayId::COUNT],
                fault: None,
                locked_out: false,
                interlocks: config.interlocks.clone(),
                retry_attempts: config.actuator_retry_attempts,
            })),
        }
    }

    /// Apply interlock rules and the retry budget from a new config.
    pub fn configure(&self, config: &SystemConfig) {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            inner.interlocks = config.interlocks.clone();
            inner.retry_attempts = config.actuator_retry_attempts;
        });
    }

    pub fn set_state(
        &self,
        relay: RelayId,
        on: bool,
        source: RelaySource,
        at: Timestamp,
        journal: &impl RecordJournal,
    ) -> Result<RelayEvent, RelayError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();

            if inner.locked_out {
                return Err(RelayError::Stopped);
            }
            if let Some(fault) = inner.fault {
                return Err(RelayError::ActuatorFault(fault));
            }

            if inner.states[relay.index()] != on {
                if on {
                    interlock::check(&inner.interlocks, relay, &inner.states).inspect_err(|e| {
                        warn!("relay {}: {e}", relay.name());
                    })?;
                }
                if let Err(e) = inner.drive(relay, on) {
                    error!("relay {}: giving up, actuator faulted ({e})", relay.name());
                    inner.fault = Some(e);
                    return Err(RelayError::ActuatorFault(e));
                }
                info!(
                    "relay {} -> {} ({:?})",
                    relay.name(),
                    if on { "ON" } else { "OFF" },
                    source
                );
            }

            let event = RelayEvent {
                relay_id: relay,
                action: RelayAction::from_on(on),
                source,
                timestamp: at,
            };
            journal.append_relay_event(&event).map_err(|e| {
                error!("relay {}: audit append failed: {e}", relay.name());
                RelayError::Journal(e)
            })?;
            Ok(event)
        })
    }

    /// Drive every relay off, ignoring idempotence, interlocks and the
    /// fault latch.  An Off event is recorded for each relay that
    /// confirmed the write.  Every relay is attempted; the first error is
    /// returned.
    pub fn force_all_off(&self, at: Timestamp, journal: &impl RecordJournal) -> Result<(), RelayError> {
        self.inner.lock(|cell| cell.borrow_mut().force_all_off(at, journal))
    }

    /// Final safe state: latch out every later command, then force all
    /// relays off, in one critical section so no toggle can slip in
    /// between.
    pub fn shut_down(&self, at: Timestamp, journal: &impl RecordJournal) -> Result<(), RelayError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            inner.locked_out = true;
            inner.force_all_off(at, journal)
        })
    }

    pub fn is_locked_out(&self) -> bool {
        self.inner.lock(|cell| cell.borrow().locked_out)
    }

    pub fn is_on(&self, relay: RelayId) -> bool {
        self.inner.lock(|cell| cell.borrow().states[relay.index()])
    }

    pub fn snapshot(&self) -> [bool; RelayId::COUNT] {
        self.inner.lock(|cell| cell.borrow().states)
    }

    pub fn fault(&self) -> Option<ActuatorError> {
        self.inner.lock(|cell| cell.borrow().fault)
    }

    pub fn is_faulted(&self) -> bool {
        self.fault().is_some()
    }
}
