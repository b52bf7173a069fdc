//! Operator relay toggles.
//!
//! Toggles go straight to the [`RelayManager`], serialised against the
//! control loop by its mutex, and are tagged [`RelaySource::Manual`].
//! They never touch the watering state: the loop reconciles the pump
//! with its own desired state on the next cycle, so a manual pump toggle
//! lasts at most one cycle.  The light relay is not driven by the loop
//! and keeps whatever the operator set.
//!
//! A token bucket caps how fast an operator can switch a relay.

use burster::Limiter;
use core::time::Duration;
use log::warn;

use super::relay_manager::RelayManager;
use crate::app::ports::{ActuatorPort, Clock, RecordJournal};
use crate::error::RelayError;
use crate::records::{RelayEvent, RelayId, RelaySource};

pub struct ManualControl<'a, A> {
    relays: &'a RelayManager<A>,
    rate_limiter: burster::TokenBucket<fn() -> Duration>,
}

impl<'a, A: ActuatorPort> ManualControl<'a, A> {
    /// `burst` toggles are available immediately and refill at `burst`
    /// per second.
    pub fn new(relays: &'a RelayManager<A>, burst: u8) -> Self {
        let burst = burst.max(1);
        Self {
            relays,
            rate_limiter: burster::TokenBucket::new_with_time_provider(
                burst.into(),
                burst.into(),
                platform_now as fn() -> Duration,
            ),
        }
    }

    pub fn toggle(
        &mut self,
        relay: RelayId,
        on: bool,
        journal: &impl RecordJournal,
        clock: &impl Clock,
    ) -> Result<RelayEvent, RelayError> {
        if self.rate_limiter.try_consume(1).is_err() {
            warn!("manual {}: toggle rate limited", relay.name());
            return Err(RelayError::RateLimited);
        }
        self.relays
            .set_state(relay, on, RelaySource::Manual, clock.now(), journal)
    }
}

#[cfg(all(target_os = "espidf", feature = "espidf"))]
fn platform_now() -> Duration {
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
