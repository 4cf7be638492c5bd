//! Provides the `SlotClock` trait, tracking the current slot from a genesis instant and a slot
//! duration.

mod manual_slot_clock;
mod system_time_slot_clock;

use std::time::Duration;

pub use crate::manual_slot_clock::ManualSlotClock;
pub use crate::system_time_slot_clock::SystemTimeSlotClock;
pub use types::Slot;

/// A clock that reports the current slot.
///
/// The clock is not required to be monotonically increasing and may go backwards if the
/// underlying clock does.
pub trait SlotClock: Send + Sync + Sized + Clone {
    /// Creates a new slot clock where the first slot is `genesis_slot`, genesis occurred
    /// `genesis_duration` after the `UNIX_EPOCH` and each slot is `slot_duration` apart.
    fn new(genesis_slot: Slot, genesis_duration: Duration, slot_duration: Duration) -> Self;

    /// Returns the slot at this present time.
    fn now(&self) -> Option<Slot>;

    /// Returns the present time as a duration since the `UNIX_EPOCH`.
    fn now_duration(&self) -> Option<Duration>;

    /// Returns the slot of the given duration since the `UNIX_EPOCH`.
    fn slot_of(&self, now: Duration) -> Option<Slot>;

    /// Returns the duration between slots.
    fn slot_duration(&self) -> Duration;

    /// Returns the duration from now until `slot`.
    fn duration_to_slot(&self, slot: Slot) -> Option<Duration>;

    /// Returns the duration until the next slot.
    fn duration_to_next_slot(&self) -> Option<Duration>;

    /// Returns the start time of the slot, as a duration since `UNIX_EPOCH`.
    fn start_of(&self, slot: Slot) -> Option<Duration>;

    /// Returns the first slot to be returned at the genesis time.
    fn genesis_slot(&self) -> Slot;

    /// Returns the duration since the `UNIX_EPOCH` at the genesis time.
    fn genesis_duration(&self) -> Duration;

    /// Returns the slot if the internal clock were advanced by `duration`.
    fn now_with_future_tolerance(&self, tolerance: Duration) -> Option<Slot> {
        self.slot_of(self.now_duration()?.checked_add(tolerance)?)
    }

    /// Returns the slot if the internal clock were reversed by `duration`.
    fn now_with_past_tolerance(&self, tolerance: Duration) -> Option<Slot> {
        self.slot_of(self.now_duration()?.checked_sub(tolerance)?)
            .or_else(|| Some(self.genesis_slot()))
    }

    /// Returns the delay between the start of the slot and when a block should be proposed.
    ///
    /// There is no delay for block proposals: they must happen at the start of the slot.
    fn proposal_delay(&self) -> Duration {
        Duration::from_secs(0)
    }

    /// Returns the delay between the start of the slot and when an attestation should be
    /// produced: one third into the slot.
    fn unagg_attestation_production_delay(&self) -> Duration {
        self.slot_duration() / 3
    }

    /// Returns the delay between the start of the slot and when aggregated attestations should
    /// be produced: two thirds into the slot.
    fn agg_attestation_production_delay(&self) -> Duration {
        self.slot_duration() * 2 / 3
    }

    /// Returns the duration since the start of the current slot.
    fn seconds_from_current_slot_start(&self) -> Option<Duration> {
        let now = self.now_duration()?;
        let slot_start = self.start_of(self.now()?)?;
        now.checked_sub(slot_start)
    }
}
