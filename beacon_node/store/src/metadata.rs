use ssz_derive::{Decode, Encode};
use types::{Hash256, Slot};

/// Database record describing the checkpoint that the node was bootstrapped from.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct AnchorInfo {
    /// The slot at which the anchor state is present and which we cannot revert.
    pub anchor_slot: Slot,
    /// The slot of the earliest block stored in the database.
    pub oldest_block_slot: Slot,
    /// The parent root of the earliest block stored, used to extend backfill.
    pub oldest_block_parent: Hash256,
    /// The slot before which states are not stored.
    pub state_upper_limit: Slot,
}

impl AnchorInfo {
    /// Returns `true` if historical blocks all the way back to genesis are stored.
    pub fn block_backfill_complete(&self) -> bool {
        self.oldest_block_slot == Slot::new(0)
    }
}

/// A contiguous range of historical slots that backfill sync has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct BackfilledRange {
    pub finalized_slot: Slot,
    pub anchor_slot: Slot,
}
