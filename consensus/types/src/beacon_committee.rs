use crate::{Epoch, Slot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};

/// A committee of validators for a single slot, borrowing its member list from the committee
/// cache.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct BeaconCommittee<'a> {
    pub slot: Slot,
    pub index: u64,
    pub committee: &'a [usize],
}

impl BeaconCommittee<'_> {
    pub fn into_owned(self) -> OwnedBeaconCommittee {
        OwnedBeaconCommittee {
            slot: self.slot,
            index: self.index,
            committee: self.committee.to_vec(),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct OwnedBeaconCommittee {
    pub slot: Slot,
    pub index: u64,
    pub committee: Vec<usize>,
}

/// The duty slice a sync-committee validator holds for an epoch range.
#[derive(Debug, PartialEq, Clone)]
pub struct SyncDuty {
    pub validator_index: u64,
    pub validator_sync_committee_indices: Vec<u64>,
}

/// Identifies an epoch's shuffling: the epoch plus the block root that decided it.
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize, Encode, Decode,
)]
pub struct AttestationShufflingId {
    pub shuffling_epoch: Epoch,
    pub shuffling_decision_block: crate::Hash256,
}

impl AttestationShufflingId {
    pub fn from_components(shuffling_epoch: Epoch, shuffling_decision_block: crate::Hash256) -> Self {
        Self {
            shuffling_epoch,
            shuffling_decision_block,
        }
    }
}
