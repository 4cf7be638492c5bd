use crate::{BitVector, EthSpec, Hash256, SignedRoot, Slot};
use bls::SignatureBytes;
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// An aggregation of `SyncCommitteeMessage`s over a single sync subnet.
#[derive(Debug, Clone, Serialize, Deserialize, Decode, Encode, TreeHash, Derivative)]
#[derivative(PartialEq, Eq, Hash(bound = "E: EthSpec"))]
#[serde(bound = "E: EthSpec")]
pub struct SyncCommitteeContribution<E: EthSpec> {
    pub slot: Slot,
    pub beacon_block_root: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub subcommittee_index: u64,
    pub aggregation_bits: BitVector<E::SyncSubcommitteeSize>,
    pub signature: SignatureBytes,
}

impl<E: EthSpec> SyncCommitteeContribution<E> {
    /// Create a `SyncCommitteeContribution` from a single `SyncCommitteeMessage`.
    pub fn from_message(
        message: &SyncCommitteeMessage,
        subcommittee_index: u64,
        validator_sync_committee_index: usize,
    ) -> Result<Self, ssz_types::Error> {
        let mut bits = BitVector::new();
        bits.set(validator_sync_committee_index, true)?;
        Ok(Self {
            slot: message.slot,
            beacon_block_root: message.beacon_block_root,
            subcommittee_index,
            aggregation_bits: bits,
            signature: message.signature,
        })
    }

    pub fn num_set_bits(&self) -> usize {
        self.aggregation_bits.num_set_bits()
    }
}

impl<E: EthSpec> SignedRoot for SyncCommitteeContribution<E> {}

/// A single sync-committee member's vote for a beacon block root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Decode, Encode, TreeHash)]
pub struct SyncCommitteeMessage {
    pub slot: Slot,
    pub beacon_block_root: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    pub signature: SignatureBytes,
}

impl SignedRoot for SyncCommitteeMessage {}
