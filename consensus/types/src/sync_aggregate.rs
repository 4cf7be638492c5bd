use crate::{BitVector, EthSpec};
use bls::{AggregateSignature, SignatureBytes};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// The aggregated sync-committee signature included in a block body.
#[derive(Debug, Clone, Serialize, Deserialize, Decode, Encode, TreeHash, Derivative)]
#[derivative(PartialEq, Eq, Hash(bound = "E: EthSpec"))]
#[serde(bound = "E: EthSpec")]
pub struct SyncAggregate<E: EthSpec> {
    pub sync_committee_bits: BitVector<E::SyncCommitteeSize>,
    pub sync_committee_signature: SignatureBytes,
}

impl<E: EthSpec> SyncAggregate<E> {
    /// New aggregate to be used as the seed for aggregating other signatures.
    ///
    /// The signature is the G2 point at infinity, which aggregates with anything.
    pub fn new() -> Self {
        Self {
            sync_committee_bits: BitVector::new(),
            sync_committee_signature: SignatureBytes::from(&AggregateSignature::infinity()),
        }
    }

    /// Empty aggregate to be used at genesis.
    pub fn empty() -> Self {
        Self::new()
    }

    /// Returns how many bits are `true` in the aggregate.
    pub fn num_set_bits(&self) -> usize {
        self.sync_committee_bits.num_set_bits()
    }
}

impl<E: EthSpec> Default for SyncAggregate<E> {
    fn default() -> Self {
        Self::new()
    }
}
