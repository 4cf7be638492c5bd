use crate::{BitVector, EthSpec, Hash256, SignedRoot, Slot};
use bls::SignatureBytes;
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// The payload-timeliness committee's vote on whether the slot's execution payload was revealed
/// in time (ePBS).
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct PayloadAttestationData {
    pub beacon_block_root: Hash256,
    pub slot: Slot,
    pub payload_present: bool,
}

impl SignedRoot for PayloadAttestationData {}

/// An aggregated payload attestation, as included in a beacon block.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode, TreeHash, Derivative)]
#[derivative(PartialEq, Eq, Hash(bound = "E: EthSpec"))]
#[serde(bound = "E: EthSpec")]
pub struct PayloadAttestation<E: EthSpec> {
    pub aggregation_bits: BitVector<E::PtcSize>,
    pub data: PayloadAttestationData,
    pub signature: SignatureBytes,
}

impl<E: EthSpec> PayloadAttestation<E> {
    pub fn num_set_bits(&self) -> usize {
        self.aggregation_bits.num_set_bits()
    }
}

/// A single PTC member's unaggregated vote, as seen on gossip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct PayloadAttestationMessage {
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    pub data: PayloadAttestationData,
    pub signature: SignatureBytes,
}
