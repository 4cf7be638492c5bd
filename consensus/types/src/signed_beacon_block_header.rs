use crate::{BeaconBlockHeader, ChainSpec, Domain, Epoch, EthSpec, Fork, Hash256, SignedRoot};
use bls::{PublicKey, SignatureBytes};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// A signed header of a `BeaconBlock`.
///
/// Spec v0.12.1
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
    pub signature: SignatureBytes,
}

impl SignedBeaconBlockHeader {
    /// Verify that this block header was signed by `pubkey`.
    pub fn verify_signature<E: EthSpec>(
        &self,
        pubkey: &PublicKey,
        fork: &Fork,
        genesis_validators_root: Hash256,
        spec: &ChainSpec,
    ) -> bool {
        let domain = spec.get_domain(
            self.message.slot.epoch(E::slots_per_epoch()),
            Domain::BeaconProposer,
            fork,
            genesis_validators_root,
        );

        let message = self.message.signing_root(domain);

        self.signature
            .decompress()
            .map(|signature| signature.verify(message, pubkey))
            .unwrap_or(false)
    }

    /// The epoch associated with the header's slot, using the `E` preset.
    pub fn epoch<E: EthSpec>(&self) -> Epoch {
        self.message.slot.epoch(E::slots_per_epoch())
    }
}
