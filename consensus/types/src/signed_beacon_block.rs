use crate::{
    BeaconBlock, BeaconBlockAltair, BeaconBlockBase, BeaconBlockBellatrix, BeaconBlockBodyRef,
    BeaconBlockCapella, BeaconBlockDeneb, BeaconBlockElectra, BeaconBlockFulu, BeaconBlockGloas,
    BeaconBlockRef, BeaconStateError, ChainSpec, Domain, Epoch, EthSpec, ForkName, Hash256,
    InconsistentFork, SignedBeaconBlockHeader, SignedRoot, Slot,
};
use bls::{PublicKey, SignatureBytes};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz::Decode;
use ssz_derive::{Decode, Encode};
use std::fmt;
use superstruct::superstruct;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// A `BeaconBlock` and a signature from its proposer.
#[superstruct(
    variants(Base, Altair, Bellatrix, Capella, Deneb, Electra, Fulu, Gloas),
    variant_attributes(
        derive(
            Debug,
            Clone,
            Serialize,
            Deserialize,
            Encode,
            Decode,
            TreeHash,
            Derivative,
        ),
        derivative(PartialEq, Hash(bound = "E: EthSpec")),
        serde(bound = "E: EthSpec"),
    ),
    ref_attributes(derive(Debug)),
    partial_getter_error(ty = "BeaconStateError", expr = "BeaconStateError::IncorrectStateVariant")
)]
#[derive(Debug, Clone, Serialize, Encode, TreeHash, Derivative)]
#[derivative(PartialEq, Hash(bound = "E: EthSpec"))]
#[serde(bound = "E: EthSpec", untagged)]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct SignedBeaconBlock<E: EthSpec> {
    #[superstruct(only(Base), partial_getter(rename = "message_base"))]
    pub message: BeaconBlockBase<E>,
    #[superstruct(only(Altair), partial_getter(rename = "message_altair"))]
    pub message: BeaconBlockAltair<E>,
    #[superstruct(only(Bellatrix), partial_getter(rename = "message_bellatrix"))]
    pub message: BeaconBlockBellatrix<E>,
    #[superstruct(only(Capella), partial_getter(rename = "message_capella"))]
    pub message: BeaconBlockCapella<E>,
    #[superstruct(only(Deneb), partial_getter(rename = "message_deneb"))]
    pub message: BeaconBlockDeneb<E>,
    #[superstruct(only(Electra), partial_getter(rename = "message_electra"))]
    pub message: BeaconBlockElectra<E>,
    #[superstruct(only(Fulu), partial_getter(rename = "message_fulu"))]
    pub message: BeaconBlockFulu<E>,
    #[superstruct(only(Gloas), partial_getter(rename = "message_gloas"))]
    pub message: BeaconBlockGloas<E>,
    pub signature: SignatureBytes,
}

impl<E: EthSpec> fmt::Display for SignedBeaconBlock<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ slot {}", self.canonical_root(), self.slot())
    }
}

impl<E: EthSpec> SignedBeaconBlock<E> {
    /// Returns the name of the fork pertaining to `self`, or an error if the variant does not
    /// match the fork schedule at the block's slot.
    pub fn fork_name(&self, spec: &ChainSpec) -> Result<ForkName, InconsistentFork> {
        let fork_at_slot = spec.fork_name_at_slot::<E>(self.slot());
        let object_fork = self.fork_name_unchecked();

        if fork_at_slot == object_fork {
            Ok(object_fork)
        } else {
            Err(InconsistentFork {
                fork_at_slot,
                object_fork,
            })
        }
    }

    /// The fork of this block's structural variant.
    pub fn fork_name_unchecked(&self) -> ForkName {
        self.message().fork_name_unchecked()
    }

    /// SSZ decode with fork variant determined by the fork schedule at the block's slot.
    pub fn from_ssz_bytes(bytes: &[u8], spec: &ChainSpec) -> Result<Self, ssz::DecodeError> {
        // The message is behind a 4-byte offset, followed immediately by the slot.
        let slot_len = <Slot as Decode>::ssz_fixed_len();
        let slot_bytes = bytes
            .get(4..4 + slot_len)
            .ok_or(ssz::DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: 4 + slot_len,
            })?;

        let slot = Slot::from_ssz_bytes(slot_bytes)?;
        let fork_at_slot = spec.fork_name_at_slot::<E>(slot);

        Self::from_ssz_bytes_for_fork(bytes, fork_at_slot)
    }

    /// SSZ decode as the variant for a known fork.
    pub fn from_ssz_bytes_for_fork(
        bytes: &[u8],
        fork_name: ForkName,
    ) -> Result<Self, ssz::DecodeError> {
        Ok(match fork_name {
            ForkName::Base => Self::Base(SignedBeaconBlockBase::from_ssz_bytes(bytes)?),
            ForkName::Altair => Self::Altair(SignedBeaconBlockAltair::from_ssz_bytes(bytes)?),
            ForkName::Bellatrix => {
                Self::Bellatrix(SignedBeaconBlockBellatrix::from_ssz_bytes(bytes)?)
            }
            ForkName::Capella => Self::Capella(SignedBeaconBlockCapella::from_ssz_bytes(bytes)?),
            ForkName::Deneb => Self::Deneb(SignedBeaconBlockDeneb::from_ssz_bytes(bytes)?),
            ForkName::Electra => Self::Electra(SignedBeaconBlockElectra::from_ssz_bytes(bytes)?),
            ForkName::Fulu => Self::Fulu(SignedBeaconBlockFulu::from_ssz_bytes(bytes)?),
            ForkName::Gloas => Self::Gloas(SignedBeaconBlockGloas::from_ssz_bytes(bytes)?),
        })
    }

    /// Create a new `SignedBeaconBlock` from a block and signature.
    pub fn from_block(block: BeaconBlock<E>, signature: SignatureBytes) -> Self {
        match block {
            BeaconBlock::Base(message) => {
                SignedBeaconBlock::Base(SignedBeaconBlockBase { message, signature })
            }
            BeaconBlock::Altair(message) => {
                SignedBeaconBlock::Altair(SignedBeaconBlockAltair { message, signature })
            }
            BeaconBlock::Bellatrix(message) => {
                SignedBeaconBlock::Bellatrix(SignedBeaconBlockBellatrix { message, signature })
            }
            BeaconBlock::Capella(message) => {
                SignedBeaconBlock::Capella(SignedBeaconBlockCapella { message, signature })
            }
            BeaconBlock::Deneb(message) => {
                SignedBeaconBlock::Deneb(SignedBeaconBlockDeneb { message, signature })
            }
            BeaconBlock::Electra(message) => {
                SignedBeaconBlock::Electra(SignedBeaconBlockElectra { message, signature })
            }
            BeaconBlock::Fulu(message) => {
                SignedBeaconBlock::Fulu(SignedBeaconBlockFulu { message, signature })
            }
            BeaconBlock::Gloas(message) => {
                SignedBeaconBlock::Gloas(SignedBeaconBlockGloas { message, signature })
            }
        }
    }

    /// Deconstruct the `SignedBeaconBlock` into a `BeaconBlock` and `SignatureBytes`.
    ///
    /// This is necessary to get a `&BeaconBlock` from a `SignedBeaconBlock`.
    pub fn deconstruct(self) -> (BeaconBlock<E>, SignatureBytes) {
        match self {
            SignedBeaconBlock::Base(block) => (BeaconBlock::Base(block.message), block.signature),
            SignedBeaconBlock::Altair(block) => {
                (BeaconBlock::Altair(block.message), block.signature)
            }
            SignedBeaconBlock::Bellatrix(block) => {
                (BeaconBlock::Bellatrix(block.message), block.signature)
            }
            SignedBeaconBlock::Capella(block) => {
                (BeaconBlock::Capella(block.message), block.signature)
            }
            SignedBeaconBlock::Deneb(block) => (BeaconBlock::Deneb(block.message), block.signature),
            SignedBeaconBlock::Electra(block) => {
                (BeaconBlock::Electra(block.message), block.signature)
            }
            SignedBeaconBlock::Fulu(block) => (BeaconBlock::Fulu(block.message), block.signature),
            SignedBeaconBlock::Gloas(block) => (BeaconBlock::Gloas(block.message), block.signature),
        }
    }

    /// Accessor for the block's `message` field as a ref.
    pub fn message(&self) -> BeaconBlockRef<'_, E> {
        match self {
            SignedBeaconBlock::Base(inner) => BeaconBlockRef::Base(&inner.message),
            SignedBeaconBlock::Altair(inner) => BeaconBlockRef::Altair(&inner.message),
            SignedBeaconBlock::Bellatrix(inner) => BeaconBlockRef::Bellatrix(&inner.message),
            SignedBeaconBlock::Capella(inner) => BeaconBlockRef::Capella(&inner.message),
            SignedBeaconBlock::Deneb(inner) => BeaconBlockRef::Deneb(&inner.message),
            SignedBeaconBlock::Electra(inner) => BeaconBlockRef::Electra(&inner.message),
            SignedBeaconBlock::Fulu(inner) => BeaconBlockRef::Fulu(&inner.message),
            SignedBeaconBlock::Gloas(inner) => BeaconBlockRef::Gloas(&inner.message),
        }
    }

    /// Convenience accessor for the block's body.
    pub fn body(&self) -> BeaconBlockBodyRef<'_, E> {
        self.message().body()
    }

    /// Verify `self.signature`.
    ///
    /// If the root of `block.message` is already known it can be passed in via `object_root_opt`.
    /// Otherwise, it will be computed locally.
    pub fn verify_signature(
        &self,
        object_root_opt: Option<Hash256>,
        pubkey: &PublicKey,
        fork: &crate::Fork,
        genesis_validators_root: Hash256,
        spec: &ChainSpec,
    ) -> bool {
        let domain = spec.get_domain(
            self.epoch(),
            Domain::BeaconProposer,
            fork,
            genesis_validators_root,
        );

        let message = if let Some(object_root) = object_root_opt {
            crate::SigningData {
                object_root,
                domain,
            }
            .tree_hash_root()
        } else {
            self.message().signing_root(domain)
        };

        self.signature()
            .decompress()
            .map(|signature| signature.verify(message, pubkey))
            .unwrap_or(false)
    }

    /// Produce a signed beacon block header corresponding to this block.
    pub fn signed_block_header(&self) -> SignedBeaconBlockHeader {
        SignedBeaconBlockHeader {
            message: self.message().block_header(),
            signature: *self.signature(),
        }
    }

    /// Convenience accessor for the block's slot.
    pub fn slot(&self) -> Slot {
        self.message().slot()
    }

    /// Convenience accessor for the block's epoch.
    pub fn epoch(&self) -> Epoch {
        self.slot().epoch(E::slots_per_epoch())
    }

    /// Convenience accessor for the block's parent root.
    pub fn parent_root(&self) -> Hash256 {
        self.message().parent_root()
    }

    /// Convenience accessor for the block's state root.
    pub fn state_root(&self) -> Hash256 {
        self.message().state_root()
    }

    /// Returns the `tree_hash_root` of the block's `message`, which is what the block root is.
    pub fn canonical_root(&self) -> Hash256 {
        self.message().tree_hash_root()
    }

    /// The number of blob KZG commitments the block carries (zero pre-deneb).
    pub fn num_expected_blobs(&self) -> usize {
        self.message().body().blob_kzg_commitments_len()
    }
}

impl<E: EthSpec> SignedBeaconBlockRef<'_, E> {
    pub fn slot(&self) -> Slot {
        match self {
            SignedBeaconBlockRef::Base(block) => block.message.slot,
            SignedBeaconBlockRef::Altair(block) => block.message.slot,
            SignedBeaconBlockRef::Bellatrix(block) => block.message.slot,
            SignedBeaconBlockRef::Capella(block) => block.message.slot,
            SignedBeaconBlockRef::Deneb(block) => block.message.slot,
            SignedBeaconBlockRef::Electra(block) => block.message.slot,
            SignedBeaconBlockRef::Fulu(block) => block.message.slot,
            SignedBeaconBlockRef::Gloas(block) => block.message.slot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_base_block;
    use crate::MainnetEthSpec;
    use ssz::Encode;

    type E = MainnetEthSpec;

    #[test]
    fn round_trip_and_roots() {
        let block = sample_base_block::<E>(Slot::new(3));
        let signed = SignedBeaconBlock::from_block(block.clone(), SignatureBytes::empty());

        assert_eq!(signed.canonical_root(), block.canonical_root());
        assert_eq!(
            signed.signed_block_header().message,
            block.block_header()
        );

        let bytes = signed.as_ssz_bytes();
        let spec = ChainSpec::mainnet();
        let decoded = SignedBeaconBlock::<E>::from_ssz_bytes(&bytes, &spec).unwrap();
        assert_eq!(decoded, signed);
    }
}
