use crate::{
    BeaconBlockBody, BeaconBlockBodyAltair, BeaconBlockBodyBase, BeaconBlockBodyBellatrix,
    BeaconBlockBodyCapella, BeaconBlockBodyDeneb, BeaconBlockBodyElectra, BeaconBlockBodyFulu,
    BeaconBlockBodyGloas, BeaconBlockBodyRef, BeaconBlockHeader, BeaconStateError, ChainSpec,
    Epoch, EthSpec, ForkName, Hash256, SignedRoot, Slot,
};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz::Decode;
use ssz_derive::{Decode, Encode};
use superstruct::superstruct;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// A block of the `BeaconChain`.
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
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    ref_attributes(
        derive(Debug),
    ),
    partial_getter_error(ty = "BeaconStateError", expr = "BeaconStateError::IncorrectStateVariant")
)]
#[derive(Debug, Clone, Serialize, Encode, TreeHash, Derivative)]
#[derivative(PartialEq, Hash(bound = "E: EthSpec"))]
#[serde(bound = "E: EthSpec", untagged)]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct BeaconBlock<E: EthSpec> {
    #[superstruct(getter(copy))]
    pub slot: Slot,
    #[superstruct(getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_index: u64,
    #[superstruct(getter(copy))]
    pub parent_root: Hash256,
    #[superstruct(getter(copy))]
    pub state_root: Hash256,
    #[superstruct(only(Base), partial_getter(rename = "body_base"))]
    pub body: BeaconBlockBodyBase<E>,
    #[superstruct(only(Altair), partial_getter(rename = "body_altair"))]
    pub body: BeaconBlockBodyAltair<E>,
    #[superstruct(only(Bellatrix), partial_getter(rename = "body_bellatrix"))]
    pub body: BeaconBlockBodyBellatrix<E>,
    #[superstruct(only(Capella), partial_getter(rename = "body_capella"))]
    pub body: BeaconBlockBodyCapella<E>,
    #[superstruct(only(Deneb), partial_getter(rename = "body_deneb"))]
    pub body: BeaconBlockBodyDeneb<E>,
    #[superstruct(only(Electra), partial_getter(rename = "body_electra"))]
    pub body: BeaconBlockBodyElectra<E>,
    #[superstruct(only(Fulu), partial_getter(rename = "body_fulu"))]
    pub body: BeaconBlockBodyFulu<E>,
    #[superstruct(only(Gloas), partial_getter(rename = "body_gloas"))]
    pub body: BeaconBlockBodyGloas<E>,
}

impl<E: EthSpec> SignedRoot for BeaconBlock<E> {}
impl<E: EthSpec> SignedRoot for BeaconBlockRef<'_, E> {}

impl<E: EthSpec> BeaconBlock<E> {
    /// The fork of this block's structural variant.
    pub fn fork_name_unchecked(&self) -> ForkName {
        match self {
            BeaconBlock::Base(_) => ForkName::Base,
            BeaconBlock::Altair(_) => ForkName::Altair,
            BeaconBlock::Bellatrix(_) => ForkName::Bellatrix,
            BeaconBlock::Capella(_) => ForkName::Capella,
            BeaconBlock::Deneb(_) => ForkName::Deneb,
            BeaconBlock::Electra(_) => ForkName::Electra,
            BeaconBlock::Fulu(_) => ForkName::Fulu,
            BeaconBlock::Gloas(_) => ForkName::Gloas,
        }
    }

    /// Decode `bytes` as the variant dictated by the fork schedule at the block's slot.
    ///
    /// The slot occupies the first fixed-length field in every variant, so it can be read
    /// without knowing the fork up front.
    pub fn from_ssz_bytes(bytes: &[u8], spec: &ChainSpec) -> Result<Self, ssz::DecodeError> {
        let slot_len = <Slot as Decode>::ssz_fixed_len();
        let slot_bytes =
            bytes
                .get(0..slot_len)
                .ok_or(ssz::DecodeError::InvalidByteLength {
                    len: bytes.len(),
                    expected: slot_len,
                })?;

        let slot = Slot::from_ssz_bytes(slot_bytes)?;
        let fork_at_slot = spec.fork_name_at_slot::<E>(slot);

        Self::from_ssz_bytes_for_fork(bytes, fork_at_slot)
    }

    /// Decode `bytes` as the variant for a known fork.
    pub fn from_ssz_bytes_for_fork(
        bytes: &[u8],
        fork_name: ForkName,
    ) -> Result<Self, ssz::DecodeError> {
        Ok(match fork_name {
            ForkName::Base => Self::Base(BeaconBlockBase::from_ssz_bytes(bytes)?),
            ForkName::Altair => Self::Altair(BeaconBlockAltair::from_ssz_bytes(bytes)?),
            ForkName::Bellatrix => Self::Bellatrix(BeaconBlockBellatrix::from_ssz_bytes(bytes)?),
            ForkName::Capella => Self::Capella(BeaconBlockCapella::from_ssz_bytes(bytes)?),
            ForkName::Deneb => Self::Deneb(BeaconBlockDeneb::from_ssz_bytes(bytes)?),
            ForkName::Electra => Self::Electra(BeaconBlockElectra::from_ssz_bytes(bytes)?),
            ForkName::Fulu => Self::Fulu(BeaconBlockFulu::from_ssz_bytes(bytes)?),
            ForkName::Gloas => Self::Gloas(BeaconBlockGloas::from_ssz_bytes(bytes)?),
        })
    }

    /// Returns an empty block of the fork the schedule dictates at the genesis slot.
    pub fn empty(spec: &ChainSpec) -> Self {
        let slot = spec.genesis_slot;
        match spec.fork_name_at_slot::<E>(slot) {
            ForkName::Base => BeaconBlock::Base(BeaconBlockBase {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyBase {
                    randao_reveal: bls::SignatureBytes::empty(),
                    eth1_data: crate::Eth1Data::default(),
                    graffiti: crate::Graffiti::default(),
                    proposer_slashings: Default::default(),
                    attester_slashings: Default::default(),
                    attestations: Default::default(),
                    deposits: Default::default(),
                    voluntary_exits: Default::default(),
                },
            }),
            ForkName::Altair => BeaconBlock::Altair(BeaconBlockAltair {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyAltair {
                    randao_reveal: bls::SignatureBytes::empty(),
                    eth1_data: crate::Eth1Data::default(),
                    graffiti: crate::Graffiti::default(),
                    proposer_slashings: Default::default(),
                    attester_slashings: Default::default(),
                    attestations: Default::default(),
                    deposits: Default::default(),
                    voluntary_exits: Default::default(),
                    sync_aggregate: crate::SyncAggregate::new(),
                },
            }),
            ForkName::Bellatrix => BeaconBlock::Bellatrix(BeaconBlockBellatrix {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyBellatrix {
                    randao_reveal: bls::SignatureBytes::empty(),
                    eth1_data: crate::Eth1Data::default(),
                    graffiti: crate::Graffiti::default(),
                    proposer_slashings: Default::default(),
                    attester_slashings: Default::default(),
                    attestations: Default::default(),
                    deposits: Default::default(),
                    voluntary_exits: Default::default(),
                    sync_aggregate: crate::SyncAggregate::new(),
                    execution_payload: Default::default(),
                },
            }),
            ForkName::Capella => BeaconBlock::Capella(BeaconBlockCapella {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyCapella {
                    randao_reveal: bls::SignatureBytes::empty(),
                    eth1_data: crate::Eth1Data::default(),
                    graffiti: crate::Graffiti::default(),
                    proposer_slashings: Default::default(),
                    attester_slashings: Default::default(),
                    attestations: Default::default(),
                    deposits: Default::default(),
                    voluntary_exits: Default::default(),
                    sync_aggregate: crate::SyncAggregate::new(),
                    execution_payload: Default::default(),
                    bls_to_execution_changes: Default::default(),
                },
            }),
            ForkName::Deneb => BeaconBlock::Deneb(BeaconBlockDeneb {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyDeneb {
                    randao_reveal: bls::SignatureBytes::empty(),
                    eth1_data: crate::Eth1Data::default(),
                    graffiti: crate::Graffiti::default(),
                    proposer_slashings: Default::default(),
                    attester_slashings: Default::default(),
                    attestations: Default::default(),
                    deposits: Default::default(),
                    voluntary_exits: Default::default(),
                    sync_aggregate: crate::SyncAggregate::new(),
                    execution_payload: Default::default(),
                    bls_to_execution_changes: Default::default(),
                    blob_kzg_commitments: Default::default(),
                },
            }),
            ForkName::Electra => BeaconBlock::Electra(BeaconBlockElectra {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyElectra {
                    randao_reveal: bls::SignatureBytes::empty(),
                    eth1_data: crate::Eth1Data::default(),
                    graffiti: crate::Graffiti::default(),
                    proposer_slashings: Default::default(),
                    attester_slashings: Default::default(),
                    attestations: Default::default(),
                    deposits: Default::default(),
                    voluntary_exits: Default::default(),
                    sync_aggregate: crate::SyncAggregate::new(),
                    execution_payload: Default::default(),
                    bls_to_execution_changes: Default::default(),
                    blob_kzg_commitments: Default::default(),
                    execution_requests: Default::default(),
                },
            }),
            ForkName::Fulu => BeaconBlock::Fulu(BeaconBlockFulu {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyFulu {
                    randao_reveal: bls::SignatureBytes::empty(),
                    eth1_data: crate::Eth1Data::default(),
                    graffiti: crate::Graffiti::default(),
                    proposer_slashings: Default::default(),
                    attester_slashings: Default::default(),
                    attestations: Default::default(),
                    deposits: Default::default(),
                    voluntary_exits: Default::default(),
                    sync_aggregate: crate::SyncAggregate::new(),
                    execution_payload: Default::default(),
                    bls_to_execution_changes: Default::default(),
                    blob_kzg_commitments: Default::default(),
                    execution_requests: Default::default(),
                },
            }),
            ForkName::Gloas => BeaconBlock::Gloas(BeaconBlockGloas {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyGloas {
                    randao_reveal: bls::SignatureBytes::empty(),
                    eth1_data: crate::Eth1Data::default(),
                    graffiti: crate::Graffiti::default(),
                    proposer_slashings: Default::default(),
                    attester_slashings: Default::default(),
                    attestations: Default::default(),
                    deposits: Default::default(),
                    voluntary_exits: Default::default(),
                    sync_aggregate: crate::SyncAggregate::new(),
                    bls_to_execution_changes: Default::default(),
                    signed_execution_payload_bid: Default::default(),
                    payload_attestations: Default::default(),
                },
            }),
        }
    }

    /// Convenience accessor for the `body` as an abstract reference.
    pub fn body(&self) -> BeaconBlockBodyRef<'_, E> {
        self.to_ref().body()
    }

    pub fn epoch(&self) -> Epoch {
        self.slot().epoch(E::slots_per_epoch())
    }

    /// Returns the `tree_hash_root` of the block.
    pub fn canonical_root(&self) -> Hash256 {
        self.tree_hash_root()
    }

    /// Returns a full `BeaconBlockHeader` of this block.
    ///
    /// Note: This method is used instead of an `Into` impl to avoid a `Clone` of an entire block
    /// when hashing the body.
    pub fn block_header(&self) -> BeaconBlockHeader {
        self.to_ref().block_header()
    }

    /// Returns a "temporary" header, where the `state_root` is `Hash256::zero()`.
    pub fn temporary_block_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            state_root: Hash256::default(),
            ..self.block_header()
        }
    }
}

impl<'a, E: EthSpec> BeaconBlockRef<'a, E> {
    /// The fork of this block's structural variant.
    pub fn fork_name_unchecked(&self) -> ForkName {
        match self {
            BeaconBlockRef::Base(_) => ForkName::Base,
            BeaconBlockRef::Altair(_) => ForkName::Altair,
            BeaconBlockRef::Bellatrix(_) => ForkName::Bellatrix,
            BeaconBlockRef::Capella(_) => ForkName::Capella,
            BeaconBlockRef::Deneb(_) => ForkName::Deneb,
            BeaconBlockRef::Electra(_) => ForkName::Electra,
            BeaconBlockRef::Fulu(_) => ForkName::Fulu,
            BeaconBlockRef::Gloas(_) => ForkName::Gloas,
        }
    }

    /// Convenience accessor for the `body` as an abstract reference.
    pub fn body(&self) -> BeaconBlockBodyRef<'a, E> {
        match self {
            BeaconBlockRef::Base(block) => BeaconBlockBodyRef::Base(&block.body),
            BeaconBlockRef::Altair(block) => BeaconBlockBodyRef::Altair(&block.body),
            BeaconBlockRef::Bellatrix(block) => BeaconBlockBodyRef::Bellatrix(&block.body),
            BeaconBlockRef::Capella(block) => BeaconBlockBodyRef::Capella(&block.body),
            BeaconBlockRef::Deneb(block) => BeaconBlockBodyRef::Deneb(&block.body),
            BeaconBlockRef::Electra(block) => BeaconBlockBodyRef::Electra(&block.body),
            BeaconBlockRef::Fulu(block) => BeaconBlockBodyRef::Fulu(&block.body),
            BeaconBlockRef::Gloas(block) => BeaconBlockBodyRef::Gloas(&block.body),
        }
    }

    /// Return the tree hash root of the block's body.
    pub fn body_root(&self) -> Hash256 {
        match self {
            BeaconBlockRef::Base(block) => block.body.tree_hash_root(),
            BeaconBlockRef::Altair(block) => block.body.tree_hash_root(),
            BeaconBlockRef::Bellatrix(block) => block.body.tree_hash_root(),
            BeaconBlockRef::Capella(block) => block.body.tree_hash_root(),
            BeaconBlockRef::Deneb(block) => block.body.tree_hash_root(),
            BeaconBlockRef::Electra(block) => block.body.tree_hash_root(),
            BeaconBlockRef::Fulu(block) => block.body.tree_hash_root(),
            BeaconBlockRef::Gloas(block) => block.body.tree_hash_root(),
        }
    }

    /// Returns the epoch corresponding to `self.slot()`.
    pub fn epoch(&self) -> Epoch {
        self.slot().epoch(E::slots_per_epoch())
    }

    /// Returns a "temporary" header, where the `state_root` is `Hash256::zero()`.
    pub fn temporary_block_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            state_root: Hash256::default(),
            ..self.block_header()
        }
    }

    /// Returns a full `BeaconBlockHeader` of this block.
    pub fn block_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot(),
            proposer_index: self.proposer_index(),
            parent_root: self.parent_root(),
            state_root: self.state_root(),
            body_root: self.body_root(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;
    use ssz::Encode;

    type E = MainnetEthSpec;

    fn base_block() -> BeaconBlock<E> {
        BeaconBlock::Base(BeaconBlockBase {
            slot: Slot::new(42),
            proposer_index: 7,
            parent_root: Hash256::repeat_byte(1),
            state_root: Hash256::repeat_byte(2),
            body: crate::BeaconBlockBodyBase {
                randao_reveal: bls::SignatureBytes::empty(),
                eth1_data: crate::Eth1Data::default(),
                graffiti: Graffiti::default(),
                proposer_slashings: Default::default(),
                attester_slashings: Default::default(),
                attestations: Default::default(),
                deposits: Default::default(),
                voluntary_exits: Default::default(),
            },
        })
    }

    use crate::Graffiti;

    #[test]
    fn header_root_matches_block_root() {
        let block = base_block();
        assert_eq!(
            block.block_header().canonical_root(),
            block.canonical_root()
        );
    }

    #[test]
    fn ssz_round_trip_via_fork_schedule() {
        let block = base_block();
        let bytes = block.as_ssz_bytes();
        let spec = ChainSpec::mainnet();
        let decoded = BeaconBlock::<E>::from_ssz_bytes(&bytes, &spec).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.slot(), Slot::new(42));
    }
}
