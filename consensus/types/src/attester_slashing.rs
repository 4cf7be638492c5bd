use crate::{EthSpec, IndexedAttestationBase, IndexedAttestationElectra, IndexedAttestationRef};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

/// Two conflicting attestations.
#[superstruct(
    variants(Base, Electra),
    variant_attributes(
        derive(
            Derivative,
            Debug,
            Clone,
            Serialize,
            Deserialize,
            Encode,
            Decode,
            TreeHash,
        ),
        derivative(PartialEq, Eq, Hash(bound = "E: EthSpec")),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    ref_attributes(derive(Debug))
)]
#[derive(Debug, Clone, Serialize, Encode, TreeHash, Derivative)]
#[derivative(PartialEq, Eq, Hash(bound = "E: EthSpec"))]
#[serde(bound = "E: EthSpec", untagged)]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct AttesterSlashing<E: EthSpec> {
    #[superstruct(only(Base), partial_getter(rename = "attestation_1_base"))]
    pub attestation_1: IndexedAttestationBase<E>,
    #[superstruct(only(Electra), partial_getter(rename = "attestation_1_electra"))]
    pub attestation_1: IndexedAttestationElectra<E>,
    #[superstruct(only(Base), partial_getter(rename = "attestation_2_base"))]
    pub attestation_2: IndexedAttestationBase<E>,
    #[superstruct(only(Electra), partial_getter(rename = "attestation_2_electra"))]
    pub attestation_2: IndexedAttestationElectra<E>,
}

impl<'a, E: EthSpec> AttesterSlashingRef<'a, E> {
    pub fn attestation_1(&self) -> IndexedAttestationRef<'a, E> {
        match self {
            AttesterSlashingRef::Base(slashing) => {
                IndexedAttestationRef::Base(&slashing.attestation_1)
            }
            AttesterSlashingRef::Electra(slashing) => {
                IndexedAttestationRef::Electra(&slashing.attestation_1)
            }
        }
    }

    pub fn attestation_2(&self) -> IndexedAttestationRef<'a, E> {
        match self {
            AttesterSlashingRef::Base(slashing) => {
                IndexedAttestationRef::Base(&slashing.attestation_2)
            }
            AttesterSlashingRef::Electra(slashing) => {
                IndexedAttestationRef::Electra(&slashing.attestation_2)
            }
        }
    }
}

impl<E: EthSpec> AttesterSlashing<E> {
    pub fn attestation_1(&self) -> IndexedAttestationRef<'_, E> {
        match self {
            AttesterSlashing::Base(slashing) => {
                IndexedAttestationRef::Base(&slashing.attestation_1)
            }
            AttesterSlashing::Electra(slashing) => {
                IndexedAttestationRef::Electra(&slashing.attestation_1)
            }
        }
    }

    pub fn attestation_2(&self) -> IndexedAttestationRef<'_, E> {
        match self {
            AttesterSlashing::Base(slashing) => {
                IndexedAttestationRef::Base(&slashing.attestation_2)
            }
            AttesterSlashing::Electra(slashing) => {
                IndexedAttestationRef::Electra(&slashing.attestation_2)
            }
        }
    }
}
