use crate::{AttestationData, BitList, BitVector, EthSpec};
use bls::SignatureBytes;
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq)]
pub enum Error {
    SszTypesError(ssz_types::Error),
    IncorrectStateVariant,
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Self {
        Error::SszTypesError(e)
    }
}

/// Details an attestation that can be slashable.
///
/// The `Electra` variant grows the aggregation bitfield to cover every committee of the slot
/// (EIP-7549); the attested committee indices move into `committee_bits`.
#[superstruct(
    variants(Base, Electra),
    variant_attributes(
        derive(
            Debug,
            Clone,
            Serialize,
            Deserialize,
            Decode,
            Encode,
            TreeHash,
            Derivative,
        ),
        derivative(PartialEq, Eq, Hash(bound = "E: EthSpec")),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    ref_attributes(derive(Debug))
)]
#[derive(Debug, Clone, Serialize, Deserialize, Encode, TreeHash, Derivative)]
#[derivative(PartialEq, Eq, Hash(bound = "E: EthSpec"))]
#[serde(untagged)]
#[serde(bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct Attestation<E: EthSpec> {
    #[superstruct(only(Base), partial_getter(rename = "aggregation_bits_base"))]
    pub aggregation_bits: BitList<E::MaxValidatorsPerCommittee>,
    #[superstruct(only(Electra), partial_getter(rename = "aggregation_bits_electra"))]
    pub aggregation_bits: BitList<E::MaxValidatorsPerCommitteePerSlot>,
    pub data: AttestationData,
    #[superstruct(only(Electra))]
    pub committee_bits: BitVector<E::MaxCommitteesPerSlot>,
    pub signature: SignatureBytes,
}

impl<E: EthSpec> Attestation<E> {
    /// Number of set bits in the aggregation bitfield.
    pub fn num_set_aggregation_bits(&self) -> usize {
        match self {
            Attestation::Base(att) => att.aggregation_bits.num_set_bits(),
            Attestation::Electra(att) => att.aggregation_bits.num_set_bits(),
        }
    }

    /// Returns `true` if the attestation covers no validators.
    pub fn is_empty(&self) -> bool {
        self.num_set_aggregation_bits() == 0
    }

    /// The committee index of the attestation.
    ///
    /// For electra attestations this is the position of the single set bit in `committee_bits`;
    /// `None` for a (malformed) electra attestation with no committee bits set.
    pub fn committee_index(&self) -> Option<u64> {
        match self {
            Attestation::Base(att) => Some(att.data.index),
            Attestation::Electra(att) => att.get_committee_indices().first().copied(),
        }
    }

    pub fn get_aggregation_bit(&self, index: usize) -> Result<bool, ssz_types::Error> {
        match self {
            Attestation::Base(att) => att.aggregation_bits.get(index),
            Attestation::Electra(att) => att.aggregation_bits.get(index),
        }
    }
}

impl<E: EthSpec> AttestationElectra<E> {
    pub fn get_committee_indices(&self) -> Vec<u64> {
        self.committee_bits
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| if bit { Some(index as u64) } else { None })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    type E = MainnetEthSpec;

    #[test]
    fn empty_base_attestation() {
        let att: Attestation<E> = Attestation::Base(AttestationBase {
            aggregation_bits: BitList::with_capacity(8).unwrap(),
            data: AttestationData::default(),
            signature: SignatureBytes::empty(),
        });
        assert!(att.is_empty());
        assert_eq!(att.committee_index(), Some(0));
    }

    #[test]
    fn electra_committee_index_comes_from_committee_bits() {
        let mut committee_bits = BitVector::new();
        committee_bits.set(3, true).unwrap();
        let att: Attestation<E> = Attestation::Electra(AttestationElectra {
            aggregation_bits: BitList::with_capacity(8).unwrap(),
            data: AttestationData::default(),
            committee_bits,
            signature: SignatureBytes::empty(),
        });
        assert_eq!(att.committee_index(), Some(3));
    }
}
