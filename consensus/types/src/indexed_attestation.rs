use crate::{AttestationData, EthSpec, VariableList};
use bls::SignatureBytes;
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

/// Details an attestation that can be slashable.
///
/// To be included in an `AttesterSlashing`.
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
pub struct IndexedAttestation<E: EthSpec> {
    /// Lists validator registry indices, not committee indices.
    #[superstruct(only(Base), partial_getter(rename = "attesting_indices_base"))]
    #[serde(with = "quoted_variable_list_u64")]
    pub attesting_indices: VariableList<u64, E::MaxValidatorsPerCommittee>,
    #[superstruct(only(Electra), partial_getter(rename = "attesting_indices_electra"))]
    #[serde(with = "quoted_variable_list_u64")]
    pub attesting_indices: VariableList<u64, E::MaxValidatorsPerCommitteePerSlot>,
    pub data: AttestationData,
    pub signature: SignatureBytes,
}

impl<E: EthSpec> IndexedAttestation<E> {
    pub fn attesting_indices_len(&self) -> usize {
        match self {
            IndexedAttestation::Base(att) => att.attesting_indices.len(),
            IndexedAttestation::Electra(att) => att.attesting_indices.len(),
        }
    }

    pub fn attesting_indices_iter(&self) -> std::slice::Iter<'_, u64> {
        match self {
            IndexedAttestation::Base(att) => att.attesting_indices.iter(),
            IndexedAttestation::Electra(att) => att.attesting_indices.iter(),
        }
    }

    pub fn attesting_indices_to_vec(&self) -> Vec<u64> {
        self.attesting_indices_iter().copied().collect()
    }

    /// Check if ``attestation_data_1`` and ``attestation_data_2`` have the same target.
    ///
    /// Spec v0.12.1
    pub fn is_double_vote(&self, other: &Self) -> bool {
        // reuse the ref implementation to ensure logic is the same
        self.data().target.epoch == other.data().target.epoch && self.data() != other.data()
    }

    /// Check if ``attestation_data_1`` surrounds ``attestation_data_2``.
    ///
    /// Spec v0.12.1
    pub fn is_surround_vote(&self, other: &Self) -> bool {
        self.data().source.epoch < other.data().source.epoch
            && other.data().target.epoch < self.data().target.epoch
    }
}

impl<'a, E: EthSpec> IndexedAttestationRef<'a, E> {
    pub fn attesting_indices_len(&self) -> usize {
        match self {
            IndexedAttestationRef::Base(att) => att.attesting_indices.len(),
            IndexedAttestationRef::Electra(att) => att.attesting_indices.len(),
        }
    }

    pub fn attesting_indices_iter(&self) -> std::slice::Iter<'a, u64> {
        match self {
            IndexedAttestationRef::Base(att) => att.attesting_indices.iter(),
            IndexedAttestationRef::Electra(att) => att.attesting_indices.iter(),
        }
    }

    pub fn attesting_indices_to_vec(&self) -> Vec<u64> {
        self.attesting_indices_iter().copied().collect()
    }

    pub fn to_owned(self) -> IndexedAttestation<E> {
        match self {
            IndexedAttestationRef::Base(att) => IndexedAttestation::Base(att.clone()),
            IndexedAttestationRef::Electra(att) => IndexedAttestation::Electra(att.clone()),
        }
    }
}

/// Serialize a variable list of `u64` such that each int is quoted.
pub mod quoted_variable_list_u64 {
    use super::*;
    use serde::ser::SerializeSeq;
    use serde::{Deserializer, Serializer};
    use serde_utils::quoted_u64_vec::{QuotedIntVecVisitor, QuotedIntWrapper};
    use ssz_types::typenum::Unsigned;

    pub fn serialize<S, T>(value: &VariableList<u64, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Unsigned,
    {
        let mut seq = serializer.serialize_seq(Some(value.len()))?;
        for &int in value.iter() {
            seq.serialize_element(&QuotedIntWrapper { int })?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<VariableList<u64, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Unsigned,
    {
        deserializer
            .deserialize_any(QuotedIntVecVisitor)
            .and_then(|vec| {
                VariableList::new(vec)
                    .map_err(|e| serde::de::Error::custom(format!("invalid length: {:?}", e)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Checkpoint, Epoch, Hash256, MainnetEthSpec, Slot};

    type E = MainnetEthSpec;

    fn indexed_att(source_epoch: u64, target_epoch: u64, index: u64) -> IndexedAttestation<E> {
        IndexedAttestation::Base(IndexedAttestationBase {
            attesting_indices: VariableList::new(vec![index]).unwrap(),
            data: AttestationData {
                slot: Slot::new(0),
                index: 0,
                beacon_block_root: Hash256::default(),
                source: Checkpoint {
                    epoch: Epoch::new(source_epoch),
                    root: Hash256::default(),
                },
                target: Checkpoint {
                    epoch: Epoch::new(target_epoch),
                    root: Hash256::default(),
                },
            },
            signature: SignatureBytes::empty(),
        })
    }

    #[test]
    fn is_double_vote_true() {
        let attestation_1 = indexed_att(0, 1, 1);
        let attestation_2 = indexed_att(0, 1, 2);
        // Different attesting indices but same data: not a double vote (data is equal).
        assert!(!attestation_1.is_double_vote(&attestation_2));

        let attestation_3 = indexed_att(1, 1, 1);
        assert!(attestation_1.is_double_vote(&attestation_3));
    }

    #[test]
    fn is_surround_vote_true() {
        let attestation_1 = indexed_att(0, 3, 1);
        let attestation_2 = indexed_att(1, 2, 1);
        assert!(attestation_1.is_surround_vote(&attestation_2));
        assert!(!attestation_2.is_surround_vote(&attestation_1));
    }
}
