use crate::{
    AttestationBase, AttestationElectra, AttestationRef, AttesterSlashingBase,
    AttesterSlashingElectra, AttesterSlashingRef, BeaconStateError, Deposit, Eth1Data, EthSpec,
    ExecutionPayloadBellatrix, ExecutionPayloadCapella, ExecutionPayloadDeneb,
    ExecutionPayloadElectra, ExecutionPayloadFulu, ExecutionPayloadRef, ExecutionRequests,
    FixedVector, Graffiti, Hash256, KzgCommitments, PayloadAttestation, ProposerSlashing,
    SignedBlsToExecutionChange, SignedExecutionPayloadBid, SignedVoluntaryExit, SyncAggregate,
    VariableList,
};
use bls::SignatureBytes;
use derivative::Derivative;
use merkle_proof::MerkleTree;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::typenum::Unsigned;
use superstruct::superstruct;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// The field offset of `blob_kzg_commitments` in the (deneb onwards) block body.
const BLOB_KZG_COMMITMENTS_BODY_INDEX: usize = 11;

/// The body of a `BeaconChain` block, containing operations.
///
/// This *superstruct* abstracts over the hard-fork.
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
    ref_attributes(derive(Debug)),
    partial_getter_error(ty = "BeaconStateError", expr = "BeaconStateError::IncorrectStateVariant")
)]
#[derive(Debug, Clone, Serialize, Encode, TreeHash, Derivative)]
#[derivative(PartialEq, Hash(bound = "E: EthSpec"))]
#[serde(bound = "E: EthSpec", untagged)]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct BeaconBlockBody<E: EthSpec> {
    pub randao_reveal: SignatureBytes,
    pub eth1_data: Eth1Data,
    pub graffiti: Graffiti,
    pub proposer_slashings: VariableList<ProposerSlashing, E::MaxProposerSlashings>,
    #[superstruct(
        only(Base, Altair, Bellatrix, Capella, Deneb),
        partial_getter(rename = "attester_slashings_base")
    )]
    pub attester_slashings: VariableList<AttesterSlashingBase<E>, E::MaxAttesterSlashings>,
    #[superstruct(
        only(Electra, Fulu, Gloas),
        partial_getter(rename = "attester_slashings_electra")
    )]
    pub attester_slashings: VariableList<AttesterSlashingElectra<E>, E::MaxAttesterSlashingsElectra>,
    #[superstruct(
        only(Base, Altair, Bellatrix, Capella, Deneb),
        partial_getter(rename = "attestations_base")
    )]
    pub attestations: VariableList<AttestationBase<E>, E::MaxAttestations>,
    #[superstruct(
        only(Electra, Fulu, Gloas),
        partial_getter(rename = "attestations_electra")
    )]
    pub attestations: VariableList<AttestationElectra<E>, E::MaxAttestationsElectra>,
    pub deposits: VariableList<Deposit, E::MaxDeposits>,
    pub voluntary_exits: VariableList<SignedVoluntaryExit, E::MaxVoluntaryExits>,
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu, Gloas))]
    pub sync_aggregate: SyncAggregate<E>,
    // We flatten the execution payload so that serde can use the name of the inner type,
    // either `execution_payload` for full payloads, or `execution_payload_header` for blinded
    // payloads.
    #[superstruct(only(Bellatrix), partial_getter(rename = "execution_payload_bellatrix"))]
    pub execution_payload: ExecutionPayloadBellatrix<E>,
    #[superstruct(only(Capella), partial_getter(rename = "execution_payload_capella"))]
    pub execution_payload: ExecutionPayloadCapella<E>,
    #[superstruct(only(Deneb), partial_getter(rename = "execution_payload_deneb"))]
    pub execution_payload: ExecutionPayloadDeneb<E>,
    #[superstruct(only(Electra), partial_getter(rename = "execution_payload_electra"))]
    pub execution_payload: ExecutionPayloadElectra<E>,
    #[superstruct(only(Fulu), partial_getter(rename = "execution_payload_fulu"))]
    pub execution_payload: ExecutionPayloadFulu<E>,
    #[superstruct(only(Capella, Deneb, Electra, Fulu, Gloas))]
    pub bls_to_execution_changes:
        VariableList<SignedBlsToExecutionChange, E::MaxBlsToExecutionChanges>,
    #[superstruct(only(Deneb, Electra, Fulu))]
    pub blob_kzg_commitments: KzgCommitments<E>,
    #[superstruct(only(Electra, Fulu))]
    pub execution_requests: ExecutionRequests<E>,
    #[superstruct(only(Gloas))]
    pub signed_execution_payload_bid: SignedExecutionPayloadBid,
    #[superstruct(only(Gloas))]
    pub payload_attestations: VariableList<PayloadAttestation<E>, E::MaxPayloadAttestations>,
}

impl<'a, E: EthSpec> BeaconBlockBodyRef<'a, E> {
    /// Access the execution payload, if one is present in this fork's body.
    pub fn execution_payload(&self) -> Result<ExecutionPayloadRef<'a, E>, BeaconStateError> {
        match self {
            BeaconBlockBodyRef::Base(_) | BeaconBlockBodyRef::Altair(_) => {
                Err(BeaconStateError::IncorrectStateVariant)
            }
            BeaconBlockBodyRef::Bellatrix(body) => {
                Ok(ExecutionPayloadRef::Bellatrix(&body.execution_payload))
            }
            BeaconBlockBodyRef::Capella(body) => {
                Ok(ExecutionPayloadRef::Capella(&body.execution_payload))
            }
            BeaconBlockBodyRef::Deneb(body) => {
                Ok(ExecutionPayloadRef::Deneb(&body.execution_payload))
            }
            BeaconBlockBodyRef::Electra(body) => {
                Ok(ExecutionPayloadRef::Electra(&body.execution_payload))
            }
            BeaconBlockBodyRef::Fulu(body) => {
                Ok(ExecutionPayloadRef::Fulu(&body.execution_payload))
            }
            // Gloas bodies commit to the payload via the signed bid (ePBS).
            BeaconBlockBodyRef::Gloas(_) => Err(BeaconStateError::IncorrectStateVariant),
        }
    }

    /// Iterate over the attestations in the body, as fork-agnostic references.
    pub fn attestations(&self) -> Box<dyn Iterator<Item = AttestationRef<'a, E>> + 'a> {
        match self {
            BeaconBlockBodyRef::Base(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Base))
            }
            BeaconBlockBodyRef::Altair(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Base))
            }
            BeaconBlockBodyRef::Bellatrix(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Base))
            }
            BeaconBlockBodyRef::Capella(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Base))
            }
            BeaconBlockBodyRef::Deneb(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Base))
            }
            BeaconBlockBodyRef::Electra(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Electra))
            }
            BeaconBlockBodyRef::Fulu(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Electra))
            }
            BeaconBlockBodyRef::Gloas(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Electra))
            }
        }
    }

    pub fn attestations_len(&self) -> usize {
        match self {
            BeaconBlockBodyRef::Base(body) => body.attestations.len(),
            BeaconBlockBodyRef::Altair(body) => body.attestations.len(),
            BeaconBlockBodyRef::Bellatrix(body) => body.attestations.len(),
            BeaconBlockBodyRef::Capella(body) => body.attestations.len(),
            BeaconBlockBodyRef::Deneb(body) => body.attestations.len(),
            BeaconBlockBodyRef::Electra(body) => body.attestations.len(),
            BeaconBlockBodyRef::Fulu(body) => body.attestations.len(),
            BeaconBlockBodyRef::Gloas(body) => body.attestations.len(),
        }
    }

    /// Iterate over the attester slashings in the body, as fork-agnostic references.
    pub fn attester_slashings(&self) -> Box<dyn Iterator<Item = AttesterSlashingRef<'a, E>> + 'a> {
        match self {
            BeaconBlockBodyRef::Base(body) => Box::new(
                body.attester_slashings
                    .iter()
                    .map(AttesterSlashingRef::Base),
            ),
            BeaconBlockBodyRef::Altair(body) => Box::new(
                body.attester_slashings
                    .iter()
                    .map(AttesterSlashingRef::Base),
            ),
            BeaconBlockBodyRef::Bellatrix(body) => Box::new(
                body.attester_slashings
                    .iter()
                    .map(AttesterSlashingRef::Base),
            ),
            BeaconBlockBodyRef::Capella(body) => Box::new(
                body.attester_slashings
                    .iter()
                    .map(AttesterSlashingRef::Base),
            ),
            BeaconBlockBodyRef::Deneb(body) => Box::new(
                body.attester_slashings
                    .iter()
                    .map(AttesterSlashingRef::Base),
            ),
            BeaconBlockBodyRef::Electra(body) => Box::new(
                body.attester_slashings
                    .iter()
                    .map(AttesterSlashingRef::Electra),
            ),
            BeaconBlockBodyRef::Fulu(body) => Box::new(
                body.attester_slashings
                    .iter()
                    .map(AttesterSlashingRef::Electra),
            ),
            BeaconBlockBodyRef::Gloas(body) => Box::new(
                body.attester_slashings
                    .iter()
                    .map(AttesterSlashingRef::Electra),
            ),
        }
    }

    /// The number of KZG commitments this body carries, zero pre-deneb.
    pub fn blob_kzg_commitments_len(&self) -> usize {
        self.blob_kzg_commitments()
            .map(|commitments| commitments.len())
            .unwrap_or(0)
    }

    /// Produces the proof of inclusion for a `self.blob_kzg_commitments()[index]`.
    pub fn kzg_commitment_merkle_proof(
        &self,
        index: usize,
    ) -> Result<FixedVector<Hash256, E::KzgCommitmentInclusionProofDepth>, BeaconStateError> {
        // Part 1: proof of the commitment within the `blob_kzg_commitments` list.
        let commitments = self.blob_kzg_commitments()?;
        let commitment_leaves: Vec<Hash256> = commitments
            .iter()
            .map(|commitment| commitment.tree_hash_root())
            .collect();
        let list_depth = E::MaxBlobCommitmentsPerBlock::to_usize().ilog2() as usize;
        let tree = MerkleTree::create(&commitment_leaves, list_depth);
        let (_, mut proof) = tree
            .generate_proof(index, list_depth)
            .map_err(|_| BeaconStateError::MerkleTreeError)?;

        // Mix in the length of the list.
        let mut length_bytes = [0; 32];
        length_bytes[0..8].copy_from_slice(&(commitments.len() as u64).to_le_bytes());
        proof.push(Hash256::from_slice(&length_bytes));

        // Part 2: proof of the `blob_kzg_commitments` list in the block body.
        let body_proof = self.kzg_commitments_merkle_proof()?;
        proof.extend_from_slice(&body_proof);

        FixedVector::new(proof).map_err(|_| BeaconStateError::MerkleTreeError)
    }

    /// Produces the proof of inclusion of the whole `blob_kzg_commitments` list in the body,
    /// shared by all data columns of the block.
    pub fn kzg_commitments_merkle_proof(
        &self,
    ) -> Result<FixedVector<Hash256, crate::KzgCommitmentsInclusionProofDepth>, BeaconStateError>
    {
        let leaves = self.body_field_tree_hashes()?;
        let depth = crate::consts::deneb::KZG_COMMITMENTS_INCLUSION_PROOF_DEPTH;
        let tree = MerkleTree::create(&leaves, depth);
        let (_, proof) = tree
            .generate_proof(BLOB_KZG_COMMITMENTS_BODY_INDEX, depth)
            .map_err(|_| BeaconStateError::MerkleTreeError)?;
        FixedVector::new(proof).map_err(|_| BeaconStateError::MerkleTreeError)
    }

    /// The tree hash root of every field of the body, in field order, for bodies that carry
    /// blob KZG commitments.
    fn body_field_tree_hashes(&self) -> Result<Vec<Hash256>, BeaconStateError> {
        match self {
            BeaconBlockBodyRef::Deneb(body) => Ok(vec![
                body.randao_reveal.tree_hash_root(),
                body.eth1_data.tree_hash_root(),
                body.graffiti.tree_hash_root(),
                body.proposer_slashings.tree_hash_root(),
                body.attester_slashings.tree_hash_root(),
                body.attestations.tree_hash_root(),
                body.deposits.tree_hash_root(),
                body.voluntary_exits.tree_hash_root(),
                body.sync_aggregate.tree_hash_root(),
                body.execution_payload.tree_hash_root(),
                body.bls_to_execution_changes.tree_hash_root(),
                body.blob_kzg_commitments.tree_hash_root(),
            ]),
            BeaconBlockBodyRef::Electra(body) => Ok(vec![
                body.randao_reveal.tree_hash_root(),
                body.eth1_data.tree_hash_root(),
                body.graffiti.tree_hash_root(),
                body.proposer_slashings.tree_hash_root(),
                body.attester_slashings.tree_hash_root(),
                body.attestations.tree_hash_root(),
                body.deposits.tree_hash_root(),
                body.voluntary_exits.tree_hash_root(),
                body.sync_aggregate.tree_hash_root(),
                body.execution_payload.tree_hash_root(),
                body.bls_to_execution_changes.tree_hash_root(),
                body.blob_kzg_commitments.tree_hash_root(),
                body.execution_requests.tree_hash_root(),
            ]),
            BeaconBlockBodyRef::Fulu(body) => Ok(vec![
                body.randao_reveal.tree_hash_root(),
                body.eth1_data.tree_hash_root(),
                body.graffiti.tree_hash_root(),
                body.proposer_slashings.tree_hash_root(),
                body.attester_slashings.tree_hash_root(),
                body.attestations.tree_hash_root(),
                body.deposits.tree_hash_root(),
                body.voluntary_exits.tree_hash_root(),
                body.sync_aggregate.tree_hash_root(),
                body.execution_payload.tree_hash_root(),
                body.bls_to_execution_changes.tree_hash_root(),
                body.blob_kzg_commitments.tree_hash_root(),
                body.execution_requests.tree_hash_root(),
            ]),
            _ => Err(BeaconStateError::IncorrectStateVariant),
        }
    }

    /// Returns `true` if this block body has a sidecar data requirement.
    pub fn has_blobs(&self) -> bool {
        self.blob_kzg_commitments_len() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    type E = MainnetEthSpec;

    #[test]
    fn base_body_has_no_payload() {
        let body: BeaconBlockBody<E> = BeaconBlockBody::Base(BeaconBlockBodyBase {
            randao_reveal: SignatureBytes::empty(),
            eth1_data: Eth1Data::default(),
            graffiti: Graffiti::default(),
            proposer_slashings: VariableList::empty(),
            attester_slashings: VariableList::empty(),
            attestations: VariableList::empty(),
            deposits: VariableList::empty(),
            voluntary_exits: VariableList::empty(),
        });
        assert!(body.to_ref().execution_payload().is_err());
        assert_eq!(body.to_ref().blob_kzg_commitments_len(), 0);
    }
}
