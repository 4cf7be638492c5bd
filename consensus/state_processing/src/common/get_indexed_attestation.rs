use super::{attesting_indices_base, attesting_indices_electra};
use crate::per_block_processing::errors::{AttestationInvalid as Invalid, BlockOperationError};
use types::{
    AttestationRef, BeaconState, EthSpec, IndexedAttestation, IndexedAttestationBase,
    IndexedAttestationElectra, VariableList,
};

type Result<T> = std::result::Result<T, BlockOperationError<Invalid>>;

/// Convert `attestation` to a fully indexed form.
///
/// Spec v0.12.1
pub fn get_indexed_attestation<E: EthSpec>(
    state: &BeaconState<E>,
    attestation: AttestationRef<'_, E>,
) -> Result<IndexedAttestation<E>> {
    match attestation {
        AttestationRef::Base(att) => {
            let committee = state.get_beacon_committee(att.data.slot, att.data.index)?;
            let attesting_indices =
                attesting_indices_base::<E>(&att.aggregation_bits, &committee)?;

            Ok(IndexedAttestation::Base(IndexedAttestationBase {
                attesting_indices: VariableList::new(attesting_indices)?,
                data: att.data.clone(),
                signature: att.signature,
            }))
        }
        AttestationRef::Electra(att) => {
            let committees = state.get_beacon_committees_at_slot(att.data.slot)?;
            let attesting_indices = attesting_indices_electra::<E>(
                &att.aggregation_bits,
                &att.committee_bits,
                &committees,
            )?;

            Ok(IndexedAttestation::Electra(IndexedAttestationElectra {
                attesting_indices: VariableList::new(attesting_indices)?,
                data: att.data.clone(),
                signature: att.signature,
            }))
        }
    }
}
