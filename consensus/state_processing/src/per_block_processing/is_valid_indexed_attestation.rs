use super::errors::{BlockOperationError, IndexedAttestationInvalid as Invalid};
use super::signature_sets::{get_pubkey_from_state, indexed_attestation_signature_set};
use super::VerifySignatures;
use itertools::Itertools;
use types::{BeaconState, ChainSpec, EthSpec, IndexedAttestationRef};

type Result<T> = std::result::Result<T, BlockOperationError<Invalid>>;

fn error(reason: Invalid) -> BlockOperationError<Invalid> {
    BlockOperationError::invalid(reason)
}

/// Verify an `IndexedAttestation`.
pub fn is_valid_indexed_attestation<E: EthSpec>(
    state: &BeaconState<E>,
    indexed_attestation: IndexedAttestationRef<'_, E>,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<()> {
    // Verify that indices aren't empty
    verify!(
        indexed_attestation.attesting_indices_len() > 0,
        Invalid::IndicesEmpty
    );

    // Check that indices are sorted and unique
    let check_sorted = |list: std::slice::Iter<'_, u64>| -> Result<()> {
        for (i, (x, y)) in list.tuple_windows().enumerate() {
            if x >= y {
                return Err(error(Invalid::BadValidatorIndicesOrdering(i)));
            }
        }
        Ok(())
    };
    check_sorted(indexed_attestation.attesting_indices_iter())?;

    // Check that all indices reference real validators.
    for &index in indexed_attestation.attesting_indices_iter() {
        verify!(
            state.validators().get(index as usize).is_some(),
            Invalid::UnknownValidator(index)
        );
    }

    if verify_signatures.is_true() {
        verify!(
            indexed_attestation_signature_set(
                state,
                |i| get_pubkey_from_state(state, i),
                indexed_attestation.signature(),
                indexed_attestation,
                spec,
            )?
            .verify(),
            Invalid::BadSignature
        );
    }

    Ok(())
}
