use crate::per_epoch_processing::Error;
use types::{BeaconState, EthSpec};

/// Rotate the current epoch's attestations into the previous epoch's slot.
pub fn process_participation_record_updates<E: EthSpec>(
    state: &mut BeaconState<E>,
) -> Result<(), Error> {
    if let BeaconState::Base(base_state) = state {
        base_state.previous_epoch_attestations =
            std::mem::take(&mut base_state.current_epoch_attestations);
        Ok(())
    } else {
        Err(Error::BeaconStateError(
            types::BeaconStateError::IncorrectStateVariant,
        ))
    }
}
