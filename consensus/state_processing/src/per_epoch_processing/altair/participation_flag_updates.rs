use crate::per_epoch_processing::Error;
use types::{BeaconState, EthSpec, ParticipationFlags, VariableList};

/// Rotate the current epoch's participation flags into the previous epoch's slot and zero the
/// current epoch's flags.
pub fn process_participation_flag_updates<E: EthSpec>(
    state: &mut BeaconState<E>,
) -> Result<(), Error> {
    let fresh_flags = VariableList::new(vec![
        ParticipationFlags::default();
        state.validators().len()
    ])?;
    *state.previous_epoch_participation_mut()? =
        std::mem::replace(state.current_epoch_participation_mut()?, fresh_flags);
    Ok(())
}
