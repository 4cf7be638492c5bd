use crate::per_epoch_processing::Error;
use safe_arith::SafeArith;
use std::sync::Arc;
use types::{BeaconState, ChainSpec, EthSpec};

/// Rotate the sync committees at the end of each sync-committee period.
pub fn process_sync_committee_updates<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let next_epoch = state.next_epoch()?;
    if next_epoch.safe_rem(spec.epochs_per_sync_committee_period)? == 0 {
        *state.current_sync_committee_mut()? = state.next_sync_committee()?.clone();

        *state.next_sync_committee_mut()? = Arc::new(state.get_next_sync_committee(spec)?);
    }
    Ok(())
}
