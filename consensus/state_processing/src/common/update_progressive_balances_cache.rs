/// A collection of all functions that mutate the `ProgressiveBalancesCache`.
use crate::per_epoch_processing::Error as EpochProcessingError;
use types::{
    compute_epoch_total_balances_seed, BeaconState, BeaconStateError, ChainSpec, Epoch, EthSpec,
    ParticipationFlags,
};

/// Initializes the `ProgressiveBalancesCache` if it is unbuilt.
pub fn initialize_progressive_balances_cache<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), BeaconStateError> {
    if !state.fork_name_unchecked().altair_enabled() {
        return Ok(());
    }

    if state
        .progressive_balances_cache()
        .is_initialized_at(state.current_epoch())
    {
        return Ok(());
    }

    let current_epoch = state.current_epoch();
    let previous_epoch_cache =
        compute_epoch_total_balances_seed(state, state.previous_epoch(), spec)?;
    let current_epoch_cache = compute_epoch_total_balances_seed(state, current_epoch, spec)?;

    state.progressive_balances_cache_mut().initialize(
        current_epoch,
        previous_epoch_cache,
        current_epoch_cache,
    );

    Ok(())
}

/// Updates the `ProgressiveBalancesCache` when a new target attestation has been processed.
pub fn update_progressive_balances_on_attestation<E: EthSpec>(
    state: &mut BeaconState<E>,
    epoch: Epoch,
    flag_index: usize,
    validator_effective_balance: u64,
    validator_slashed: bool,
) -> Result<(), BeaconStateError> {
    state.progressive_balances_cache_mut().on_new_attestation(
        epoch,
        validator_slashed,
        flag_index,
        validator_effective_balance,
    )
}

/// Updates the `ProgressiveBalancesCache` when a validator is slashed.
pub fn update_progressive_balances_on_slashing<E: EthSpec>(
    state: &mut BeaconState<E>,
    validator_index: usize,
    validator_effective_balance: u64,
) -> Result<(), BeaconStateError> {
    if !state.fork_name_unchecked().altair_enabled() {
        return Ok(());
    }

    // If the cache was never built there is nothing to patch up.
    if !state.progressive_balances_cache().is_initialized() {
        return Ok(());
    }

    let previous_epoch_participation = *state
        .previous_epoch_participation()?
        .get(validator_index)
        .unwrap_or(&ParticipationFlags::default());
    let current_epoch_participation = *state
        .current_epoch_participation()?
        .get(validator_index)
        .unwrap_or(&ParticipationFlags::default());

    state.progressive_balances_cache_mut().on_slashing(
        previous_epoch_participation,
        current_epoch_participation,
        validator_effective_balance,
    )
}

/// Updates the `ProgressiveBalancesCache` on epoch transition.
pub fn update_progressive_balances_on_epoch_transition<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), EpochProcessingError> {
    if !state.fork_name_unchecked().altair_enabled() {
        return Ok(());
    }

    state
        .progressive_balances_cache_mut()
        .on_epoch_transition(spec)?;

    Ok(())
}
