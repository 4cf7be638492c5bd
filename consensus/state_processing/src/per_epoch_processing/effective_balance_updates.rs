use super::errors::EpochProcessingError;
use safe_arith::SafeArith;
use types::{BeaconState, ChainSpec, EthSpec};

/// Apply the hysteresis rule to bring each validator's effective balance towards its actual
/// balance.
pub fn process_effective_balance_updates<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), EpochProcessingError> {
    let current_fork = state.fork_name_unchecked();
    let hysteresis_increment = spec
        .effective_balance_increment
        .safe_div(spec.hysteresis_quotient)?;
    let downward_threshold =
        hysteresis_increment.safe_mul(spec.hysteresis_downward_multiplier)?;
    let upward_threshold = hysteresis_increment.safe_mul(spec.hysteresis_upward_multiplier)?;

    for index in 0..state.validators().len() {
        let balance = state.get_balance(index)?;
        let validator = state.get_validator(index)?;

        let new_max_effective_balance = validator.get_max_effective_balance(spec, current_fork);

        if balance.safe_add(downward_threshold)? < validator.effective_balance
            || validator.effective_balance.safe_add(upward_threshold)? < balance
        {
            state.get_validator_mut(index)?.effective_balance = std::cmp::min(
                balance.safe_sub(balance.safe_rem(spec.effective_balance_increment)?)?,
                new_max_effective_balance,
            );
        }
    }

    // The total active balance cache is stale once effective balances change: recompute it for
    // the upcoming epoch.
    let next_epoch = state.next_epoch()?;
    let total_active_balance = state.compute_total_active_balance_slow(next_epoch, spec)?;
    state.set_total_active_balance(next_epoch, total_active_balance);

    Ok(())
}
