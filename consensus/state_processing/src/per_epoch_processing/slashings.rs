use crate::common::decrease_balance;
use crate::per_epoch_processing::Error;
use safe_arith::SafeArith;
use types::{BeaconState, ChainSpec, EthSpec, Unsigned};

/// Process slashings.
pub fn process_slashings<E: EthSpec>(
    state: &mut BeaconState<E>,
    total_balance: u64,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let epoch = state.current_epoch();
    let sum_slashings = state.get_slashings_sum()?;
    let fork_name = state.fork_name_unchecked();
    let proportional_slashing_multiplier =
        spec.proportional_slashing_multiplier_for_fork(fork_name);
    let adjusted_total_slashing_balance = std::cmp::min(
        sum_slashings.safe_mul(proportional_slashing_multiplier)?,
        total_balance,
    );

    let target_withdrawable_epoch =
        epoch.safe_add(E::EpochsPerSlashingsVector::to_u64().safe_div(2)?)?;
    let indices: Vec<(usize, u64)> = state
        .validators()
        .iter()
        .enumerate()
        .filter(|(_, validator)| {
            validator.slashed && target_withdrawable_epoch == validator.withdrawable_epoch
        })
        .map(|(index, validator)| (index, validator.effective_balance))
        .collect();

    for (index, validator_effective_balance) in indices {
        let penalty = if fork_name.electra_enabled() {
            let effective_balance_increments =
                validator_effective_balance.safe_div(spec.effective_balance_increment)?;
            adjusted_total_slashing_balance
                .safe_div(total_balance.safe_div(spec.effective_balance_increment)?)?
                .safe_mul(effective_balance_increments)?
        } else {
            let increment = spec.effective_balance_increment;
            validator_effective_balance
                .safe_div(increment)?
                .safe_mul(adjusted_total_slashing_balance)?
                .safe_div(total_balance)?
                .safe_mul(increment)?
        };

        decrease_balance(state, index, penalty)?;
    }

    Ok(())
}
