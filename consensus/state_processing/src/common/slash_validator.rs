use crate::common::update_progressive_balances_cache::update_progressive_balances_on_slashing;
use crate::common::{decrease_balance, increase_balance, initiate_validator_exit};
use crate::per_block_processing::errors::BlockProcessingError;
use crate::ConsensusContext;
use safe_arith::SafeArith;
use std::cmp;
use types::consts::altair::{PROPOSER_WEIGHT, WEIGHT_DENOMINATOR};
use types::{BeaconStateError as Error, BeaconState, ChainSpec, Epoch, EthSpec, Unsigned};

/// Slash the validator with index `slashed_index`.
pub fn slash_validator<E: EthSpec>(
    state: &mut BeaconState<E>,
    slashed_index: usize,
    opt_whistleblower_index: Option<usize>,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let epoch = state.current_epoch();

    initiate_validator_exit(state, slashed_index, spec)?;

    let validator = state
        .validators_mut()
        .get_mut(slashed_index)
        .ok_or(Error::UnknownValidator(slashed_index))?;

    validator.slashed = true;
    validator.withdrawable_epoch = cmp::max(
        validator.withdrawable_epoch,
        epoch.safe_add(Epoch::new(E::EpochsPerSlashingsVector::to_u64()))?,
    );

    let effective_balance = validator.effective_balance;

    // Update the slashings vector.
    let slashings_at_epoch = state.get_slashings_at(epoch)?;
    state.set_slashings_at(epoch, slashings_at_epoch.safe_add(effective_balance)?)?;

    // Apply the slashing penalty.
    let min_slashing_penalty_quotient =
        spec.min_slashing_penalty_quotient_for_fork(state.fork_name_unchecked());
    decrease_balance(
        state,
        slashed_index,
        effective_balance.safe_div(min_slashing_penalty_quotient)?,
    )?;

    update_progressive_balances_on_slashing(state, slashed_index, effective_balance)?;

    // Apply proposer and whistleblower rewards
    let proposer_index = ctxt.get_proposer_index(state, spec)? as usize;
    let whistleblower_index = opt_whistleblower_index.unwrap_or(proposer_index);
    let whistleblower_reward = effective_balance.safe_div(
        spec.whistleblower_reward_quotient_for_fork(state.fork_name_unchecked()),
    )?;
    let proposer_reward = match state.fork_name_unchecked() {
        types::ForkName::Base => whistleblower_reward.safe_div(spec.proposer_reward_quotient)?,
        _ => whistleblower_reward
            .safe_mul(PROPOSER_WEIGHT)?
            .safe_div(WEIGHT_DENOMINATOR)?,
    };

    // Ensure the whistleblower index is in the validator registry.
    if state.validators().get(whistleblower_index).is_none() {
        return Err(BlockProcessingError::BeaconStateError(
            Error::UnknownValidator(whistleblower_index),
        ));
    }

    increase_balance(state, proposer_index, proposer_reward)?;
    increase_balance(
        state,
        whistleblower_index,
        whistleblower_reward.saturating_sub(proposer_reward),
    )?;

    Ok(())
}
