use crate::common::{
    altair::{get_base_reward, BaseRewardPerIncrement},
    decrease_balance, increase_balance,
};
use crate::per_epoch_processing::{Delta, Error};
use safe_arith::SafeArith;
use types::consts::altair::{
    NUM_FLAG_INDICES, PARTICIPATION_FLAG_WEIGHTS, TIMELY_HEAD_FLAG_INDEX,
    TIMELY_TARGET_FLAG_INDEX, WEIGHT_DENOMINATOR,
};
use types::{BeaconState, ChainSpec, Epoch, EthSpec};

/// Apply attester and proposer rewards.
pub fn process_rewards_and_penalties<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    if state.current_epoch() == E::genesis_epoch() {
        return Ok(());
    }

    let mut deltas = vec![Delta::default(); state.validators().len()];

    let total_active_balance = state.get_total_active_balance()?;

    for flag_index in 0..NUM_FLAG_INDICES {
        get_flag_index_deltas(&mut deltas, state, flag_index, total_active_balance, spec)?;
    }

    get_inactivity_penalty_deltas(&mut deltas, state, spec)?;

    // Apply the deltas, erroring on overflow above but not on overflow below (saturating at 0
    // instead).
    for (i, delta) in deltas.into_iter().enumerate() {
        increase_balance(state, i, delta.rewards)?;
        decrease_balance(state, i, delta.penalties)?;
    }

    Ok(())
}

/// Return the deltas contributed by each flag index.
pub fn get_flag_index_deltas<E: EthSpec>(
    deltas: &mut [Delta],
    state: &BeaconState<E>,
    flag_index: usize,
    total_active_balance: u64,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let previous_epoch = state.previous_epoch();
    let unslashed_participating = unslashed_participating_indices(state, flag_index, previous_epoch)?;
    let weight = PARTICIPATION_FLAG_WEIGHTS
        .get(flag_index)
        .copied()
        .ok_or(Error::InvalidFlagIndex(flag_index))?;
    let base_reward_per_increment = BaseRewardPerIncrement::new(total_active_balance, spec)?;

    let unslashed_participating_balance = participating_balance(
        state,
        &unslashed_participating,
        spec,
    )?;
    let unslashed_participating_increments =
        unslashed_participating_balance.safe_div(spec.effective_balance_increment)?;
    let active_increments = total_active_balance.safe_div(spec.effective_balance_increment)?;

    let in_inactivity_leak = is_in_inactivity_leak(state, spec)?;

    for index in 0..state.validators().len() {
        let validator = state.get_validator(index)?;
        if !state.is_eligible_validator(previous_epoch, validator)? {
            continue;
        }
        let base_reward = get_base_reward(state, index, base_reward_per_increment, spec)?;

        let mut delta = Delta::default();
        if unslashed_participating.get(index).copied().unwrap_or(false) {
            if !in_inactivity_leak {
                let reward_numerator = base_reward
                    .safe_mul(weight)?
                    .safe_mul(unslashed_participating_increments)?;
                delta.reward(
                    reward_numerator
                        .safe_div(active_increments.safe_mul(WEIGHT_DENOMINATOR)?)?,
                )?;
            }
        } else if flag_index != TIMELY_HEAD_FLAG_INDEX {
            delta.penalize(base_reward.safe_mul(weight)?.safe_div(WEIGHT_DENOMINATOR)?)?;
        }
        deltas
            .get_mut(index)
            .ok_or(Error::DeltaOutOfBounds(index))?
            .combine(delta)?;
    }
    Ok(())
}

pub fn get_inactivity_penalty_deltas<E: EthSpec>(
    deltas: &mut [Delta],
    state: &BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let previous_epoch = state.previous_epoch();
    let unslashed_target_participating =
        unslashed_participating_indices(state, TIMELY_TARGET_FLAG_INDEX, previous_epoch)?;
    let inactivity_penalty_quotient =
        spec.inactivity_penalty_quotient_for_fork(state.fork_name_unchecked());

    for index in 0..state.validators().len() {
        let validator = state.get_validator(index)?;
        if !state.is_eligible_validator(previous_epoch, validator)? {
            continue;
        }

        if !unslashed_target_participating
            .get(index)
            .copied()
            .unwrap_or(false)
        {
            let penalty_numerator = state
                .get_validator(index)?
                .effective_balance
                .safe_mul(state.get_inactivity_score(index)?)?;
            let penalty_denominator = spec
                .inactivity_score_bias
                .safe_mul(inactivity_penalty_quotient)?;
            deltas
                .get_mut(index)
                .ok_or(Error::DeltaOutOfBounds(index))?
                .penalize(penalty_numerator.safe_div(penalty_denominator)?)?;
        }
    }
    Ok(())
}

/// A mask over the validator registry: `true` for validators that are unslashed and have the
/// given participation flag set for `epoch`.
pub fn unslashed_participating_indices<E: EthSpec>(
    state: &BeaconState<E>,
    flag_index: usize,
    epoch: Epoch,
) -> Result<Vec<bool>, Error> {
    let participation = if epoch == state.current_epoch() {
        state.current_epoch_participation()?
    } else if epoch == state.previous_epoch() {
        state.previous_epoch_participation()?
    } else {
        return Err(Error::BeaconStateError(
            types::BeaconStateError::SlotOutOfBounds,
        ));
    };

    state
        .validators()
        .iter()
        .zip(participation.iter())
        .map(|(validator, participation_flags)| {
            Ok(!validator.slashed
                && validator.is_active_at(epoch)
                && participation_flags
                    .has_flag(flag_index)
                    .map_err(|_| Error::InvalidFlagIndex(flag_index))?)
        })
        .collect()
}

/// The total effective balance of the masked validators, clamped below by one effective balance
/// increment.
fn participating_balance<E: EthSpec>(
    state: &BeaconState<E>,
    mask: &[bool],
    spec: &ChainSpec,
) -> Result<u64, Error> {
    let mut balance = 0u64;
    for (index, participating) in mask.iter().enumerate() {
        if *participating {
            balance.safe_add_assign(state.get_effective_balance(index)?)?;
        }
    }
    Ok(std::cmp::max(balance, spec.effective_balance_increment))
}

/// Returns `true` if the chain has failed to finalize for longer than the grace period.
pub fn is_in_inactivity_leak<E: EthSpec>(
    state: &BeaconState<E>,
    spec: &ChainSpec,
) -> Result<bool, Error> {
    let finality_delay = state
        .previous_epoch()
        .safe_sub(state.finalized_checkpoint().epoch)?
        .as_u64();
    Ok(finality_delay > spec.min_epochs_to_inactivity_penalty)
}
