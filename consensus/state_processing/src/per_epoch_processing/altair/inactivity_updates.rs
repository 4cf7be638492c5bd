use crate::per_epoch_processing::altair::rewards_and_penalties::{
    is_in_inactivity_leak, unslashed_participating_indices,
};
use crate::per_epoch_processing::Error;
use safe_arith::SafeArith;
use std::cmp::min;
use types::consts::altair::TIMELY_TARGET_FLAG_INDEX;
use types::{BeaconState, ChainSpec, EthSpec};

pub fn process_inactivity_updates<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    // Score updates based on previous epoch participation, skip genesis epoch
    if state.current_epoch() == E::genesis_epoch() {
        return Ok(());
    }

    let previous_epoch = state.previous_epoch();
    let in_inactivity_leak = is_in_inactivity_leak(state, spec)?;
    let unslashed_target_indices =
        unslashed_participating_indices(state, TIMELY_TARGET_FLAG_INDEX, previous_epoch)?;

    for index in 0..state.validators().len() {
        let validator = state.get_validator(index)?;
        if !state.is_eligible_validator(previous_epoch, validator)? {
            continue;
        }

        // Increase inactivity score of inactive validators
        if unslashed_target_indices.get(index).copied().unwrap_or(false) {
            let inactivity_score = state.get_inactivity_score_mut(index)?;
            inactivity_score.safe_sub_assign(min(1, *inactivity_score))?;
        } else {
            state
                .get_inactivity_score_mut(index)?
                .safe_add_assign(spec.inactivity_score_bias)?;
        }

        // Decrease the score of all validators for forgiveness when not during a leak
        if !in_inactivity_leak {
            let inactivity_score = state.get_inactivity_score_mut(index)?;
            inactivity_score
                .safe_sub_assign(min(spec.inactivity_score_recovery_rate, *inactivity_score))?;
        }
    }

    Ok(())
}
