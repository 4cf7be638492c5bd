use crate::common::altair::BaseRewardPerIncrement;
use safe_arith::SafeArith;
use types::{
    BeaconState, BeaconStateError, ChainSpec, EffectiveBalanceIncrement, EpochCache,
    EpochCacheKey, EthSpec, Hash256, RelativeEpoch,
};

/// Initializes the `EpochCache` if it is not already built for the current epoch.
///
/// The cache key includes the shuffling decision root so that a cache built on one branch is
/// never used on another.
pub fn initialize_epoch_cache<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), BeaconStateError> {
    let current_epoch = state.current_epoch();
    let decision_block_root = epoch_cache_decision_block_root(state)?;

    if state
        .epoch_cache()
        .check_validity(current_epoch, decision_block_root)
        .is_ok()
    {
        // Cache is initialized and correct.
        return Ok(());
    }

    state.build_committee_cache(RelativeEpoch::Current, spec)?;
    let total_active_balance = state.get_total_active_balance()?;

    let mut effective_balance_increments: Vec<EffectiveBalanceIncrement> =
        Vec::with_capacity(state.validators().len());
    for validator in state.validators().iter() {
        let increments = validator
            .effective_balance
            .safe_div(spec.effective_balance_increment)?;
        effective_balance_increments.push(increments.try_into().map_err(|_| {
            BeaconStateError::ArithError(safe_arith::ArithError::Overflow)
        })?);
    }

    let base_reward_per_increment =
        BaseRewardPerIncrement::new(total_active_balance, spec)?.as_u64();

    *state.epoch_cache_mut() = EpochCache::new(
        EpochCacheKey {
            epoch: current_epoch,
            decision_block_root,
        },
        effective_balance_increments,
        base_reward_per_increment,
    );

    Ok(())
}

/// The block root upon which the current epoch's values depend: the last block of the previous
/// epoch (or the latest block root when the state sits at an epoch boundary that has not yet
/// been filled in).
pub fn epoch_cache_decision_block_root<E: EthSpec>(
    state: &BeaconState<E>,
) -> Result<Hash256, BeaconStateError> {
    let decision_slot = state
        .current_epoch()
        .start_slot(E::slots_per_epoch())
        .saturating_sub(1u64);

    if state.slot() <= decision_slot {
        Ok(state.latest_block_header().canonical_root())
    } else {
        state.get_block_root(decision_slot).copied()
    }
}
