#![deny(clippy::wildcard_imports)]

use crate::metrics;
pub use epoch_processing_summary::EpochProcessingSummary;
use errors::EpochProcessingError as Error;
pub use justification_and_finalization_state::JustificationAndFinalizationState;
pub use registry_updates::process_registry_updates;
use safe_arith::SafeArith;
pub use slashings::process_slashings;
use types::{BeaconState, ChainSpec, EthSpec};
pub use weigh_justification_and_finalization::weigh_justification_and_finalization;

pub mod altair;
pub mod base;
pub mod capella;
pub mod effective_balance_updates;
pub mod electra;
pub mod epoch_processing_summary;
pub mod errors;
pub mod gloas;
pub mod historical_roots_update;
pub mod justification_and_finalization_state;
pub mod registry_updates;
pub mod resets;
pub mod slashings;
pub mod weigh_justification_and_finalization;

/// Performs per-epoch processing on some BeaconState.
///
/// Mutates the given `BeaconState`, returning early if an error is encountered. If an error is
/// returned, a state might be "half-processed" and therefore in an invalid state.
pub fn process_epoch<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<EpochProcessingSummary, Error> {
    let _timer = metrics::start_timer_vec(&metrics::EPOCH_PROCESSING_TIME, &["total"]);

    // Verify that the `BeaconState` instantiation matches the fork at `state.slot()`.
    state
        .fork_name(spec)
        .map_err(Error::InconsistentStateFork)?;

    match state {
        BeaconState::Base(_) => base::process_epoch(state, spec),
        BeaconState::Altair(_)
        | BeaconState::Bellatrix(_)
        | BeaconState::Capella(_)
        | BeaconState::Deneb(_)
        | BeaconState::Electra(_)
        | BeaconState::Fulu(_)
        | BeaconState::Gloas(_) => altair::process_epoch(state, spec),
    }
}

/// Used to track the changes to a validator's balance.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Delta {
    pub rewards: u64,
    pub penalties: u64,
}

impl Delta {
    /// Reward the validator with the `reward`.
    pub fn reward(&mut self, reward: u64) -> Result<(), Error> {
        self.rewards = self.rewards.safe_add(reward)?;
        Ok(())
    }

    /// Penalize the validator with the `penalty`.
    pub fn penalize(&mut self, penalty: u64) -> Result<(), Error> {
        self.penalties = self.penalties.safe_add(penalty)?;
        Ok(())
    }

    /// Combine two deltas.
    pub fn combine(&mut self, other: Delta) -> Result<(), Error> {
        self.reward(other.rewards)?;
        self.penalize(other.penalties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::altair::BaseRewardPerIncrement;
    use crate::common::base::SqrtTotalActiveBalance;
    use safe_arith::SafeArith;
    use types::consts::altair::{TIMELY_SOURCE_WEIGHT, TIMELY_TARGET_WEIGHT, WEIGHT_DENOMINATOR};
    use types::test_utils::TestingStateBuilder;
    use types::{MinimalEthSpec, Slot};

    type E = MinimalEthSpec;

    const VALIDATOR_COUNT: usize = 16;

    fn total_balance(state: &types::BeaconState<E>) -> u128 {
        state.balances().iter().map(|b| *b as u128).sum()
    }

    /// With empty participation, no slashings and no withdrawals, the only balance movement
    /// during epoch processing is the idleness penalty: the total must drop by exactly the
    /// sum of the missed source and target components.
    #[test]
    fn altair_epoch_without_participation_only_charges_idleness() {
        let spec = ChainSpec::all_forks_at_genesis();
        // The last slot of epoch 2, so that rewards and penalties apply for epoch 1.
        let slot = Slot::new(3 * E::slots_per_epoch() - 1);
        let mut state = TestingStateBuilder::build::<E>(slot, VALIDATOR_COUNT, &spec);
        state.build_caches(&spec).unwrap();

        let before = total_balance(&state);
        let total_active_balance = state.get_total_active_balance().unwrap();

        process_epoch(&mut state, &spec).unwrap();
        let after = total_balance(&state);

        let base_reward_per_increment =
            BaseRewardPerIncrement::new(total_active_balance, &spec).unwrap();
        let increments = spec
            .max_effective_balance
            .safe_div(spec.effective_balance_increment)
            .unwrap();
        let base_reward = increments.safe_mul(base_reward_per_increment.as_u64()).unwrap();
        let penalty_per_validator = base_reward * TIMELY_SOURCE_WEIGHT / WEIGHT_DENOMINATOR
            + base_reward * TIMELY_TARGET_WEIGHT / WEIGHT_DENOMINATOR;

        assert_eq!(
            after,
            before - VALIDATOR_COUNT as u128 * penalty_per_validator as u128,
        );
    }

    /// The base-fork equivalent: all three attestation components are missed.
    #[test]
    fn base_epoch_without_participation_only_charges_idleness() {
        let spec = ChainSpec::minimal();
        let slot = Slot::new(3 * E::slots_per_epoch() - 1);
        let mut state = TestingStateBuilder::build::<E>(slot, VALIDATOR_COUNT, &spec);
        state.build_caches(&spec).unwrap();

        let before = total_balance(&state);
        let total_active_balance = state.get_total_active_balance().unwrap();

        process_epoch(&mut state, &spec).unwrap();
        let after = total_balance(&state);

        let base_reward = crate::common::base::get_base_reward(
            spec.max_effective_balance,
            SqrtTotalActiveBalance::new(total_active_balance),
            &spec,
        )
        .unwrap();
        // One base reward lost per missed component: source, target and head.
        let penalty_per_validator = 3 * base_reward;

        assert_eq!(
            after,
            before - VALIDATOR_COUNT as u128 * penalty_per_validator as u128,
        );
    }

    /// Participation flags rotate at the epoch boundary: the current flags become the
    /// previous flags and the current flags reset.
    #[test]
    fn participation_flags_rotate() {
        let spec = ChainSpec::all_forks_at_genesis();
        let slot = Slot::new(3 * E::slots_per_epoch() - 1);
        let mut state = TestingStateBuilder::build::<E>(slot, VALIDATOR_COUNT, &spec);
        state.build_caches(&spec).unwrap();

        // Mark some current-epoch participation.
        use types::consts::altair::TIMELY_SOURCE_FLAG_INDEX;
        state
            .current_epoch_participation_mut()
            .unwrap()
            .get_mut(0)
            .unwrap()
            .add_flag(TIMELY_SOURCE_FLAG_INDEX)
            .unwrap();

        process_epoch(&mut state, &spec).unwrap();

        assert!(state
            .previous_epoch_participation()
            .unwrap()
            .get(0)
            .unwrap()
            .has_flag(TIMELY_SOURCE_FLAG_INDEX)
            .unwrap());
        assert!(!state
            .current_epoch_participation()
            .unwrap()
            .get(0)
            .unwrap()
            .has_flag(TIMELY_SOURCE_FLAG_INDEX)
            .unwrap());
    }
}
