pub mod justification_and_finalization;
pub mod participation_record_updates;
pub mod rewards_and_penalties;
pub mod validator_statuses;

pub use justification_and_finalization::process_justification_and_finalization;
pub use participation_record_updates::process_participation_record_updates;
pub use rewards_and_penalties::process_rewards_and_penalties;
pub use validator_statuses::{InclusionInfo, TotalBalances, ValidatorStatus, ValidatorStatuses};

use super::{
    effective_balance_updates::process_effective_balance_updates,
    historical_roots_update::process_historical_roots_update,
    registry_updates::process_registry_updates,
    resets::{process_eth1_data_reset, process_randao_mixes_reset, process_slashings_reset},
    slashings::process_slashings,
    EpochProcessingSummary, Error,
};
use crate::metrics;
use types::{BeaconState, ChainSpec, EthSpec, RelativeEpoch};

/// Provides a summary of validator participation during the epoch.
pub fn process_epoch<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<EpochProcessingSummary, Error> {
    // Ensure the committee caches are built.
    state.build_committee_cache(RelativeEpoch::Previous, spec)?;
    state.build_committee_cache(RelativeEpoch::Current, spec)?;
    state.build_committee_cache(RelativeEpoch::Next, spec)?;

    // Load the struct we use to assign validators into sets based on their participation.
    //
    // E.g., attestation in the previous epoch, attested to the head, etc.
    let mut validator_statuses = ValidatorStatuses::new(state, spec)?;
    validator_statuses.process_attestations(state)?;

    // Justification and finalization.
    let timer = metrics::start_timer_vec(
        &metrics::EPOCH_PROCESSING_TIME,
        &["justification_and_finalization"],
    );
    let justification_and_finalization_state =
        process_justification_and_finalization(state, &validator_statuses.total_balances)?;
    justification_and_finalization_state.apply_changes_to_state(state);
    metrics::stop_timer(timer);

    // Rewards and Penalties.
    let timer =
        metrics::start_timer_vec(&metrics::EPOCH_PROCESSING_TIME, &["rewards_and_penalties"]);
    process_rewards_and_penalties(state, &mut validator_statuses, spec)?;
    metrics::stop_timer(timer);

    // Registry Updates.
    let timer = metrics::start_timer_vec(&metrics::EPOCH_PROCESSING_TIME, &["registry_updates"]);
    process_registry_updates(state, spec)?;
    metrics::stop_timer(timer);

    // Slashings.
    let timer = metrics::start_timer_vec(&metrics::EPOCH_PROCESSING_TIME, &["slashings"]);
    process_slashings(
        state,
        validator_statuses.total_balances.current_epoch(),
        spec,
    )?;
    metrics::stop_timer(timer);

    // Reset eth1 data votes.
    process_eth1_data_reset(state)?;

    // Update effective balances with hysteresis (lag).
    let timer = metrics::start_timer_vec(
        &metrics::EPOCH_PROCESSING_TIME,
        &["effective_balance_updates"],
    );
    process_effective_balance_updates(state, spec)?;
    metrics::stop_timer(timer);

    // Reset slashings.
    process_slashings_reset(state)?;

    // Set randao mix.
    process_randao_mixes_reset(state)?;

    // Set historical root accumulator.
    process_historical_roots_update(state)?;

    // Rotate current/previous epoch attestations.
    process_participation_record_updates(state)?;

    // Rotate the epoch caches to suit the epoch transition.
    state.advance_caches()?;

    Ok(EpochProcessingSummary::Base {
        total_balances: validator_statuses.total_balances,
    })
}
