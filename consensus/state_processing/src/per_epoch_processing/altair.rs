pub mod inactivity_updates;
pub mod justification_and_finalization;
pub mod participation_flag_updates;
pub mod rewards_and_penalties;
pub mod sync_committee_updates;

pub use inactivity_updates::process_inactivity_updates;
pub use justification_and_finalization::process_justification_and_finalization;
pub use participation_flag_updates::process_participation_flag_updates;
pub use rewards_and_penalties::process_rewards_and_penalties;
pub use sync_committee_updates::process_sync_committee_updates;

use super::{
    capella::process_historical_summaries_update,
    effective_balance_updates::process_effective_balance_updates,
    electra::{process_pending_consolidations, process_pending_deposits},
    gloas::process_builder_pending_payments,
    historical_roots_update::process_historical_roots_update,
    registry_updates::process_registry_updates,
    resets::{process_eth1_data_reset, process_randao_mixes_reset, process_slashings_reset},
    slashings::process_slashings,
    EpochProcessingSummary, Error,
};
use crate::common::update_progressive_balances_cache::{
    initialize_progressive_balances_cache, update_progressive_balances_on_epoch_transition,
};
use crate::epoch_cache::initialize_epoch_cache;
use crate::metrics;
use types::{BeaconState, ChainSpec, EthSpec, RelativeEpoch};

/// Performs per-epoch processing for a state in the altair fork or any later fork.
pub fn process_epoch<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<EpochProcessingSummary, Error> {
    // Ensure the committee caches are built.
    state.build_committee_cache(RelativeEpoch::Previous, spec)?;
    state.build_committee_cache(RelativeEpoch::Current, spec)?;
    state.build_committee_cache(RelativeEpoch::Next, spec)?;
    state.build_total_active_balance_cache(spec)?;
    initialize_progressive_balances_cache(state, spec)?;
    initialize_epoch_cache(state, spec)?;

    let fork_name = state.fork_name_unchecked();

    // Pre-compute participating balances for the summary before rewards mutate the state.
    let previous_epoch_total_active_balance =
        state.compute_total_active_balance_slow(state.previous_epoch(), spec)?;
    let current_epoch_total_active_balance = state.get_total_active_balance()?;
    let previous_epoch_target_attesting_balance = state
        .progressive_balances_cache()
        .previous_epoch_target_attesting_balance()?;
    let current_epoch_target_attesting_balance = state
        .progressive_balances_cache()
        .current_epoch_target_attesting_balance()?;

    // Justification and finalization.
    let timer = metrics::start_timer_vec(
        &metrics::EPOCH_PROCESSING_TIME,
        &["justification_and_finalization"],
    );
    let justification_and_finalization_state = process_justification_and_finalization(state)?;
    justification_and_finalization_state.apply_changes_to_state(state);
    metrics::stop_timer(timer);

    let timer =
        metrics::start_timer_vec(&metrics::EPOCH_PROCESSING_TIME, &["inactivity_updates"]);
    process_inactivity_updates(state, spec)?;
    metrics::stop_timer(timer);

    // Rewards and Penalties.
    let timer =
        metrics::start_timer_vec(&metrics::EPOCH_PROCESSING_TIME, &["rewards_and_penalties"]);
    process_rewards_and_penalties(state, spec)?;
    metrics::stop_timer(timer);

    // Registry Updates.
    let timer = metrics::start_timer_vec(&metrics::EPOCH_PROCESSING_TIME, &["registry_updates"]);
    process_registry_updates(state, spec)?;
    metrics::stop_timer(timer);

    // Slashings.
    let timer = metrics::start_timer_vec(&metrics::EPOCH_PROCESSING_TIME, &["slashings"]);
    process_slashings(state, state.get_total_active_balance()?, spec)?;
    metrics::stop_timer(timer);

    // Reset eth1 data votes.
    process_eth1_data_reset(state)?;

    // [New in Electra:EIP7251]
    if fork_name.electra_enabled() {
        let timer =
            metrics::start_timer_vec(&metrics::EPOCH_PROCESSING_TIME, &["pending_deposits"]);
        process_pending_deposits(state, spec)?;
        metrics::stop_timer(timer);

        process_pending_consolidations(state)?;
    }

    // [New in Gloas:EIP7732] settle builder payments that met the PTC quorum.
    if fork_name.gloas_enabled() {
        process_builder_pending_payments(state, spec)?;
    }

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
    if fork_name.capella_enabled() {
        process_historical_summaries_update(state)?;
    } else {
        process_historical_roots_update(state)?;
    }

    // Rotate current/previous epoch participation.
    process_participation_flag_updates(state)?;

    process_sync_committee_updates(state, spec)?;

    // Rotate the epoch caches to suit the epoch transition.
    state.advance_caches()?;
    update_progressive_balances_on_epoch_transition(state, spec)?;

    Ok(EpochProcessingSummary::Altair {
        previous_epoch_total_active_balance,
        previous_epoch_target_attesting_balance,
        current_epoch_total_active_balance,
        current_epoch_target_attesting_balance,
    })
}
