use std::mem;
use types::{
    BeaconState, BeaconStateError as Error, BeaconStateGloas, BitVector, BuilderPendingPayment,
    ChainSpec, EthSpec, ExecutionPayloadBid, FixedVector, Fork, VariableList,
};

/// Transform a `Fulu` state into a `Gloas` state (ePBS).
///
/// The embedded execution payload header is replaced by the self-build bid for the latest block
/// hash, and the builder accounting fields start empty.
pub fn upgrade_to_gloas<E: EthSpec>(
    pre_state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let epoch = pre_state.current_epoch();

    let pre = match pre_state {
        BeaconState::Fulu(pre) => pre,
        _ => return Err(Error::IncorrectStateVariant),
    };

    let previous_payload_header = pre.latest_execution_payload_header.clone();
    let latest_block_hash = previous_payload_header.block_hash;

    let latest_execution_payload_bid = ExecutionPayloadBid {
        parent_block_hash: previous_payload_header.parent_hash,
        parent_block_root: pre.latest_block_header.parent_root,
        block_hash: previous_payload_header.block_hash,
        prev_randao: previous_payload_header.prev_randao,
        gas_limit: previous_payload_header.gas_limit,
        builder_index: 0,
        slot: pre.slot,
        value: 0,
        blob_kzg_commitments_root: types::Hash256::default(),
    };

    // Every slot in the historical window is treated as having had a timely payload; the bits
    // are cleared going forward as slots are processed.
    let mut execution_payload_availability = BitVector::new();
    for i in 0..E::slots_per_historical_root() {
        execution_payload_availability
            .set(i, true)
            .map_err(|_| Error::SlotOutOfBounds)?;
    }

    let post = BeaconState::Gloas(BeaconStateGloas {
        // Versioning
        genesis_time: pre.genesis_time,
        genesis_validators_root: pre.genesis_validators_root,
        slot: pre.slot,
        fork: Fork {
            previous_version: pre.fork.current_version,
            current_version: spec.gloas_fork_version,
            epoch,
        },
        // History
        latest_block_header: pre.latest_block_header.clone(),
        block_roots: pre.block_roots.clone(),
        state_roots: pre.state_roots.clone(),
        historical_roots: mem::take(&mut pre.historical_roots),
        // Eth1
        eth1_data: pre.eth1_data.clone(),
        eth1_data_votes: mem::take(&mut pre.eth1_data_votes),
        eth1_deposit_index: pre.eth1_deposit_index,
        // Registry
        validators: mem::take(&mut pre.validators),
        balances: mem::take(&mut pre.balances),
        // Randomness
        randao_mixes: pre.randao_mixes.clone(),
        // Slashings
        slashings: pre.slashings.clone(),
        // Participation
        previous_epoch_participation: mem::take(&mut pre.previous_epoch_participation),
        current_epoch_participation: mem::take(&mut pre.current_epoch_participation),
        // Finality
        justification_bits: pre.justification_bits.clone(),
        previous_justified_checkpoint: pre.previous_justified_checkpoint,
        current_justified_checkpoint: pre.current_justified_checkpoint,
        finalized_checkpoint: pre.finalized_checkpoint,
        // Inactivity
        inactivity_scores: mem::take(&mut pre.inactivity_scores),
        // Sync committees
        current_sync_committee: pre.current_sync_committee.clone(),
        next_sync_committee: pre.next_sync_committee.clone(),
        // Execution (ePBS)
        latest_execution_payload_bid,
        // Capella
        next_withdrawal_index: pre.next_withdrawal_index,
        next_withdrawal_validator_index: pre.next_withdrawal_validator_index,
        historical_summaries: mem::take(&mut pre.historical_summaries),
        // Electra
        deposit_requests_start_index: pre.deposit_requests_start_index,
        deposit_balance_to_consume: pre.deposit_balance_to_consume,
        exit_balance_to_consume: pre.exit_balance_to_consume,
        earliest_exit_epoch: pre.earliest_exit_epoch,
        consolidation_balance_to_consume: pre.consolidation_balance_to_consume,
        earliest_consolidation_epoch: pre.earliest_consolidation_epoch,
        pending_deposits: mem::take(&mut pre.pending_deposits),
        pending_partial_withdrawals: mem::take(&mut pre.pending_partial_withdrawals),
        pending_consolidations: mem::take(&mut pre.pending_consolidations),
        // Gloas
        execution_payload_availability,
        builder_pending_payments: FixedVector::from_elem(BuilderPendingPayment::default()),
        builder_pending_withdrawals: VariableList::empty(),
        latest_block_hash,
        latest_full_slot: pre.slot,
        // Caches
        total_active_balance: pre.total_active_balance,
        committee_caches: mem::take(&mut pre.committee_caches),
        pubkey_cache: mem::take(&mut pre.pubkey_cache),
        exit_cache: mem::take(&mut pre.exit_cache),
        progressive_balances_cache: mem::take(&mut pre.progressive_balances_cache),
        epoch_cache: mem::take(&mut pre.epoch_cache),
    });

    *pre_state = post;

    Ok(())
}
